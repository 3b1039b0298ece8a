/// Turn raw price text into a number, `0.0` when nothing parses.
///
/// Keeps digits plus `.`/`,`, rewrites every `,` as `.`, then parses.
/// Thousands separators therefore break parsing: `"1.234,50"` becomes
/// `"1.234.50"` and yields `0.0`. Callers that need to tell "free" from
/// "unparsable" use [`try_normalize_price`].
pub fn normalize_price(raw: &str) -> f64 {
    try_normalize_price(raw).unwrap_or(0.0)
}

/// Same cleaning as [`normalize_price`] but reports failure as `None`.
pub fn try_normalize_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter_map(|c| match c {
            '0'..='9' | '.' => Some(c),
            ',' => Some('.'),
            _ => arabic_digit(c),
        })
        .collect();

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

// Arabic-Indic and Extended Arabic-Indic digits show up on Egyptian storefronts.
fn arabic_digit(c: char) -> Option<char> {
    let offset = match c {
        '\u{0660}'..='\u{0669}' => c as u32 - 0x0660,
        '\u{06F0}'..='\u{06F9}' => c as u32 - 0x06F0,
        _ => return None,
    };
    char::from_digit(offset, 10)
}
