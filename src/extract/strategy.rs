use anyhow::{anyhow, Result};
use reqwest::Url;
use scraper::{ElementRef, Selector};

/// One way of reading a field out of a candidate element.
pub type FieldStrategy = Box<dyn Fn(ElementRef<'_>) -> Option<String> + Send + Sync>;

/// Ordered strategies for one field; the first non-empty answer wins.
pub struct FieldCascade {
    strategies: Vec<FieldStrategy>,
}

impl FieldCascade {
    pub fn new(strategies: Vec<FieldStrategy>) -> Self {
        Self { strategies }
    }

    /// A cascade of [`text_of`] strategies, one per selector string.
    pub fn text_of_each(selectors: &[String]) -> Result<Self> {
        let strategies = selectors
            .iter()
            .map(|s| parse_selector(s).map(text_of))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(strategies))
    }

    /// A cascade of [`attr_of`] strategies, one per selector string.
    pub fn attr_of_each(selectors: &[String], attrs: &'static [&'static str]) -> Result<Self> {
        let strategies = selectors
            .iter()
            .map(|s| parse_selector(s).map(|sel| attr_of(sel, attrs)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(strategies))
    }

    pub fn then(mut self, strategy: FieldStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn first_match(&self, element: ElementRef<'_>) -> Option<String> {
        self.strategies.iter().find_map(|strategy| strategy(element))
    }
}

pub fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| anyhow!("invalid selector {raw:?}: {e:?}"))
}

/// Trimmed text of the first matching descendant that has any.
pub fn text_of(selector: Selector) -> FieldStrategy {
    Box::new(move |element: ElementRef<'_>| {
        element
            .select(&selector)
            .map(visible_text)
            .find(|text| !text.is_empty())
    })
}

/// First non-empty attribute among `attrs` on the first matching descendant
/// that carries one.
pub fn attr_of(selector: Selector, attrs: &'static [&'static str]) -> FieldStrategy {
    Box::new(move |element: ElementRef<'_>| {
        element.select(&selector).find_map(|el| first_attr(el, attrs))
    })
}

/// Attribute on the candidate element itself.
pub fn own_attr(attr: &'static str) -> FieldStrategy {
    Box::new(move |element: ElementRef<'_>| first_attr(element, &[attr]))
}

fn first_attr(element: ElementRef<'_>, attrs: &[&str]) -> Option<String> {
    attrs
        .iter()
        .filter_map(|a| element.value().attr(a))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Text nodes joined by single spaces.
pub fn visible_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Absolute URL for `raw`, joined against `base` when relative.
///
/// Fragment-only and `javascript:` links count as absent.
pub fn resolve_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') || raw.starts_with("javascript:") {
        return None;
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    base.join(raw).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&parse_selector(css).unwrap()).next().unwrap()
    }

    #[test]
    fn cascade_takes_first_non_empty_strategy() {
        let doc = Html::parse_fragment(
            r#"<div class="card"><h2 class="title">  </h2><h3>Servo SG90</h3><span class="name">Other</span></div>"#,
        );
        let cascade = FieldCascade::text_of_each(&[
            "h2.title".to_string(),
            "h3".to_string(),
            ".name".to_string(),
        ])
        .unwrap();
        assert_eq!(cascade.first_match(first(&doc, "div.card")).as_deref(), Some("Servo SG90"));
    }

    #[test]
    fn attribute_fallbacks_in_order() {
        let doc = Html::parse_fragment(
            r#"<div class="card"><img data-src="/a.jpg"><img src="/b.jpg"></div>"#,
        );
        let cascade = FieldCascade::attr_of_each(&["img".to_string()], &["src", "data-src"]).unwrap();
        assert_eq!(cascade.first_match(first(&doc, "div.card")).as_deref(), Some("/a.jpg"));
    }

    #[test]
    fn own_attribute_strategy() {
        let doc = Html::parse_fragment(r#"<a class="card" href="/p/7">x</a>"#);
        let cascade = FieldCascade::new(Vec::new()).then(own_attr("href"));
        assert_eq!(cascade.first_match(first(&doc, "a.card")).as_deref(), Some("/p/7"));
    }

    #[test]
    fn visible_text_collapses_whitespace() {
        let doc = Html::parse_fragment("<div class=\"c\">\n  EGP <b>450</b>\n\t.00 </div>");
        assert_eq!(visible_text(first(&doc, "div.c")), "EGP 450 .00");
    }

    #[test]
    fn resolves_relative_urls() {
        let base = Url::parse("https://ekostra.com").unwrap();
        assert_eq!(
            resolve_url(&base, "/product/gps-neo-6m").as_deref(),
            Some("https://ekostra.com/product/gps-neo-6m")
        );
        assert_eq!(
            resolve_url(&base, "https://cdn.example/x.png").as_deref(),
            Some("https://cdn.example/x.png")
        );
        assert_eq!(resolve_url(&base, "#"), None);
        assert_eq!(resolve_url(&base, "javascript:void(0)"), None);
    }
}
