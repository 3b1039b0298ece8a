pub mod strategy;

use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use reqwest::Url;
use scraper::ElementRef;
use thiserror::Error;

use crate::models::{record_id, ProductRecord};
use crate::price::try_normalize_price;
use crate::stores::StoreProfile;
use strategy::{own_attr, resolve_url, visible_text, FieldCascade};

/// Price-looking token: a currency marker next to a number, either side.
static CURRENCY_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\b(?:egp|l\.?e\.?)|ج\.?م|جنيه|[£$€])\s?\d[\d.,]*|\d[\d.,]*\s?(?:(?:egp|l\.?e)\b|ج\.?م|جنيه|[£$€])",
    )
    .unwrap()
});

const IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-lazy"];
const DEFAULT_AVAILABILITY: &str = "In Stock";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// Element has no text, image or link to build a record from.
    #[error("candidate element {0} has no usable content")]
    NoContent(usize),
}

/// Turns candidate elements of one store's pages into product records.
pub struct Extractor<'a> {
    profile: &'a StoreProfile,
    base_url: Url,
    name: FieldCascade,
    price: FieldCascade,
    image: FieldCascade,
    link: FieldCascade,
    availability: FieldCascade,
    brand_hint: FieldCascade,
}

impl<'a> Extractor<'a> {
    pub fn for_store(profile: &'a StoreProfile) -> Result<Self> {
        let selectors = &profile.selectors;
        let base_url = Url::parse(&profile.base_url)
            .with_context(|| format!("invalid base url {}", profile.base_url))?;

        Ok(Self {
            profile,
            base_url,
            name: FieldCascade::text_of_each(&selectors.name)?,
            price: FieldCascade::text_of_each(&selectors.price)?,
            image: FieldCascade::attr_of_each(&selectors.image, IMAGE_ATTRS)?,
            link: FieldCascade::attr_of_each(&selectors.link, &["href"])?.then(own_attr("href")),
            availability: FieldCascade::text_of_each(&selectors.availability)?,
            brand_hint: FieldCascade::text_of_each(&selectors.brand_hint)?,
        })
    }

    /// Build the record for the candidate at `index`.
    ///
    /// Every field has a deterministic fallback, so the only failure is an
    /// element that carries nothing at all.
    pub fn extract(
        &self,
        element: ElementRef<'_>,
        index: usize,
        at: NaiveDateTime,
    ) -> Result<ProductRecord, ExtractError> {
        let text = visible_text(element);
        let raw_image = self.image.first_match(element);
        let raw_link = self.link.first_match(element);
        if text.is_empty() && raw_image.is_none() && raw_link.is_none() {
            return Err(ExtractError::NoContent(index));
        }

        let p = self.profile;
        let name = self
            .name
            .first_match(element)
            .unwrap_or_else(|| p.synthetic_name(index));
        let price = self
            .price_from_selectors(element)
            .or_else(|| price_from_text(&text))
            .unwrap_or_else(|| p.synthetic_price(index));

        let image = raw_image
            .filter(|src| !is_placeholder(src))
            .and_then(|src| resolve_url(&self.base_url, &src))
            .unwrap_or_else(|| p.synthetic_image(index));
        let link = raw_link
            .and_then(|href| resolve_url(&self.base_url, &href))
            .unwrap_or_else(|| p.synthetic_link(index));

        let hint = self.brand_hint.first_match(element);
        let lowered_name = name.to_lowercase();
        let brand = p
            .vocabulary
            .brand_of(&lowered_name)
            .map(str::to_string)
            .or_else(|| hint.clone())
            .unwrap_or_else(|| p.vocabulary.default_brand.clone());
        let category_haystack = match &hint {
            Some(h) => format!("{} {}", lowered_name, h.to_lowercase()),
            None => lowered_name,
        };
        let category = p
            .vocabulary
            .category_of(&category_haystack)
            .unwrap_or(p.vocabulary.default_category.as_str())
            .to_string();

        let availability = self
            .availability
            .first_match(element)
            .unwrap_or_else(|| DEFAULT_AVAILABILITY.to_string());

        Ok(ProductRecord {
            id: record_id(index),
            description: format!(
                "{} {} from {}",
                p.synthetic.adjective,
                category.to_lowercase(),
                brand
            ),
            name,
            price,
            image,
            brand,
            category,
            store: p.display_name.clone(),
            availability,
            rating: p.synthetic_rating(index),
            link,
            timestamp: at,
        })
    }

    fn price_from_selectors(&self, element: ElementRef<'_>) -> Option<f64> {
        self.price
            .first_match(element)
            .and_then(|text| positive_price(&text))
    }
}

/// Whether `text` carries a currency marker next to a number.
pub fn has_price_token(text: &str) -> bool {
    CURRENCY_TOKEN_RE.is_match(text)
}

/// First currency-marked token in `text` that normalizes to a positive price.
pub fn price_from_text(text: &str) -> Option<f64> {
    CURRENCY_TOKEN_RE
        .find_iter(text)
        .find_map(|m| positive_price(m.as_str()))
}

// A zero here means "nothing usable", so the cascade moves on.
fn positive_price(text: &str) -> Option<f64> {
    try_normalize_price(text).filter(|v| *v > 0.0)
}

fn is_placeholder(src: &str) -> bool {
    let lower = src.to_lowercase();
    lower.contains("placeholder") || lower.contains("default")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::StoreRegistry;
    use chrono::NaiveDate;
    use scraper::{Html, Selector};

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn extract_all(store: &str, html: &str) -> Vec<Result<ProductRecord, ExtractError>> {
        let registry = StoreRegistry::default();
        let profile = registry.get(store).unwrap();
        let extractor = Extractor::for_store(profile).unwrap();
        let doc = Html::parse_document(html);
        let cards = Selector::parse("div.card").unwrap();
        doc.select(&cards)
            .enumerate()
            .map(|(i, el)| extractor.extract(el, i, at()))
            .collect()
    }

    #[test]
    fn reads_fields_from_markup() {
        let html = r#"
            <div class="card">
              <a href="/product/uno-r3"><img src="/img/uno.jpg"></a>
              <h3 class="product-title">Arduino Uno R3 Development Board</h3>
              <span class="price">EGP 450.00</span>
              <span class="stock">Out of stock</span>
            </div>"#;
        let record = extract_all("microohm", html).remove(0).unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.name, "Arduino Uno R3 Development Board");
        assert_eq!(record.price, 450.0);
        assert_eq!(record.image, "https://microohm-eg.com/img/uno.jpg");
        assert_eq!(record.link, "https://microohm-eg.com/product/uno-r3");
        assert_eq!(record.brand, "Arduino");
        assert_eq!(record.category, "Development Board");
        assert_eq!(record.availability, "Out of stock");
        assert_eq!(record.store, "Microohm");
        assert_eq!(record.rating, 4.0);
        assert_eq!(record.description, "Quality development board from Arduino");
    }

    #[test]
    fn price_falls_back_to_currency_text() {
        let html = r#"<div class="card"><h2 class="name">GPS Module NEO-6M</h2><p>Now only 185 EGP!</p></div>"#;
        let record = extract_all("ekostra", html).remove(0).unwrap();
        assert_eq!(record.price, 185.0);
    }

    #[test]
    fn price_without_any_marker_is_synthetic_for_index() {
        let html = r#"
            <div class="card"><h3 class="title">Rigol DS1054Z Oscilloscope</h3></div>
            <div class="card"><h3 class="title">Siglent SDG1032X</h3><p>ask us</p></div>
            <div class="card"><h3 class="title">Fluke 117</h3><span class="price">call</span></div>"#;
        let prices: Vec<f64> = extract_all("ram", html)
            .into_iter()
            .map(|r| r.unwrap().price)
            .collect();
        assert_eq!(prices, vec![200.0, 300.0, 400.0]);

        // Same element, same index, same price on every run.
        let again: Vec<f64> = extract_all("ram", html)
            .into_iter()
            .map(|r| r.unwrap().price)
            .collect();
        assert_eq!(prices, again);
    }

    #[test]
    fn unparsable_selector_price_uses_text_scan_then_synthetic() {
        // "1.234,50" normalizes to zero, which the cascade treats as missing.
        let html = r#"<div class="card"><h3 class="title">Logic Analyzer</h3><span class="price">1.234,50</span></div>"#;
        let record = extract_all("ram", html).remove(0).unwrap();
        assert_eq!(record.price, 200.0);
    }

    #[test]
    fn missing_name_image_and_link_use_store_placeholders() {
        let html = r#"<div class="card"><p>£ 30</p><img src="/assets/placeholder.png"></div>"#;
        let record = extract_all("electrohub", html).remove(0).unwrap();
        assert_eq!(record.name, "ElectroHub Product 1");
        assert_eq!(record.price, 30.0);
        assert!(record.image.ends_with("sig=electrohub_0"));
        assert_eq!(record.link, "https://electrohub.com.eg/product/1");
        assert_eq!(record.brand, "Generic");
        assert_eq!(record.category, "Electronics");
    }

    #[test]
    fn brand_hint_used_when_vocabulary_misses() {
        let html = r#"<div class="card"><h3 class="title">Bench PSU 30V</h3><span class="brand">Owon Power Supply</span></div>"#;
        let record = extract_all("ram", html).remove(0).unwrap();
        assert_eq!(record.brand, "Owon Power Supply");
        assert_eq!(record.category, "Power Supply");
    }

    #[test]
    fn empty_element_is_skipped() {
        let html = r#"<div class="card">   </div><div class="card"><h3 class="title">Relay</h3></div>"#;
        let results = extract_all("electrohub", html);
        assert_eq!(results[0], Err(ExtractError::NoContent(0)));
        assert_eq!(results[1].as_ref().unwrap().name, "Relay");
    }

    #[test]
    fn currency_token_scan() {
        assert_eq!(price_from_text("was EGP 500 now EGP 450"), Some(500.0));
        assert_eq!(price_from_text("Price: 1250 LE"), Some(1250.0));
        assert_eq!(price_from_text("٣٥ ج.م"), Some(35.0));
        assert_eq!(price_from_text("12 pieces in stock"), None);
        assert_eq!(price_from_text("$0"), None);
    }

    #[test]
    fn part_names_do_not_count_as_prices() {
        assert!(has_price_token("Power Supply 30V 5A 850 EGP"));
        assert!(has_price_token("LE 120"));
        assert!(!has_price_token("LED STRIPS 5050"));
        assert!(!has_price_token("BLE MODULE HC-05"));
        assert!(!has_price_token("USB CABLE 2M SALE 20%"));
    }
}
