use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::classify::Vocabulary;
use crate::extract::strategy::parse_selector;
use crate::extract::Extractor;
use crate::models::{record_id, ProductRecord};

const PLACEHOLDER_IMAGE: &str =
    "https://images.unsplash.com/photo-1553406830-ef2513450d76?w=300&h=300&fit=crop";

/// Ordered CSS selector lists; within a list the first hit wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorSet {
    /// Queries whose results are concatenated into the candidate list.
    pub candidates: Vec<String>,
    pub name: Vec<String>,
    pub price: Vec<String>,
    #[serde(default = "default_image_selectors")]
    pub image: Vec<String>,
    #[serde(default = "default_link_selectors")]
    pub link: Vec<String>,
    #[serde(default = "default_availability_selectors")]
    pub availability: Vec<String>,
    #[serde(default = "default_brand_hint_selectors")]
    pub brand_hint: Vec<String>,
}

/// Deterministic values used when a field cannot be read from the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDefaults {
    pub price_base: f64,
    pub price_step: f64,
    pub rating_base: f64,
    pub rating_modulus: u32,
    /// Leads the generated description, e.g. "Professional".
    pub adjective: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackEntry {
    pub name: String,
    pub price: f64,
    pub brand: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreProfile {
    pub key: String,
    pub display_name: String,
    /// Leads synthetic product names; the display name when unset.
    #[serde(default)]
    pub name_prefix: Option<String>,
    pub base_url: String,
    pub file_name: String,
    pub price_log: String,
    pub new_products_log: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,
    /// Pages fetched after the root page, relative to `base_url`.
    #[serde(default)]
    pub extra_paths: Vec<String>,
    pub vocabulary: Vocabulary,
    pub selectors: SelectorSet,
    pub synthetic: SyntheticDefaults,
    #[serde(default)]
    pub fallback: Vec<FallbackEntry>,
}

impl StoreProfile {
    pub fn synthetic_price(&self, index: usize) -> f64 {
        self.synthetic.price_base + index as f64 * self.synthetic.price_step
    }

    pub fn synthetic_rating(&self, index: usize) -> f64 {
        let modulus = self.synthetic.rating_modulus.max(1) as usize;
        round_tenth(self.synthetic.rating_base + (index % modulus) as f64 * 0.1)
    }

    pub fn synthetic_image(&self, index: usize) -> String {
        format!("{}&sig={}_{}", PLACEHOLDER_IMAGE, self.key, index)
    }

    pub fn synthetic_link(&self, index: usize) -> String {
        format!("{}/product/{}", self.base_url.trim_end_matches('/'), index + 1)
    }

    pub fn synthetic_name(&self, index: usize) -> String {
        let prefix = self.name_prefix.as_deref().unwrap_or(&self.display_name);
        format!("{} Product {}", prefix, index + 1)
    }

    /// Parsed candidate queries, in configured order.
    pub fn candidate_selectors(&self) -> Result<Vec<Selector>> {
        self.selectors
            .candidates
            .iter()
            .map(|raw| parse_selector(raw))
            .collect()
    }

    /// The fixed catalog substituted when nothing could be crawled.
    pub fn fallback_catalog(&self, at: NaiveDateTime) -> Vec<ProductRecord> {
        self.fallback
            .iter()
            .enumerate()
            .map(|(i, entry)| ProductRecord {
                id: record_id(i),
                name: entry.name.clone(),
                price: entry.price,
                image: self.synthetic_image(i),
                brand: entry.brand.clone(),
                category: entry.category.clone(),
                store: self.display_name.clone(),
                availability: "In Stock".to_string(),
                rating: round_tenth(4.0 + (i % 10) as f64 * 0.1),
                description: format!(
                    "High quality {} from {}",
                    entry.category.to_lowercase(),
                    entry.brand
                ),
                link: self.synthetic_link(i),
                timestamp: at,
            })
            .collect()
    }
}

/// Static table of known stores, passed into the crawler and orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRegistry {
    stores: Vec<StoreProfile>,
}

impl StoreRegistry {
    pub fn new(stores: Vec<StoreProfile>) -> Result<Self> {
        for (i, store) in stores.iter().enumerate() {
            if stores[..i].iter().any(|s| s.key == store.key) {
                bail!("duplicate store key: {}", store.key);
            }
            Extractor::for_store(store)
                .and_then(|_| store.candidate_selectors())
                .with_context(|| format!("invalid profile for store {}", store.key))?;
        }
        Ok(Self { stores })
    }

    /// Load a registry from a JSON file shaped like `{"stores": [...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read store registry {}", path.display()))?;
        let parsed: StoreRegistry = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse store registry {}", path.display()))?;
        Self::new(parsed.stores)
    }

    pub fn get(&self, key: &str) -> Option<&StoreProfile> {
        self.stores.iter().find(|s| s.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.stores.iter().map(|s| s.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoreProfile> {
        self.stores.iter()
    }

    /// Override every store's element cap.
    pub fn cap_elements(&mut self, max: usize) {
        for store in &mut self.stores {
            store.max_elements = max;
        }
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self {
            stores: builtin_stores(),
        }
    }
}

fn builtin_stores() -> Vec<StoreProfile> {
    vec![
        StoreProfile {
            max_elements: 1000,
            vocabulary: Vocabulary::new(
                &["Arduino", "Raspberry Pi", "ESP32", "Espressif", "Microchip"],
                &["Development Board", "Sensor", "Motor", "Display", "Component"],
            ),
            selectors: selector_set(&["div", "article"], &["product", "item", "card"], &["h2", "h3", "h4", "a"]),
            synthetic: synthetic(100.0, 50.0, 4.0, 10, "Quality"),
            fallback: fallback(&[
                ("Arduino Uno R3 Development Board", 450.0, "Arduino", "Development Boards"),
                ("ESP32-CAM + ESP32-CAM-MB - 2MP OV2640", 165.0, "Espressif", "Wireless Modules"),
                ("Raspberry Pi 4 Model B 4GB RAM", 1250.0, "Raspberry Pi", "Single Board Computers"),
                ("Arduino Mega 2560", 650.0, "Arduino", "Development Boards"),
                ("ESP8266 NodeMCU Lua", 75.0, "Espressif", "Wireless Modules"),
                ("Breadboard 830 Points", 45.0, "Generic", "Components"),
                ("Jumper Wires 120pcs", 35.0, "Generic", "Components"),
                ("DC Motor 12V 100RPM", 125.0, "Generic", "Motors"),
                ("LED Assortment 100pcs", 55.0, "Generic", "Components"),
                ("Soldering Iron Station", 280.0, "Generic", "Tools"),
            ]),
            ..store("microohm", "Microohm", "https://microohm-eg.com")
        },
        StoreProfile {
            vocabulary: Vocabulary::new(
                &["Raspberry Pi", "Arduino", "ESP", "Samsung", "LG"],
                &["Single Board", "Wireless", "Display", "Sensor", "Kit"],
            ),
            selectors: selector_set(&["div", "li"], &["product", "item", "listing"], &["h2", "h3", "a"]),
            synthetic: synthetic(150.0, 75.0, 4.2, 8, "Professional"),
            fallback: fallback(&[
                ("Raspberry Pi Pico W", 95.0, "Raspberry Pi", "Microcontrollers"),
                ("ESP32 DevKit V1 WiFi Bluetooth", 85.0, "Espressif", "Wireless Modules"),
                ("Arduino Nano Every", 220.0, "Arduino", "Development Boards"),
                ("Raspberry Pi 3 Model B+", 750.0, "Raspberry Pi", "Single Board Computers"),
                ("OLED Display 128x64 I2C", 65.0, "Generic", "Displays"),
                ("Ultrasonic Sensor HC-SR04", 25.0, "Generic", "Sensors"),
                ("PIR Motion Sensor", 30.0, "Generic", "Sensors"),
                ("Relay 5V 1 Channel", 25.0, "Generic", "Components"),
                ("Servo Motor SG90", 85.0, "Generic", "Motors"),
                ("LCD Display 16x2 Blue", 45.0, "Generic", "Displays"),
            ]),
            ..store("electrohub", "ElectroHub", "https://electrohub.com.eg")
        },
        StoreProfile {
            vocabulary: Vocabulary::new(
                &["ESP", "Arduino", "Raspberry", "Texas Instruments", "Analog Devices"],
                &["Module", "Sensor", "Wireless", "IC", "Component"],
            ),
            selectors: selector_set(&["div", "article"], &["product", "item"], &["h2", "h3", "span"]),
            synthetic: synthetic(80.0, 40.0, 4.1, 9, "Advanced"),
            fallback: fallback(&[
                ("RFID Module RC522", 55.0, "Generic", "RFID"),
                ("Fingerprint Sensor", 120.0, "Generic", "Sensors"),
                ("GPS Module NEO-6M", 185.0, "Generic", "GPS"),
                ("Bluetooth Module HC-05", 75.0, "Generic", "Wireless"),
                ("WiFi Module ESP8266", 95.0, "Espressif", "Wireless Modules"),
                ("Temperature Sensor DHT22", 35.0, "Generic", "Sensors"),
                ("Pressure Sensor BMP280", 45.0, "Generic", "Sensors"),
                ("Stepper Motor NEMA 17", 180.0, "Generic", "Motors"),
                ("Logic Analyzer 8 Channel", 450.0, "Generic", "Test Equipment"),
                ("Function Generator", 650.0, "Generic", "Test Equipment"),
            ]),
            ..store("ekostra", "Ekostra", "https://ekostra.com")
        },
        StoreProfile {
            vocabulary: Vocabulary::new(
                &["Fluke", "Keysight", "Tektronix", "Rigol", "Siglent"],
                &["Test Equipment", "Power Supply", "Oscilloscope", "Multimeter", "Generator"],
            ),
            selectors: selector_set(&["div", "li"], &["product", "item"], &["h2", "h3", "a"]),
            synthetic: synthetic(200.0, 100.0, 4.3, 7, "Professional"),
            fallback: fallback(&[
                ("Digital Multimeter", 220.0, "Generic", "Test Equipment"),
                ("Oscilloscope Digital", 1250.0, "Generic", "Test Equipment"),
                ("Power Supply 30V 5A", 850.0, "Generic", "Power Supplies"),
                ("Resistor Kit 1/4W 1000pcs", 85.0, "Generic", "Components"),
                ("Capacitor Kit 100pcs", 95.0, "Generic", "Components"),
                ("Transistor Kit 200pcs", 120.0, "Generic", "Components"),
                ("Diode Kit 100pcs", 65.0, "Generic", "Components"),
                ("IC Kit 50 Types", 185.0, "Generic", "Components"),
                ("Arduino Starter Kit", 1250.0, "Arduino", "Kits"),
                ("3D Printer Kit", 2850.0, "Generic", "3D Printing"),
            ]),
            name_prefix: Some("RAM".to_string()),
            extra_paths: vec!["/shop".to_string(), "/products".to_string(), "/category".to_string()],
            ..store("ram", "RAM Electronics", "https://ram-e-shop.com")
        },
    ]
}

/// Skeleton profile; callers override the store-specific parts.
fn store(key: &str, display_name: &str, base_url: &str) -> StoreProfile {
    StoreProfile {
        key: key.to_string(),
        display_name: display_name.to_string(),
        name_prefix: None,
        base_url: base_url.to_string(),
        file_name: format!("{key}_products.csv"),
        price_log: format!("{key}_price_changes.log"),
        new_products_log: format!("{key}_new_products.log"),
        currency: default_currency(),
        max_elements: default_max_elements(),
        extra_paths: Vec::new(),
        vocabulary: Vocabulary::new(&[], &[]),
        selectors: selector_set(&["div"], &["product"], &["h2", "h3"]),
        synthetic: synthetic(100.0, 50.0, 4.0, 10, "Quality"),
        fallback: Vec::new(),
    }
}

/// Builds the usual storefront selector set: product cards are `card_tags`
/// whose class mentions any of `card_classes`, titled by a `title_tags`
/// element whose class mentions "title" or "name".
fn selector_set(card_tags: &[&str], card_classes: &[&str], title_tags: &[&str]) -> SelectorSet {
    let candidates = card_classes
        .iter()
        .flat_map(|class| {
            card_tags
                .iter()
                .map(move |tag| format!("{tag}[class*=\"{class}\"]"))
        })
        .collect();

    SelectorSet {
        candidates,
        name: vec![
            class_group(title_tags, &["title", "name"]),
            ".product-title, .product-name".to_string(),
            "h2, h3, h4".to_string(),
        ],
        price: vec![
            class_group(&["span", "div"], &["price", "cost"]),
            ".amount, .value, .price-current".to_string(),
        ],
        image: default_image_selectors(),
        link: default_link_selectors(),
        availability: default_availability_selectors(),
        brand_hint: default_brand_hint_selectors(),
    }
}

fn class_group(tags: &[&str], classes: &[&str]) -> String {
    classes
        .iter()
        .flat_map(|class| tags.iter().map(move |tag| format!("{tag}[class*=\"{class}\"]")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn synthetic(
    price_base: f64,
    price_step: f64,
    rating_base: f64,
    rating_modulus: u32,
    adjective: &str,
) -> SyntheticDefaults {
    SyntheticDefaults {
        price_base,
        price_step,
        rating_base,
        rating_modulus,
        adjective: adjective.to_string(),
    }
}

fn fallback(entries: &[(&str, f64, &str, &str)]) -> Vec<FallbackEntry> {
    entries
        .iter()
        .map(|(name, price, brand, category)| FallbackEntry {
            name: name.to_string(),
            price: *price,
            brand: brand.to_string(),
            category: category.to_string(),
        })
        .collect()
}

fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn default_currency() -> String {
    "EGP".to_string()
}

fn default_max_elements() -> usize {
    20
}

fn default_image_selectors() -> Vec<String> {
    vec!["img".to_string()]
}

fn default_link_selectors() -> Vec<String> {
    vec!["a[href]".to_string()]
}

fn default_availability_selectors() -> Vec<String> {
    vec![".stock, .availability, .in-stock".to_string()]
}

fn default_brand_hint_selectors() -> Vec<String> {
    vec![".brand, .manufacturer".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn builtin_registry_is_valid() {
        let registry = StoreRegistry::default();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, ["microohm", "electrohub", "ekostra", "ram"]);

        // Same validation a JSON registry goes through.
        StoreRegistry::new(registry.iter().cloned().collect()).unwrap();
    }

    #[test]
    fn every_builtin_store_has_ten_fallback_products() {
        for store in StoreRegistry::default().iter() {
            assert_eq!(store.fallback.len(), 10, "{}", store.key);
            assert_eq!(store.file_name, format!("{}_products.csv", store.key));
        }
    }

    #[test]
    fn fallback_catalog_is_deterministic() {
        let registry = StoreRegistry::default();
        let ram = registry.get("ram").unwrap();
        let first = ram.fallback_catalog(at());
        assert_eq!(first, ram.fallback_catalog(at()));

        assert_eq!(first[0].id, 1);
        assert_eq!(first[0].name, "Digital Multimeter");
        assert_eq!(first[0].store, "RAM Electronics");
        assert_eq!(first[0].link, "https://ram-e-shop.com/product/1");
        assert_eq!(first[3].rating, 4.3);
        assert_eq!(first[8].brand, "Arduino");
        assert_eq!(first[8].description, "High quality kits from Arduino");
    }

    #[test]
    fn synthetic_values_follow_store_parameters() {
        let registry = StoreRegistry::default();
        let hub = registry.get("electrohub").unwrap();
        assert_eq!(hub.synthetic_price(0), 150.0);
        assert_eq!(hub.synthetic_price(3), 375.0);
        assert_eq!(hub.synthetic_rating(2), 4.4);
        assert_eq!(hub.synthetic_rating(8), 4.2);
        assert!(hub.synthetic_image(4).ends_with("sig=electrohub_4"));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let registry = StoreRegistry::default();
        let ram = registry.get("ram").unwrap().clone();
        assert!(StoreRegistry::new(vec![ram.clone(), ram]).is_err());
    }

    #[test]
    fn bad_selector_is_rejected() {
        let mut profile = StoreRegistry::default().get("ekostra").unwrap().clone();
        profile.selectors.price = vec!["span[[".to_string()];
        assert!(StoreRegistry::new(vec![profile]).is_err());
    }

    #[test]
    fn bad_candidate_query_is_rejected() {
        let mut profile = StoreRegistry::default().get("ram").unwrap().clone();
        profile.selectors.candidates.push("div[class*=".to_string());
        assert!(profile.candidate_selectors().is_err());
        assert!(StoreRegistry::new(vec![profile]).is_err());
    }

    #[test]
    fn synthetic_names_use_the_short_prefix_when_set() {
        let registry = StoreRegistry::default();
        assert_eq!(registry.get("ram").unwrap().synthetic_name(1), "RAM Product 2");
        assert_eq!(registry.get("ekostra").unwrap().synthetic_name(0), "Ekostra Product 1");
    }

    #[test]
    fn ram_crawls_its_shop_sections() {
        let registry = StoreRegistry::default();
        assert_eq!(
            registry.get("ram").unwrap().extra_paths,
            ["/shop", "/products", "/category"]
        );
    }

    #[test]
    fn registry_loads_from_json_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stores.json");
        std::fs::write(
            &path,
            r#"{"stores": [{
                "key": "demo",
                "display_name": "Demo Shop",
                "base_url": "https://demo.example",
                "file_name": "demo_products.csv",
                "price_log": "demo_price_changes.log",
                "new_products_log": "demo_new_products.log",
                "vocabulary": {"brands": ["Acme"], "categories": ["Tools"]},
                "selectors": {
                    "candidates": ["div.card"],
                    "name": [".title"],
                    "price": [".price"]
                },
                "synthetic": {
                    "price_base": 10.0, "price_step": 5.0,
                    "rating_base": 4.0, "rating_modulus": 5,
                    "adjective": "Fine"
                }
            }]}"#,
        )
        .unwrap();

        let registry = StoreRegistry::from_json_file(&path).unwrap();
        let demo = registry.get("demo").unwrap();
        assert_eq!(demo.currency, "EGP");
        assert_eq!(demo.max_elements, 20);
        assert_eq!(demo.selectors.link, vec!["a[href]".to_string()]);
        assert!(demo.fallback.is_empty());
    }
}
