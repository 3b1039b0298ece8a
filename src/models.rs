use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One catalog entry. Field order matches the persisted column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: u32,
    /// Natural key within a store's catalog.
    pub name: String,
    /// `0.0` doubles as "unparsable or absent".
    pub price: f64,
    pub image: String,
    pub brand: String,
    pub category: String,
    pub store: String,
    pub availability: String,
    pub rating: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    pub timestamp: NaiveDateTime,
}

/// 1-based record id for the candidate at `index`, saturating at `u32::MAX`.
pub fn record_id(index: usize) -> u32 {
    u32::try_from(index.saturating_add(1)).unwrap_or(u32::MAX)
}

/// A store's catalog keyed by product name.
///
/// Duplicate names collapse to the last record seen.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: HashMap<String, ProductRecord>,
}

impl Catalog {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ProductRecord>,
    {
        let records = records
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        Self { records }
    }

    pub fn get(&self, name: &str) -> Option<&ProductRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceChange {
    pub name: String,
    pub old_price: f64,
    pub new_price: f64,
    /// `None` when the previous price was zero.
    pub change_percent: Option<f64>,
    pub timestamp: NaiveDateTime,
}

impl PriceChange {
    pub fn new(name: &str, old_price: f64, new_price: f64, timestamp: NaiveDateTime) -> Self {
        let change_percent = if old_price == 0.0 {
            None
        } else {
            Some((new_price - old_price) / old_price * 100.0)
        };
        Self {
            name: name.to_string(),
            old_price,
            new_price,
            change_percent,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    PriceChange(PriceChange),
    NewProduct(ProductRecord),
}

/// Result of comparing two snapshots of the same store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogDiff {
    pub price_changes: Vec<PriceChange>,
    pub new_products: Vec<ProductRecord>,
}

impl CatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.price_changes.is_empty() && self.new_products.is_empty()
    }

    /// Price changes first, then new products, each in diff order.
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.price_changes
            .iter()
            .cloned()
            .map(ChangeEvent::PriceChange)
            .chain(self.new_products.iter().cloned().map(ChangeEvent::NewProduct))
            .collect()
    }
}
