use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::models::{Catalog, CatalogDiff, PriceChange, ProductRecord};

/// Compare a fresh crawl against the previous snapshot of the same store.
///
/// Names are the only identity, so a renamed product shows up as new and its
/// old name is never reported. Prices are compared exactly. Events follow the
/// order in which names first appear in `current`; a repeated name uses its
/// last record.
pub fn diff_catalogs(
    previous: &Catalog,
    current: &[ProductRecord],
    at: NaiveDateTime,
) -> CatalogDiff {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &ProductRecord> = HashMap::new();
    for record in current {
        if latest.insert(record.name.as_str(), record).is_none() {
            order.push(record.name.as_str());
        }
    }

    let mut diff = CatalogDiff::default();
    for name in order {
        let record = latest[name];
        match previous.get(name) {
            Some(old) if old.price != record.price => {
                diff.price_changes
                    .push(PriceChange::new(name, old.price, record.price, at));
            }
            Some(_) => {}
            None => diff.new_products.push(record.clone()),
        }
    }
    diff
}
