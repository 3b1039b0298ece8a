use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::models::{CatalogDiff, PriceChange, ProductRecord};
use crate::stores::StoreProfile;

/// Appends human-readable diff blocks to each store's two log files.
///
/// Append-only: no rotation, no locking.
pub struct ChangeLogWriter {
    dir: PathBuf,
}

impl ChangeLogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn price_log_path(&self, store: &StoreProfile) -> PathBuf {
        self.dir.join(&store.price_log)
    }

    pub fn new_products_log_path(&self, store: &StoreProfile) -> PathBuf {
        self.dir.join(&store.new_products_log)
    }

    /// Write one block per non-empty event list.
    pub fn append(&self, store: &StoreProfile, diff: &CatalogDiff, at: NaiveDateTime) -> Result<()> {
        let stamp = iso_timestamp(at);

        if !diff.price_changes.is_empty() {
            let lines = diff.price_changes.iter().map(format_price_change);
            append_block(
                &self.price_log_path(store),
                &format!("Price Changes - {stamp}"),
                lines,
            )?;
        }

        if !diff.new_products.is_empty() {
            let lines = diff
                .new_products
                .iter()
                .map(|p| format_new_product(p, &store.currency));
            append_block(
                &self.new_products_log_path(store),
                &format!("New Products - {stamp}"),
                lines,
            )?;
        }

        Ok(())
    }
}

/// `name: old -> new (+x.x%)`, or `(from zero)` when no percent exists.
pub fn format_price_change(change: &PriceChange) -> String {
    let delta = match change.change_percent {
        Some(pct) => format!("{pct:+.1}%"),
        None => "from zero".to_string(),
    };
    format!(
        "{}: {:.2} -> {:.2} ({})",
        change.name, change.old_price, change.new_price, delta
    )
}

pub fn format_new_product(product: &ProductRecord, currency: &str) -> String {
    format!("{}: {:.2} {}", product.name, product.price, currency)
}

fn iso_timestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn append_block<I>(path: &Path, title: &str, lines: I) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
    }

    let mut block = format!("\n=== {title} ===\n");
    for line in lines {
        block.push_str(&line);
        block.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log {}", path.display()))?;
    file.write_all(block.as_bytes())
        .with_context(|| format!("Failed to append to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::StoreRegistry;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_micro_opt(9, 30, 0, 250)
            .unwrap()
    }

    fn product(name: &str, price: f64) -> ProductRecord {
        let registry = StoreRegistry::default();
        let mut record = registry.get("microohm").unwrap().fallback_catalog(at()).remove(0);
        record.name = name.to_string();
        record.price = price;
        record
    }

    #[test]
    fn price_change_lines() {
        let up = PriceChange::new("Arduino Mega 2560", 650.0, 715.0, at());
        assert_eq!(format_price_change(&up), "Arduino Mega 2560: 650.00 -> 715.00 (+10.0%)");

        let down = PriceChange::new("Servo", 100.0, 87.5, at());
        assert_eq!(format_price_change(&down), "Servo: 100.00 -> 87.50 (-12.5%)");

        let from_zero = PriceChange::new("Relay", 0.0, 25.0, at());
        assert_eq!(format_price_change(&from_zero), "Relay: 0.00 -> 25.00 (from zero)");
    }

    #[test]
    fn appends_blocks_without_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::default();
        let store = registry.get("microohm").unwrap();
        let writer = ChangeLogWriter::new(dir.path());

        let diff = CatalogDiff {
            price_changes: vec![PriceChange::new("Arduino Mega 2560", 650.0, 715.0, at())],
            new_products: vec![product("Jumper Wires 120pcs", 35.0)],
        };
        writer.append(store, &diff, at()).unwrap();
        writer.append(store, &diff, at()).unwrap();

        let prices = fs::read_to_string(dir.path().join("microohm_price_changes.log")).unwrap();
        let expected = "\n=== Price Changes - 2025-03-01T09:30:00.000250 ===\n\
                        Arduino Mega 2560: 650.00 -> 715.00 (+10.0%)\n";
        assert_eq!(prices, expected.repeat(2));

        let news = fs::read_to_string(dir.path().join("microohm_new_products.log")).unwrap();
        assert_eq!(
            news,
            "\n=== New Products - 2025-03-01T09:30:00.000250 ===\nJumper Wires 120pcs: 35.00 EGP\n".repeat(2)
        );
    }

    #[test]
    fn empty_lists_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::default();
        let store = registry.get("ram").unwrap();
        let writer = ChangeLogWriter::new(dir.path());

        writer.append(store, &CatalogDiff::default(), at()).unwrap();
        assert!(!writer.price_log_path(store).exists());
        assert!(!writer.new_products_log_path(store).exists());
    }
}
