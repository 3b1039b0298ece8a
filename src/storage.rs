use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::models::{Catalog, ProductRecord};
use crate::stores::StoreProfile;

/// Per-store CSV snapshots under one data directory.
///
/// Each cycle reads once and writes once; concurrent cycles for the same
/// store can clobber each other.
pub struct CatalogStore {
    dir: PathBuf,
}

impl CatalogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, store: &StoreProfile) -> PathBuf {
        self.dir.join(&store.file_name)
    }

    /// Previous snapshot, empty when missing or unreadable.
    pub fn load(&self, store: &StoreProfile) -> Catalog {
        match self.load_records(store) {
            Ok(records) => {
                info!(store = %store.key, count = records.len(), "Loaded previous catalog");
                Catalog::from_records(records)
            }
            Err(e) => {
                error!(store = %store.key, error = %e, "Failed to load previous catalog");
                Catalog::default()
            }
        }
    }

    /// Rows in file order. Rows that fail to parse are skipped.
    pub fn load_records(&self, store: &StoreProfile) -> Result<Vec<ProductRecord>> {
        let path = self.path(store);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<ProductRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => warn!(store = %store.key, row = line + 1, error = %e, "Skipping bad row"),
            }
        }
        Ok(records)
    }

    /// Replace the snapshot wholesale. Reports failure instead of erroring.
    pub fn save(&self, store: &StoreProfile, records: &[ProductRecord]) -> bool {
        match self.write_records(store, records) {
            Ok(()) => {
                info!(store = %store.key, count = records.len(), "Saved catalog");
                true
            }
            Err(e) => {
                error!(store = %store.key, error = %e, "Failed to save catalog");
                false
            }
        }
    }

    fn write_records(&self, store: &StoreProfile, records: &[ProductRecord]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path(store);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}
