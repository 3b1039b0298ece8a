use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::crawler::CrawlSettings;
use crate::stores::StoreRegistry;

pub struct Config {
    pub data_dir: PathBuf,
    pub timeout: Duration,
    /// Pause after each store, per worker.
    pub store_delay: Duration,
    pub page_delay: Duration,
    /// Stores scraped at once; 1 runs them one after another.
    pub concurrency: usize,
    pub user_agent: Option<String>,
    pub stores: StoreRegistry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            timeout: Duration::from_secs(10),
            store_delay: Duration::from_secs(2),
            page_delay: Duration::from_millis(300),
            concurrency: 1,
            user_agent: None,
            stores: StoreRegistry::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by any `CATALOG_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("CATALOG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "CATALOG_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "CATALOG_STORE_DELAY_MS")? {
            config.store_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "CATALOG_PAGE_DELAY_MS")? {
            config.page_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parsed::<usize, _>(&lookup, "CATALOG_CONCURRENCY")? {
            config.concurrency = n.max(1);
        }
        config.user_agent = lookup("CATALOG_USER_AGENT");

        if let Some(path) = lookup("CATALOG_STORES_FILE") {
            config.stores = StoreRegistry::from_json_file(Path::new(&path))?;
        }
        if let Some(max) = parsed::<usize, _>(&lookup, "CATALOG_MAX_ELEMENTS")? {
            config.stores.cap_elements(max);
        }

        Ok(config)
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            timeout: self.timeout,
            page_delay: self.page_delay,
        }
    }
}

fn parsed<T, L>(lookup: &L, key: &str) -> Result<Option<T>>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} must be a number, got {raw:?}"))
        })
        .transpose()
}
