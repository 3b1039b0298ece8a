use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::changelog::ChangeLogWriter;
use crate::config::Config;
use crate::crawler::fetcher::Fetch;
use crate::crawler::Crawler;
use crate::diff::diff_catalogs;
use crate::models::ChangeEvent;
use crate::storage::CatalogStore;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unknown store: {0}")]
    UnknownStore(String),
    #[error("invalid profile for {store}: {reason}")]
    InvalidProfile { store: String, reason: String },
}

/// Outcome of one store's cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSummary {
    pub store: String,
    pub products_count: usize,
    pub new_products_count: usize,
    pub price_changes_count: usize,
    /// Catalog and change logs were both written.
    pub saved: bool,
    pub fallback_used: bool,
    pub changes: Vec<ChangeEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreFailure {
    pub store: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllStoresSummary {
    pub timestamp: NaiveDateTime,
    pub total_products: usize,
    pub total_price_changes: usize,
    pub total_new_products: usize,
    /// Registry order.
    pub stores: Vec<ScrapeSummary>,
    pub errors: Vec<StoreFailure>,
}

impl AllStoresSummary {
    fn collect(results: Vec<(String, Result<ScrapeSummary, String>)>) -> Self {
        let mut stores = Vec::new();
        let mut errors = Vec::new();
        for (store, result) in results {
            match result {
                Ok(summary) => stores.push(summary),
                Err(error) => errors.push(StoreFailure { store, error }),
            }
        }

        Self {
            timestamp: Local::now().naive_local(),
            total_products: stores.iter().map(|s| s.products_count).sum(),
            total_price_changes: stores.iter().map(|s| s.price_changes_count).sum(),
            total_new_products: stores.iter().map(|s| s.new_products_count).sum(),
            stores,
            errors,
        }
    }
}

/// Crawl, diff, log and persist, per store.
pub struct Scraper<F> {
    config: Config,
    fetcher: F,
    storage: CatalogStore,
    changelog: ChangeLogWriter,
}

impl<F: Fetch> Scraper<F> {
    pub fn new(config: Config, fetcher: F) -> Self {
        let storage = CatalogStore::new(&config.data_dir);
        let changelog = ChangeLogWriter::new(&config.data_dir);
        Self {
            config,
            fetcher,
            storage,
            changelog,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// One full cycle for a store. Only an unknown or broken profile errors;
    /// fetch and persistence problems show up in the summary.
    pub async fn scrape_store(&self, key: &str) -> Result<ScrapeSummary, ScrapeError> {
        let profile = self
            .config
            .stores
            .get(key)
            .ok_or_else(|| ScrapeError::UnknownStore(key.to_string()))?;
        let crawler = Crawler::new(&self.fetcher, profile, self.config.crawl_settings()).map_err(
            |e| ScrapeError::InvalidProfile {
                store: key.to_string(),
                reason: format!("{e:#}"),
            },
        )?;

        let now = Local::now().naive_local();
        let previous = self.storage.load(profile);
        let outcome = crawler.crawl(now).await;
        let fallback_used = outcome.is_fallback();
        let records = outcome.into_records();

        let diff = diff_catalogs(&previous, &records, now);
        let logged = match self.changelog.append(profile, &diff, now) {
            Ok(()) => true,
            Err(e) => {
                error!(store = key, error = %format!("{e:#}"), "Failed to write change logs");
                false
            }
        };
        let saved = self.storage.save(profile, &records) && logged;

        info!(
            store = key,
            products = records.len(),
            new = diff.new_products.len(),
            price_changes = diff.price_changes.len(),
            saved,
            fallback = fallback_used,
            "Store scraped"
        );

        Ok(ScrapeSummary {
            store: key.to_string(),
            products_count: records.len(),
            new_products_count: diff.new_products.len(),
            price_changes_count: diff.price_changes.len(),
            saved,
            fallback_used,
            changes: diff.events(),
        })
    }

    /// Every store in registry order, pausing `store_delay` between them.
    pub async fn scrape_sequential(&self) -> AllStoresSummary {
        let keys: Vec<String> = self.config.stores.keys().map(str::to_string).collect();
        let pb = progress_bar(keys.len());

        let mut results = Vec::with_capacity(keys.len());
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                sleep(self.config.store_delay).await;
            }
            pb.set_message(key.clone());
            let result = self.scrape_store(&key).await.map_err(|e| e.to_string());
            results.push((key, result));
            pb.inc(1);
        }
        pb.finish_and_clear();

        AllStoresSummary::collect(results)
    }
}

impl<F: Fetch + 'static> Scraper<F> {
    /// Sequential when `concurrency` is 1, otherwise a bounded worker pool
    /// where each worker pauses `store_delay` after its store.
    pub async fn scrape_all(self: &Arc<Self>) -> AllStoresSummary {
        let concurrency = self.config.concurrency;
        if concurrency <= 1 {
            return self.scrape_sequential().await;
        }

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let keys: Vec<String> = self.config.stores.keys().map(str::to_string).collect();
        let pb = progress_bar(keys.len());
        info!(stores = keys.len(), concurrency, "Scraping stores in parallel");

        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            let scraper = Arc::clone(self);
            let sem = Arc::clone(&semaphore);
            let pb = pb.clone();
            let task_key = key.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let result = scraper.scrape_store(&task_key).await;
                pb.inc(1);
                sleep(scraper.config.store_delay).await;
                result
            });
            handles.push((key, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let result = match handle.await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) => {
                    warn!(store = %key, error = %e, "Store task failed");
                    Err(e.to_string())
                }
            };
            results.push((key, result));
        }
        pb.finish_and_clear();

        AllStoresSummary::collect(results)
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}
