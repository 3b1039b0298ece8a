pub mod fetcher;

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::extract::strategy::visible_text;
use crate::extract::{has_price_token, Extractor};
use crate::models::ProductRecord;
use crate::stores::StoreProfile;
use fetcher::{Fetch, FetchError};

static DIV_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").unwrap());
static MEDIA_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a, img").unwrap());

#[derive(Debug, Clone, Copy)]
pub struct CrawlSettings {
    pub timeout: Duration,
    /// Pause between pages of the same store.
    pub page_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    Fetch(FetchError),
    /// Pages loaded but nothing on them became a record.
    NoProducts,
}

/// Result of one crawl; always carries a catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlOutcome {
    Success(Vec<ProductRecord>),
    Fallback {
        records: Vec<ProductRecord>,
        reason: FallbackReason,
    },
}

impl CrawlOutcome {
    pub fn records(&self) -> &[ProductRecord] {
        match self {
            CrawlOutcome::Success(records) => records,
            CrawlOutcome::Fallback { records, .. } => records,
        }
    }

    pub fn into_records(self) -> Vec<ProductRecord> {
        match self {
            CrawlOutcome::Success(records) => records,
            CrawlOutcome::Fallback { records, .. } => records,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, CrawlOutcome::Fallback { .. })
    }
}

pub struct Crawler<'a, F> {
    fetcher: &'a F,
    profile: &'a StoreProfile,
    extractor: Extractor<'a>,
    candidates: Vec<Selector>,
    settings: CrawlSettings,
}

impl<'a, F: Fetch> Crawler<'a, F> {
    pub fn new(fetcher: &'a F, profile: &'a StoreProfile, settings: CrawlSettings) -> Result<Self> {
        Ok(Self {
            fetcher,
            profile,
            extractor: Extractor::for_store(profile)?,
            candidates: profile.candidate_selectors()?,
            settings,
        })
    }

    /// Fetch the store's pages and extract its catalog.
    ///
    /// A failed root fetch or an empty extraction yields the store's fixed
    /// fallback catalog instead of an error. No retries.
    pub async fn crawl(&self, at: NaiveDateTime) -> CrawlOutcome {
        let store = self.profile.key.as_str();

        let root = match self.fetch_page(&self.profile.base_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(store, error = %e, "Fetch failed, using fallback catalog");
                return CrawlOutcome::Fallback {
                    records: self.profile.fallback_catalog(at),
                    reason: FallbackReason::Fetch(e),
                };
            }
        };

        let mut pages = vec![root];
        for path in &self.profile.extra_paths {
            sleep(self.settings.page_delay).await;
            let url = format!(
                "{}/{}",
                self.profile.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            );
            match self.fetch_page(&url).await {
                Ok(body) => pages.push(body),
                Err(e) => warn!(store, url = %url, error = %e, "Skipping extra page"),
            }
        }

        let records = self.extract_pages(&pages, at);
        if records.is_empty() {
            warn!(store, "No products extracted, using fallback catalog");
            return CrawlOutcome::Fallback {
                records: self.profile.fallback_catalog(at),
                reason: FallbackReason::NoProducts,
            };
        }

        info!(store, count = records.len(), "Extracted products");
        CrawlOutcome::Success(records)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "Fetching page");
        let res = self.fetcher.get(url, self.settings.timeout).await?;
        if !res.is_success() {
            return Err(FetchError::Status(res.status));
        }
        Ok(res.body)
    }

    /// Extract records from already-fetched page bodies, in page order.
    ///
    /// Candidate indices run across pages and stop at the store's cap.
    pub fn extract_pages(&self, pages: &[String], at: NaiveDateTime) -> Vec<ProductRecord> {
        let mut records = Vec::new();
        let mut index = 0usize;

        'pages: for body in pages {
            let doc = Html::parse_document(body);
            for element in self.candidates(&doc) {
                if index >= self.profile.max_elements {
                    break 'pages;
                }
                match self.extractor.extract(element, index, at) {
                    Ok(record) => records.push(record),
                    Err(e) => debug!(store = %self.profile.key, error = %e, "Skipping element"),
                }
                index += 1;
            }
        }

        records
    }

    /// Results of every candidate query, concatenated without de-duplication.
    ///
    /// When none match, falls back to any `div` holding a currency-marked
    /// number next to a link or image.
    pub fn candidates<'d>(&self, doc: &'d Html) -> Vec<ElementRef<'d>> {
        let found: Vec<ElementRef<'d>> = self
            .candidates
            .iter()
            .flat_map(|sel| doc.select(sel))
            .collect();
        if !found.is_empty() {
            return found;
        }

        doc.select(&DIV_SEL)
            .filter(|div| has_price_token(&visible_text(*div)))
            .filter(|div| div.select(&MEDIA_SEL).next().is_some())
            .collect()
    }
}
