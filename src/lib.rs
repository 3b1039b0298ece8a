//! Periodic product-catalog tracking for online electronics stores.
//!
//! Each cycle crawls a store, extracts normalized product records, diffs them
//! against the previous snapshot and appends price changes and new listings
//! to per-store logs.

pub mod changelog;
pub mod classify;
pub mod config;
pub mod crawler;
pub mod diff;
pub mod extract;
pub mod models;
pub mod price;
pub mod scrape;
pub mod storage;
pub mod stores;
