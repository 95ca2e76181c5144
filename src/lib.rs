//! News Digest - an AI news aggregation and email digest service.
//!
//! This crate fetches configured news feeds, deduplicates and time-filters
//! the items, caches the aggregate with a TTL, and dispatches a rendered
//! digest to subscribers on a daily schedule or on demand.

pub mod cache;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod fetcher;
pub mod routes;
pub mod scheduler;
pub mod subscribers;
