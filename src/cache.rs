use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::dedup::{self, SeenSet};
use crate::fetcher::{Fetcher, NewsItem};

/// An atomically published view of the last successful aggregate fetch.
/// Replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub items: Vec<NewsItem>,
    pub fetched_at: DateTime<Utc>,
}

/// State touched only while holding the refresh mutex.
#[derive(Default)]
struct RefreshState {
    seen: SeenSet,
    /// Completion time of the last refresh attempt, whatever its outcome.
    /// Waiters attach to an attempt that completed after they entered,
    /// even one that published nothing new.
    last_attempt: Option<DateTime<Utc>>,
}

/// TTL-bound cache over the aggregate fetch, with single-flight refresh.
///
/// The refresh mutex owns the seen set, so the set has exactly one writer
/// at a time and refreshes never run concurrently. Callers that arrive while
/// a refresh is in flight block on the mutex and attach to its result
/// instead of fetching again.
pub struct NewsCache {
    fetcher: Fetcher,
    ttl: chrono::Duration,
    lookback: chrono::Duration,
    snapshot: RwLock<Arc<CacheSnapshot>>,
    refresh_state: Mutex<RefreshState>,
}

impl NewsCache {
    pub fn new(fetcher: Fetcher, ttl: chrono::Duration, lookback: chrono::Duration) -> Self {
        let empty = Arc::new(CacheSnapshot {
            items: Vec::new(),
            fetched_at: DateTime::<Utc>::MIN_UTC,
        });
        Self {
            fetcher,
            ttl,
            lookback,
            snapshot: RwLock::new(empty),
            refresh_state: Mutex::new(RefreshState::default()),
        }
    }

    pub async fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Return the cached items, refreshing first when the snapshot is empty
    /// or older than the TTL.
    pub async fn get_or_refresh(&self) -> Vec<NewsItem> {
        {
            let snap = self.snapshot.read().await;
            if !snap.items.is_empty() && Utc::now() - snap.fetched_at <= self.ttl {
                return snap.items.clone();
            }
        }
        self.refresh().await
    }

    /// Run the full fetch-and-dedup cycle and publish a new snapshot.
    ///
    /// When the cycle yields no new items (all sources failed, or everything
    /// was already seen) the previous snapshot is retained and returned, so
    /// a transient outage does not erase cached content.
    pub async fn refresh(&self) -> Vec<NewsItem> {
        let entered_at = Utc::now();
        let mut state = self.refresh_state.lock().await;

        // Another caller completed an attempt while we waited for the lock;
        // its outcome is our result, even when it yielded nothing new.
        if state.last_attempt.is_some_and(|t| t >= entered_at) {
            return self.snapshot.read().await.items.clone();
        }

        info!("Updating news cache");
        let (items, report) = self.fetcher.fetch_all(self.lookback).await;
        let failed = report.failed_sources();
        if !failed.is_empty() {
            warn!("{} source(s) failed this cycle: {}", failed.len(), failed.join(", "));
        }

        let fresh = dedup::filter(items, &mut state.seen);
        state.last_attempt = Some(Utc::now());
        if fresh.is_empty() {
            warn!("Refresh produced no new items, keeping previous snapshot");
            return self.snapshot.read().await.items.clone();
        }

        info!("Cache updated with {} articles", fresh.len());
        let snap = Arc::new(CacheSnapshot {
            items: fresh.clone(),
            fetched_at: Utc::now(),
        });
        *self.snapshot.write().await = snap;
        fresh
    }

    /// Schedule a refresh without blocking; the caller gets no result.
    pub fn force_refresh_async(self: &Arc<Self>) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            cache.refresh().await;
        });
    }
}
