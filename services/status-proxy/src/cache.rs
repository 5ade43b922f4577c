//! Short-lived response cache with an injectable clock

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::extractor::FallbackSource;
use crate::model::StatusPayload;

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock used in production
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a cached payload was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Json,
    Html(FallbackSource),
}

impl PayloadSource {
    /// Value of the `X-Proxy-Fallback` header
    pub fn fallback_marker(&self) -> &'static str {
        match self {
            PayloadSource::Json => "none",
            PayloadSource::Html(_) => "html",
        }
    }

    pub fn fallback_source(&self) -> Option<FallbackSource> {
        match self {
            PayloadSource::Json => None,
            PayloadSource::Html(source) => Some(*source),
        }
    }
}

/// An immutable cache entry; refreshes replace it wholesale
#[derive(Debug)]
pub struct CachedResponse {
    pub payload: StatusPayload,
    pub source: PayloadSource,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl CachedResponse {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }
}

/// Holds the single current entry
#[derive(Debug)]
pub struct ResponseCache {
    entry: RwLock<Option<Arc<CachedResponse>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entry: RwLock::new(None),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The current entry if it has not outlived its TTL
    pub async fn fresh(&self) -> Option<Arc<CachedResponse>> {
        let now = self.clock.now();
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|entry| entry.is_fresh(now))
            .map(Arc::clone)
    }

    /// The current entry, fresh or stale
    pub async fn current(&self) -> Option<Arc<CachedResponse>> {
        self.entry.read().await.clone()
    }

    /// Replace the current entry with a new one stamped now
    pub async fn install(
        &self,
        payload: StatusPayload,
        source: PayloadSource,
    ) -> Arc<CachedResponse> {
        let entry = Arc::new(CachedResponse {
            payload,
            source,
            fetched_at: self.clock.now(),
            ttl: self.ttl,
        });
        *self.entry.write().await = Some(Arc::clone(&entry));
        tracing::debug!("Cached status payload for {:?}", self.ttl);
        entry
    }
}
