//! Time-bounded cache for PDP decisions

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::types::{PdpResponse, MAX_CACHE_DURATION};

/// Storage for PDP decisions.
///
/// Values are shared immutably; a new decision for a key replaces the old
/// entry wholesale.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    /// Cached decision for `key`, if present and not expired
    async fn get(&self, key: &str) -> Option<Arc<PdpResponse>>;

    /// Store `value` under `key`, expiring `ttl` from now
    async fn set(&self, key: &str, value: Arc<PdpResponse>, ttl: Duration);
}

/// Cache entry with an absolute expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<PdpResponse>,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Default spacing between sweeps of expired entries
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<String, CacheEntry>,
    last_purge: Option<Instant>,
}

impl Store {
    fn purge(&mut self, now: Instant) {
        self.entries.retain(|_, e| !e.is_expired(now));
        self.last_purge = Some(now);
    }
}

/// In-process permission cache. Eviction is time-based only.
///
/// Expired entries are dropped when read, and swept from the whole map on
/// insert at most once per purge interval.
#[derive(Debug, Clone)]
pub struct MemoryPermissionCache {
    store: Arc<RwLock<Store>>,
    purge_interval: Duration,
}

impl Default for MemoryPermissionCache {
    fn default() -> Self {
        Self {
            store: Arc::default(),
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

impl MemoryPermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purge_interval(mut self, purge_interval: Duration) -> Self {
        self.purge_interval = purge_interval;
        self
    }

    /// Absolute expiry of the entry stored under `key`
    pub async fn expires_at(&self, key: &str) -> Option<Instant> {
        self.store.read().await.entries.get(key).map(|e| e.expires_at)
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry
    pub async fn purge_expired(&self) {
        self.store.write().await.purge(Instant::now());
    }
}

#[async_trait]
impl PermissionCache for MemoryPermissionCache {
    async fn get(&self, key: &str) -> Option<Arc<PdpResponse>> {
        let now = Instant::now();
        {
            let store = self.store.read().await;
            match store.entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired; only remove it if nobody replaced it in the meantime.
        let mut store = self.store.write().await;
        if store.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            store.entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: Arc<PdpResponse>, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(MAX_CACHE_DURATION))
            .unwrap_or(now);

        let mut store = self.store.write().await;
        let due = store
            .last_purge
            .map_or(true, |last| now.duration_since(last) >= self.purge_interval);
        if due {
            let before = store.entries.len();
            store.purge(now);
            let purged = before - store.entries.len();
            if purged > 0 {
                tracing::debug!("Purged {} expired permission cache entries", purged);
            }
        }
        store.entries.insert(key.to_string(), CacheEntry { value, expires_at });
    }
}
