//! Bounded per-endpoint model cache
//!
//! Entries are keyed by endpoint id and remember the locator they were loaded
//! from; a lookup with a different locator is a miss, so a redefined endpoint
//! never serves a stale model.

use crate::registry::EndpointId;
use crate::training::ModelArtifact;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CacheEntry {
    locator: String,
    model: Arc<ModelArtifact>,
    created_at: Instant,
    last_accessed: Instant,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
}

struct Inner {
    entries: HashMap<EndpointId, CacheEntry>,
    stats: CacheStats,
}

/// LRU cache with time-to-live; capacity 0 disables caching
pub struct ModelCache {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl ModelCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Model cached for `endpoint_id` if it was loaded from `locator` and is still fresh
    pub fn get(&self, endpoint_id: EndpointId, locator: &str) -> Option<Arc<ModelArtifact>> {
        if !self.is_enabled() {
            return None;
        }
        let mut inner = self.inner.lock();
        let usable = inner
            .entries
            .get(&endpoint_id)
            .map(|e| e.locator == locator && e.created_at.elapsed() <= self.ttl);
        let fresh = match usable {
            Some(true) => inner.entries.get_mut(&endpoint_id).map(|entry| {
                entry.last_accessed = Instant::now();
                Arc::clone(&entry.model)
            }),
            Some(false) => {
                inner.entries.remove(&endpoint_id);
                inner.stats.evictions += 1;
                None
            }
            None => None,
        };
        match fresh {
            Some(_) => inner.stats.hits += 1,
            None => inner.stats.misses += 1,
        }
        fresh
    }

    pub fn insert(&self, endpoint_id: EndpointId, locator: &str, model: Arc<ModelArtifact>) {
        if !self.is_enabled() {
            return;
        }
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&endpoint_id) && inner.entries.len() >= self.capacity {
            let lru = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(id, _)| *id);
            if let Some(id) = lru {
                inner.entries.remove(&id);
                inner.stats.evictions += 1;
            }
        }
        let now = Instant::now();
        inner.entries.insert(
            endpoint_id,
            CacheEntry {
                locator: locator.to_string(),
                model,
                created_at: now,
                last_accessed: now,
            },
        );
    }

    /// Drop the entry of a redefined or removed endpoint
    pub fn evict(&self, endpoint_id: EndpointId) {
        let mut inner = self.inner.lock();
        if inner.entries.remove(&endpoint_id).is_some() {
            inner.stats.evictions += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            ..inner.stats
        }
    }
}
