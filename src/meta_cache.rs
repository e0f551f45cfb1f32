//! Memoized single-flight lookups keyed by source location

use crate::cancel::lock;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Concurrency-safe cache where each key is fetched at most once at a time.
///
/// Callers asking for a key whose fetch is in flight block until it finishes
/// and then share its result. Successful results are kept for the life of the
/// cache. Failures are not: a caller that waited on a failed fetch runs its
/// own.
pub struct MetaCache<V> {
    entries: Mutex<HashMap<String, Arc<Mutex<Option<V>>>>>,
    fetches: AtomicUsize,
}

impl<V: Clone> MetaCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn get_or_fetch<F>(&self, key: &str, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let slot = lock(&self.entries)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        // Holding the slot lock across the fetch is what makes it single-flight.
        let mut value = lock(&slot);
        if let Some(cached) = value.as_ref() {
            return Ok(cached.clone());
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        log::debug!("Fetching metadata for {}", key);
        let fetched = fetch()?;
        *value = Some(fetched.clone());
        Ok(fetched)
    }

    /// Number of fetches actually run.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries)
            .values()
            .filter(|slot| lock(slot).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for MetaCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
