//! Per-provider memoization of loaded sources.
//!
//! Each locator gets its own slot guarded by its own lock, so concurrent
//! first accesses to one locator load it once while other locators proceed
//! independently. Failed loads leave the slot empty.

use crate::providers::LoadPolicy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A loaded payload and when it was loaded.
#[derive(Debug)]
pub struct CacheEntry<P> {
    pub payload: Arc<P>,
    pub loaded_at: Instant,
}

impl<P> Clone for CacheEntry<P> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            loaded_at: self.loaded_at,
        }
    }
}

type Slot<P> = Arc<Mutex<Option<CacheEntry<P>>>>;

/// Read-through cache keyed by source locator.
pub struct SourceCache<P> {
    name: &'static str,
    slots: Mutex<HashMap<String, Slot<P>>>,
}

impl<P> SourceCache<P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached payload for `locator`, running `load` when the slot
    /// is empty or stale under `policy`.
    pub fn get_or_load<E, F>(&self, locator: &str, policy: LoadPolicy, load: F) -> Result<Arc<P>, E>
    where
        F: FnOnce() -> Result<P, E>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(locator.to_string()).or_default())
        };

        let mut entry = slot.lock();
        if let Some(cached) = entry.as_ref() {
            let fresh = match policy {
                LoadPolicy::Cached => true,
                LoadPolicy::ReloadOlderThan(since) => cached.loaded_at >= since,
            };
            if fresh {
                return Ok(Arc::clone(&cached.payload));
            }
            debug!(cache = self.name, locator = %locator, "Reloading stale source");
        } else {
            debug!(cache = self.name, locator = %locator, "Loading source");
        }

        let payload = Arc::new(load()?);
        *entry = Some(CacheEntry {
            payload: Arc::clone(&payload),
            loaded_at: Instant::now(),
        });
        Ok(payload)
    }

    /// Cached entry without triggering a load.
    pub fn peek(&self, locator: &str) -> Option<CacheEntry<P>> {
        let slot = self.slots.lock().get(locator).cloned()?;
        let entry = slot.lock();
        entry.clone()
    }

    pub fn invalidate(&self, locator: &str) {
        self.slots.lock().remove(locator);
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Number of locators currently holding a payload.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<P>> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|s| s.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
