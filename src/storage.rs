//! Adapter storage for one container
//!
//! Uses DashMap for lock-free concurrent lookups. Every entry carries a
//! registration sequence number, so enumeration can report registration order
//! without a second index.

use crate::adapter::ComponentAdapter;
use crate::{DiError, Key, Result, TypeKey};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One registered adapter
#[derive(Clone)]
pub(crate) struct Registered {
    pub seq: u64,
    pub adapter: Arc<dyn ComponentAdapter>,
    /// Deferred to first resolution instead of container start
    pub lazy: bool,
}

/// Keys in first-successful-resolution order, each at most once
#[derive(Default)]
struct Instantiated {
    order: Vec<Key>,
    seen: HashSet<Key, RandomState>,
}

/// Thread-safe key to adapter map plus the instantiation order
pub(crate) struct AdapterStorage {
    adapters: DashMap<Key, Registered, RandomState>,
    seq: AtomicU64,
    instantiated: Mutex<Instantiated>,
}

impl AdapterStorage {
    /// Create empty storage.
    ///
    /// 8 shards instead of the DashMap default of `num_cpus * 4`: containers
    /// rarely hold more than a few dozen components.
    pub(crate) fn new() -> Self {
        Self {
            adapters: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            seq: AtomicU64::new(0),
            instantiated: Mutex::new(Instantiated::default()),
        }
    }

    /// Insert an adapter under its own key; an existing key is a `DuplicateKey` error
    pub(crate) fn insert(&self, adapter: Arc<dyn ComponentAdapter>, lazy: bool) -> Result<()> {
        match self.adapters.entry(adapter.key().clone()) {
            Entry::Occupied(entry) => Err(DiError::DuplicateKey {
                key: entry.key().to_string(),
            }),
            Entry::Vacant(entry) => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                entry.insert(Registered { seq, adapter, lazy });
                Ok(())
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<Arc<dyn ComponentAdapter>> {
        self.adapters.get(key).map(|entry| Arc::clone(&entry.adapter))
    }

    #[inline]
    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.adapters.contains_key(key)
    }

    /// Remove the adapter under `key` and drop it from the instantiation order
    pub(crate) fn remove(&self, key: &Key) -> Option<Arc<dyn ComponentAdapter>> {
        let (_, registered) = self.adapters.remove(key)?;
        self.forget(key);
        Some(registered.adapter)
    }

    /// All entries in registration order
    pub(crate) fn ordered(&self) -> Vec<Registered> {
        let mut entries: Vec<Registered> = self
            .adapters
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_unstable_by_key(|registered| registered.seq);
        entries
    }

    /// Adapters assignable to `ty`, in registration order, without `exclude`
    pub(crate) fn assignable(&self, ty: TypeKey, exclude: Option<&Key>) -> Vec<Arc<dyn ComponentAdapter>> {
        let mut found: Vec<(u64, Arc<dyn ComponentAdapter>)> = self
            .adapters
            .iter()
            .filter(|entry| Some(entry.key()) != exclude && entry.adapter.provides(ty))
            .map(|entry| (entry.seq, Arc::clone(&entry.adapter)))
            .collect();
        found.sort_unstable_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, adapter)| adapter).collect()
    }

    /// Append `key` to the instantiation order; `false` if it was already there
    pub(crate) fn record_instantiated(&self, key: &Key) -> bool {
        let mut instantiated = self.instantiated.lock();
        if !instantiated.seen.insert(key.clone()) {
            return false;
        }
        instantiated.order.push(key.clone());
        true
    }

    pub(crate) fn instantiation_order(&self) -> Vec<Key> {
        self.instantiated.lock().order.clone()
    }

    pub(crate) fn forget(&self, key: &Key) {
        let mut instantiated = self.instantiated.lock();
        if instantiated.seen.remove(key) {
            instantiated.order.retain(|k| k != key);
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.adapters.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterStorage {
    fn default() -> Self {
        Self::new()
    }
}
