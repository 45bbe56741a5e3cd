//! Memoisation of pipeline runs.

use crate::config::{PipelineOptions, TransformConfig};
use crate::dataset::Dataset;
use crate::pipeline::bundle::ResultBundle;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Entries kept unless a capacity is given.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Identity of one pipeline request.
///
/// Hashing uses the dataset fingerprint; equality compares the dataset
/// contents as well, so two datasets whose fingerprints collide never share
/// an entry.
#[derive(Debug, Clone)]
pub struct CacheKey {
    fingerprint: u64,
    shape: (usize, usize),
    transform: TransformConfig,
    options: PipelineOptions,
    dataset: Dataset,
}

impl CacheKey {
    pub fn new(dataset: &Dataset, transform: &TransformConfig, options: &PipelineOptions) -> Self {
        Self {
            fingerprint: dataset.fingerprint(),
            shape: dataset.shape(),
            transform: *transform,
            options: options.clone(),
            dataset: dataset.clone(),
        }
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && self.shape == other.shape
            && self.transform == other.transform
            && self.options == other.options
            && self.dataset == other.dataset
    }
}

// Datasets in a key come from ingestion, whose bitwise equality is reflexive.
impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
        self.shape.hash(state);
        self.transform.hash(state);
        self.options.hash(state);
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, ResultBundle>,
    // insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Bounded, thread-safe store of finished bundles. The oldest entry is
/// evicted once capacity is reached.
#[derive(Debug)]
pub struct PipelineCache {
    state: RwLock<CacheState>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

static_assertions::assert_impl_all!(PipelineCache: Send, Sync);

impl Default for PipelineCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<ResultBundle> {
        let found = self.state.read().entries.get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, key: CacheKey, bundle: ResultBundle) {
        let mut state = self.state.write();
        if state.entries.insert(key.clone(), bundle).is_none() {
            state.order.push_back(key);
        }
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                debug!("Evicting cached bundle");
                state.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.order.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::bundle::Slot;

    fn dataset(last: f64) -> Dataset {
        Dataset::from_columns([("speed", vec![1.0, 2.0, last])]).unwrap()
    }

    fn bundle(label: &str) -> ResultBundle {
        ResultBundle {
            transform_label: label.to_string(),
            transformed: dataset(3.0),
            embedding: Slot::NotRequested,
            clusters: Slot::NotRequested,
            pivot: Slot::NotRequested,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_key_changes_with_inputs() {
        let options = PipelineOptions::default();
        let base = CacheKey::new(&dataset(3.0), &TransformConfig::None, &options);

        assert_eq!(
            base,
            CacheKey::new(&dataset(3.0), &TransformConfig::None, &options)
        );
        assert_ne!(
            base,
            CacheKey::new(&dataset(4.0), &TransformConfig::None, &options)
        );
        assert_ne!(
            base,
            CacheKey::new(&dataset(3.0), &TransformConfig::Derivative, &options)
        );

        let embed = PipelineOptions::builder().embed(true).build().unwrap();
        assert_ne!(base, CacheKey::new(&dataset(3.0), &TransformConfig::None, &embed));
    }

    #[test]
    fn test_fingerprint_collision_is_a_miss() {
        let options = PipelineOptions::default();
        let stored = CacheKey::new(&dataset(3.0), &TransformConfig::None, &options);
        let mut colliding = CacheKey::new(&dataset(4.0), &TransformConfig::None, &options);
        colliding.fingerprint = stored.fingerprint;

        assert_ne!(stored, colliding);

        let cache = PipelineCache::new();
        cache.insert(stored.clone(), bundle("None"));
        assert!(cache.get(&colliding).is_none());
        assert_eq!(cache.get(&stored), Some(bundle("None")));

        cache.insert(colliding.clone(), bundle("Other"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&colliding), Some(bundle("Other")));
    }

    #[test]
    fn test_get_and_insert() {
        let cache = PipelineCache::new();
        let key = CacheKey::new(&dataset(3.0), &TransformConfig::None, &PipelineOptions::default());

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), bundle("None"));
        assert_eq!(cache.get(&key), Some(bundle("None")));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let cache = PipelineCache::with_capacity(2);
        let options = PipelineOptions::default();
        let keys: Vec<CacheKey> = [1.0, 2.0, 3.0]
            .into_iter()
            .map(|v| CacheKey::new(&dataset(v), &TransformConfig::None, &options))
            .collect();

        for key in &keys {
            cache.insert(key.clone(), bundle("None"));
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[0]).is_none());
        assert!(cache.get(&keys[2]).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = PipelineCache::new();
        let key = CacheKey::new(&dataset(3.0), &TransformConfig::None, &PipelineOptions::default());
        cache.insert(key, bundle("None"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
