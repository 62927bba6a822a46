// src/utils/cache.rs
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ndarray::ArrayView2;
use parking_lot::Mutex;

/// 64-bit content fingerprint of an input array and the parameters a
/// computation was run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn builder() -> FingerprintBuilder {
        FingerprintBuilder {
            hasher: DefaultHasher::new(),
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

pub struct FingerprintBuilder {
    hasher: DefaultHasher,
}

impl FingerprintBuilder {
    /// Feed shape and contents of an integer or label array.
    pub fn array<T: Hash>(mut self, array: ArrayView2<'_, T>) -> Self {
        array.dim().hash(&mut self.hasher);
        for value in array.iter() {
            value.hash(&mut self.hasher);
        }
        self
    }

    pub fn usizes(mut self, values: &[usize]) -> Self {
        values.hash(&mut self.hasher);
        self
    }

    /// Floats are hashed by bit pattern.
    pub fn floats(mut self, values: &[f64]) -> Self {
        values.len().hash(&mut self.hasher);
        for v in values {
            v.to_bits().hash(&mut self.hasher);
        }
        self
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint(self.hasher.finish())
    }
}

/// Thread-safe memo of expensive results keyed by input fingerprint.
///
/// The caller owns the cache and decides how long it lives; nothing is
/// memoized process-wide.
pub struct FeatureCache<V> {
    entries: Arc<Mutex<HashMap<Fingerprint, V>>>,
}

impl<V: Clone> FeatureCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, key: Fingerprint) -> Option<V> {
        self.entries.lock().get(&key).cloned()
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// Errors are returned as-is and nothing is stored. The lock is not held
    /// while `compute` runs.
    pub fn get_or_try_insert_with<E, F>(&self, key: Fingerprint, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            log::trace!("cache hit {:016x}", key.value());
            return Ok(value);
        }

        let value = compute()?;
        self.entries.lock().insert(key, value.clone());
        Ok(value)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for FeatureCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for FeatureCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fingerprint_depends_on_contents_and_params() {
        let a = array![[1u16, 2], [3, 4]];
        let b = array![[1u16, 2], [3, 5]];
        let fa = Fingerprint::builder().array(a.view()).usizes(&[1]).finish();
        assert_eq!(fa, Fingerprint::builder().array(a.view()).usizes(&[1]).finish());
        assert_ne!(fa, Fingerprint::builder().array(b.view()).usizes(&[1]).finish());
        assert_ne!(fa, Fingerprint::builder().array(a.view()).usizes(&[2]).finish());
    }

    #[test]
    fn computes_once_per_key() {
        let cache: FeatureCache<u32> = FeatureCache::new();
        let key = Fingerprint::builder().usizes(&[7]).finish();
        let mut calls = 0;
        for _ in 0..3 {
            let v: Result<u32, ()> = cache.get_or_try_insert_with(key, || {
                calls += 1;
                Ok(42)
            });
            assert_eq!(v, Ok(42));
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: FeatureCache<u32> = FeatureCache::new();
        let key = Fingerprint::builder().finish();
        let r: Result<u32, &str> = cache.get_or_try_insert_with(key, || Err("boom"));
        assert!(r.is_err());
        assert!(cache.is_empty());
    }
}
