//! Bounded cache of deobfuscated throttling parameters
//!
//! A video typically exposes 10 to 30 formats. Every format has its own
//! streaming url, but the obfuscated 'n' parameter is the same for all of
//! them, so once one url is deobfuscated the rest can be rewritten from the
//! cache without running the rule evaluator again.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Default number of 'n' parameter pairs kept in memory
pub const DEFAULT_CAPACITY: usize = 50;

/// Insertion-ordered map from obfuscated to deobfuscated 'n' parameter.
///
/// Eviction is FIFO by insertion: a lookup never renews an entry's position.
/// Values are never updated in place, re-inserting a known key is a no-op.
pub struct ThrottlingParameterCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl ThrottlingParameterCache {
    /// Create a cache with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity + 1),
                order: VecDeque::with_capacity(capacity + 1),
            }),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Insert a pair, evicting the oldest inserted entry when full.
    ///
    /// Returns `false` when the key was already present.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            return false;
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, value.into());

        while inner.order.len() > self.capacity {
            if let Some(eldest) = inner.order.pop_front() {
                inner.entries.remove(&eldest);
            }
        }
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

impl Default for ThrottlingParameterCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_and_get() {
        let cache = ThrottlingParameterCache::new();

        assert!(cache.is_empty());
        assert!(cache.put("obf123", "deobf1"));
        assert_eq!(cache.get("obf123"), Some("deobf1".to_string()));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entries_are_immutable() {
        let cache = ThrottlingParameterCache::new();

        assert!(cache.put("key", "first"));
        assert!(!cache.put("key", "second"));
        assert_eq!(cache.get("key"), Some("first".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let cache = ThrottlingParameterCache::new();

        for i in 0..51 {
            cache.put(format!("key{}", i), format!("value{}", i));
        }

        assert_eq!(cache.len(), 50);
        assert!(!cache.contains("key0"));
        for i in 1..51 {
            assert_eq!(cache.get(&format!("key{}", i)), Some(format!("value{}", i)));
        }
    }

    #[test]
    fn test_access_does_not_renew_position() {
        let cache = ThrottlingParameterCache::with_capacity(3);

        cache.put("a", "1");
        cache.put("b", "2");
        cache.put("c", "3");

        // Reading "a" must not protect it from eviction
        assert_eq!(cache.get("a"), Some("1".to_string()));
        cache.put("d", "4");

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = ThrottlingParameterCache::with_capacity(0);
        assert_eq!(cache.capacity(), 1);

        cache.put("a", "1");
        cache.put("b", "2");
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_clear() {
        let cache = ThrottlingParameterCache::new();
        cache.put("a", "1");
        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.put("a", "2"));
        assert_eq!(cache.get("a"), Some("2".to_string()));
    }

    #[test]
    fn test_concurrent_inserts_never_exceed_capacity() {
        let cache = Arc::new(ThrottlingParameterCache::with_capacity(50));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        cache.put(format!("t{}-{}", t, i), "v");
                        assert!(cache.len() <= 50);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 50);
        let inner = cache.inner.lock();
        assert_eq!(inner.order.len(), inner.entries.len());
    }
}
