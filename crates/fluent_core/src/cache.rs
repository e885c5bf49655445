//! The write-once integrity cache (§4.5).
//!
//! Every entry is keyed by a [`CacheKey`] fingerprint (§4.5/`fingerprint`) and,
//! once written, must never change: a second write under the same key is only
//! legal if it produces byte-identical bytes, otherwise the cache reports
//! [`IntegrityError::CacheCorruption`] rather than silently overwriting. This
//! is enforced under the crate's own [`crate::rwlock::RwLock`] rather than
//! `std::sync::RwLock`, matching the rest of the crate's preference for its
//! own concurrency primitives over ambient ones.
//!
//! Eviction uses a segmented LRU: entries start in the probationary segment
//! and are promoted to the protected segment on a second hit, mirroring the
//! undo-history bounded-stack pattern the teacher uses for session state
//! (`ouros::session_manager`'s `push_history`/`VecDeque` truncation), just
//! with two segments instead of one.

use std::collections::HashMap;

use crate::{error::IntegrityError, fingerprint::CacheKey, rwlock::RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Probationary,
    Protected,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    segment: Segment,
    weight: usize,
}

/// Order-tracking ring for one segment: front is least-recently-used.
#[derive(Debug, Default)]
struct Lru {
    order: Vec<CacheKey>,
}

impl Lru {
    fn touch(&mut self, key: CacheKey) {
        self.remove(key);
        self.order.push(key);
    }

    fn remove(&mut self, key: CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
    }

    fn pop_lru(&mut self) -> Option<CacheKey> {
        if self.order.is_empty() {
            None
        } else {
            Some(self.order.remove(0))
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    probationary: Lru,
    protected: Lru,
    total_bytes: usize,
}

/// A bounded, write-once, collision-detecting cache from [`CacheKey`] to a
/// formatted string. One instance lives per [`crate::bundle::Bundle`] and is
/// cleared wholesale whenever the bundle's generation advances (§4.5: "cache
/// invalidation ... is a single atomic generation bump").
#[derive(Debug)]
pub struct IntegrityCache {
    state: RwLock<CacheState>,
    max_entries: usize,
    max_bytes: usize,
    protected_ratio: f32,
}

/// What happened when a value was looked up or inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    Inserted,
}

impl IntegrityCache {
    #[must_use]
    pub fn new(max_entries: usize, max_bytes: usize, protected_ratio: f32) -> Self {
        Self { state: RwLock::new(CacheState::default()), max_entries, max_bytes, protected_ratio }
    }

    /// Looks up `key`, promoting a probationary hit to the protected segment.
    #[must_use]
    pub fn get(&self, key: CacheKey) -> Option<String> {
        let mut state = self.state.write();
        let promote = matches!(state.entries.get(&key), Some(entry) if entry.segment == Segment::Probationary);
        let value = state.entries.get(&key).map(|entry| entry.value.clone());
        if value.is_some() {
            if promote {
                state.probationary.remove(key);
                if let Some(entry) = state.entries.get_mut(&key) {
                    entry.segment = Segment::Protected;
                }
                state.protected.touch(key);
                Self::rebalance(&mut state, self.max_entries, self.protected_ratio);
            } else {
                state.protected.touch(key);
            }
        }
        value
    }

    /// Inserts `value` under `key`. If the key already holds a value, the new
    /// value must be byte-identical or this returns
    /// [`IntegrityError::CacheCorruption`] and leaves the cache unchanged.
    ///
    /// # Errors
    /// See above.
    pub fn insert(&self, key: CacheKey, value: String) -> Result<CacheOutcome, IntegrityError> {
        let mut state = self.state.write();
        if let Some(existing) = state.entries.get(&key) {
            return if existing.value == value {
                Ok(CacheOutcome::Hit)
            } else {
                Err(IntegrityError::CacheCorruption { key_summary: format!("{:x}", key.0) })
            };
        }
        let weight = value.len();
        state.entries.insert(key, Entry { value, segment: Segment::Probationary, weight });
        state.probationary.touch(key);
        state.total_bytes += weight;
        Self::evict_if_needed(&mut state, self.max_entries, self.max_bytes);
        Ok(CacheOutcome::Inserted)
    }

    fn rebalance(state: &mut CacheState, max_entries: usize, protected_ratio: f32) {
        let protected_cap = ((max_entries as f32) * protected_ratio) as usize;
        while state.protected.len() > protected_cap {
            if let Some(demoted) = state.protected.pop_lru() {
                if let Some(entry) = state.entries.get_mut(&demoted) {
                    entry.segment = Segment::Probationary;
                }
                state.probationary.touch(demoted);
            } else {
                break;
            }
        }
    }

    fn evict_if_needed(state: &mut CacheState, max_entries: usize, max_bytes: usize) {
        while state.entries.len() > max_entries || state.total_bytes > max_bytes {
            let victim = state.probationary.pop_lru().or_else(|| state.protected.pop_lru());
            let Some(victim) = victim else { break };
            if let Some(entry) = state.entries.remove(&victim) {
                state.total_bytes = state.total_bytes.saturating_sub(entry.weight);
            }
        }
    }

    /// Discards every entry, e.g. on a bundle generation bump.
    pub fn clear(&self) {
        let mut state = self.state.write();
        *state = CacheState::default();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> CacheKey {
        CacheKey(n)
    }

    #[test]
    fn miss_then_insert_then_hit() {
        let cache = IntegrityCache::new(100, 1024, 0.8);
        assert!(cache.get(key(1)).is_none());
        assert_eq!(cache.insert(key(1), "hello".to_string()).unwrap(), CacheOutcome::Inserted);
        assert_eq!(cache.get(key(1)), Some("hello".to_string()));
    }

    #[test]
    fn identical_rewrite_is_a_hit_not_corruption() {
        let cache = IntegrityCache::new(100, 1024, 0.8);
        cache.insert(key(1), "hello".to_string()).unwrap();
        assert_eq!(cache.insert(key(1), "hello".to_string()).unwrap(), CacheOutcome::Hit);
    }

    #[test]
    fn conflicting_rewrite_is_corruption() {
        let cache = IntegrityCache::new(100, 1024, 0.8);
        cache.insert(key(1), "hello".to_string()).unwrap();
        let err = cache.insert(key(1), "goodbye".to_string()).unwrap_err();
        assert!(matches!(err, IntegrityError::CacheCorruption { .. }));
    }

    #[test]
    fn eviction_respects_entry_cap() {
        let cache = IntegrityCache::new(2, 1024, 0.8);
        cache.insert(key(1), "a".to_string()).unwrap();
        cache.insert(key(2), "b".to_string()).unwrap();
        cache.insert(key(3), "c".to_string()).unwrap();
        assert!(cache.len() <= 2);
    }

    #[test]
    fn second_hit_promotes_to_protected_segment() {
        let cache = IntegrityCache::new(100, 1024, 0.8);
        cache.insert(key(1), "a".to_string()).unwrap();
        cache.get(key(1));
        let state = cache.state.read();
        assert_eq!(state.entries.get(&key(1)).unwrap().segment, Segment::Protected);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = IntegrityCache::new(100, 1024, 0.8);
        cache.insert(key(1), "a".to_string()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
