//! ANQP metadata cache
//!
//! Snapshots are keyed by `IdentityKey`, so every access point that shares a
//! HESSID (or an ANQP domain within an SSID) shares one entry. Entries are
//! never refreshed in place: a new fetch overwrites, a sweep evicts.

use crate::clock::Clock;
use passpoint_common::{AnqpElements, IdentityKey};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Decoded ANQP elements captured at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSnapshot {
    pub captured_at_ms: u64,
    pub elements: AnqpElements,
}

impl MetadataSnapshot {
    pub const fn new(captured_at_ms: u64, elements: AnqpElements) -> Self {
        Self {
            captured_at_ms,
            elements,
        }
    }

    /// Whether the snapshot is older than `staleness_ms` at `now_ms`
    pub const fn is_stale(&self, now_ms: u64, staleness_ms: u64) -> bool {
        now_ms.saturating_sub(self.captured_at_ms) >= staleness_ms
    }
}

/// Keyed ANQP snapshot store
pub struct MetadataCache {
    entries: HashMap<IdentityKey, MetadataSnapshot>,
    staleness_ms: u64,
    clock: Arc<dyn Clock>,
}

impl MetadataCache {
    pub fn new(staleness_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            staleness_ms,
            clock,
        }
    }

    /// Store `elements` captured now, replacing any previous snapshot
    pub fn insert(&mut self, key: IdentityKey, elements: AnqpElements) {
        let snapshot = MetadataSnapshot::new(self.clock.now_millis(), elements);
        debug!("Caching {} ANQP elements for {}", snapshot.elements.len(), key);
        self.entries.insert(key, snapshot);
    }

    pub fn lookup(&self, key: &IdentityKey) -> Option<&MetadataSnapshot> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Evict stale entries, returning how many were removed
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now_millis();
        let staleness = self.staleness_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, snapshot| !snapshot.is_stale(now, staleness));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Swept {} stale ANQP entries", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use passpoint_common::{AnqpElement, MacAddress, elements_from_list};

    fn key(bssid: u64) -> IdentityKey {
        IdentityKey::build("TestSSID", MacAddress::from_u64(bssid), 0, 0)
    }

    fn domain_elements(domain: &str) -> AnqpElements {
        elements_from_list([AnqpElement::DomainName(vec![domain.to_string()])])
    }

    #[test]
    fn test_insert_and_lookup() {
        let clock = Arc::new(ManualClock::new(100));
        let mut cache = MetadataCache::new(1_000, clock);
        assert!(cache.lookup(&key(1)).is_none());

        cache.insert(key(1), domain_elements("test.com"));
        let snapshot = cache.lookup(&key(1)).unwrap();
        assert_eq!(snapshot.captured_at_ms, 100);
        assert_eq!(snapshot.elements, domain_elements("test.com"));
        assert!(cache.lookup(&key(2)).is_none());
    }

    #[test]
    fn test_insert_overwrites() {
        let clock = Arc::new(ManualClock::new(0));
        let mut cache = MetadataCache::new(1_000, clock.clone());
        cache.insert(key(1), domain_elements("old.com"));
        clock.advance(10);
        cache.insert(key(1), domain_elements("new.com"));

        let snapshot = cache.lookup(&key(1)).unwrap();
        assert_eq!(snapshot.captured_at_ms, 10);
        assert_eq!(snapshot.elements, domain_elements("new.com"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_snapshot_is_cached() {
        let clock = Arc::new(ManualClock::new(0));
        let mut cache = MetadataCache::new(1_000, clock);
        cache.insert(key(1), AnqpElements::new());
        assert!(cache.contains(&key(1)));
    }

    #[test]
    fn test_sweep_evicts_stale_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let mut cache = MetadataCache::new(1_000, clock.clone());
        cache.insert(key(1), domain_elements("a.com"));
        clock.advance(600);
        cache.insert(key(2), domain_elements("b.com"));

        clock.advance(400);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.lookup(&key(1)).is_none());
        assert!(cache.lookup(&key(2)).is_some());

        clock.advance(600);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }
}
