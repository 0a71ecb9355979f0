//! Read-through cache for blacklist lookups
//!
//! Entries (including misses) live until the key is invalidated; there is
//! no time-based expiry. Every write to the blacklist must go through
//! [`BlacklistCache::invalidate`] for the same key.

use crate::state::SuppressionKind;
use crate::storage::SuppressionEntry;
use parking_lot::RwLock;
use std::collections::HashMap;

type Key = (SuppressionKind, String);

#[derive(Default)]
pub struct BlacklistCache {
    entries: RwLock<HashMap<Key, Option<SuppressionEntry>>>,
}

impl BlacklistCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached lookup, or runs `load` and caches its result
    pub fn get_or_load<E>(
        &self,
        kind: SuppressionKind,
        value: &str,
        load: impl FnOnce() -> Result<Option<SuppressionEntry>, E>,
    ) -> Result<Option<SuppressionEntry>, E> {
        let key = (kind, value.to_string());

        if let Some(hit) = self.entries.read().get(&key) {
            return Ok(hit.clone());
        }

        let loaded = load()?;
        self.entries.write().insert(key, loaded.clone());
        Ok(loaded)
    }

    pub fn invalidate(&self, kind: SuppressionKind, value: &str) {
        self.entries.write().remove(&(kind, value.to_string()));
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SuppressionSource;
    use chrono::Utc;
    use std::cell::Cell;

    fn entry(value: &str) -> SuppressionEntry {
        SuppressionEntry {
            id: 7,
            kind: SuppressionKind::Domain,
            value: value.to_string(),
            reason: Some("competitor".to_string()),
            source: SuppressionSource::Manual,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_read_through_caches_misses() {
        let cache = BlacklistCache::new();
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok::<_, ()>(None)
        };

        assert_eq!(cache.get_or_load(SuppressionKind::Domain, "a.com", load).unwrap(), None);
        assert_eq!(cache.get_or_load(SuppressionKind::Domain, "a.com", load).unwrap(), None);
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn test_hit_returns_the_loaded_entry() {
        let cache = BlacklistCache::new();
        let stored = entry("rival.com");

        let first = cache
            .get_or_load(SuppressionKind::Domain, "rival.com", || Ok::<_, ()>(Some(stored.clone())))
            .unwrap();
        let second = cache
            .get_or_load(SuppressionKind::Domain, "rival.com", || Err(()))
            .unwrap();
        assert_eq!(first, Some(stored.clone()));
        assert_eq!(second, Some(stored));
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let cache = BlacklistCache::new();
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok::<_, ()>(None)
        };

        cache.get_or_load(SuppressionKind::Email, "a@b.com", load).unwrap();
        cache.invalidate(SuppressionKind::Email, "a@b.com");
        cache.get_or_load(SuppressionKind::Email, "a@b.com", load).unwrap();
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn test_keys_are_per_kind() {
        let cache = BlacklistCache::new();
        cache.get_or_load(SuppressionKind::Email, "x", || Ok::<_, ()>(None)).unwrap();
        cache.get_or_load(SuppressionKind::Domain, "x", || Ok::<_, ()>(None)).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
