//! TTL key-value cache
//!
//! JSON values with per-entry deadlines. Expired entries are invisible to
//! readers and evicted lazily on access.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Concurrent TTL cache of JSON values.
#[derive(Default)]
pub struct TtlCache {
    entries: DashMap<String, Entry>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a JSON-encoded value. Serialization failures are logged and
    /// dropped; callers never see cache errors.
    pub fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        value,
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
            Err(e) => warn!(key, error = %e, "cache write dropped"),
        }
    }

    /// Read a value, if present and not expired.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                match serde_json::from_value(entry.value.clone()) {
                    Ok(value) => return Some(value),
                    Err(e) => {
                        warn!(key, error = %e, "cache read failed to decode");
                        return None;
                    }
                }
            }
        }
        // Expired: evict outside the read guard.
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Entries currently stored, expired or not (for health output).
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

    #[test]
    fn test_put_get_roundtrip() {
        let cache = TtlCache::new();
        cache.put("k", &vec![1u32, 2, 3], Duration::from_secs(60));
        assert_eq!(cache.get::<Vec<u32>>("k"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_missing_key() {
        let cache = TtlCache::new();
        assert_eq!(cache.get::<u32>("absent"), None);
    }

    #[test]
    fn test_expired_entry_is_invisible() {
        let cache = TtlCache::new();
        cache.put("k", &42u32, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get::<u32>("k"), None);
        // And it was evicted.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove() {
        let cache = TtlCache::new();
        cache.put("k", &1u32, Duration::from_secs(60));
        cache.remove("k");
        assert_eq!(cache.get::<u32>("k"), None);
    }

    #[test]
    fn test_overwrite_refreshes_value() {
        let cache = TtlCache::new();
        cache.put("k", &1u32, Duration::from_secs(60));
        cache.put("k", &2u32, Duration::from_secs(60));
        assert_eq!(cache.get::<u32>("k"), Some(2));
    }

    #[test]
    fn test_type_mismatch_reads_as_none() {
        let cache = TtlCache::new();
        cache.put("k", &"text", Duration::from_secs(60));
        assert_eq!(cache.get::<u32>("k"), None);
    }
}
