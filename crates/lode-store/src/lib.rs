//! # lode-store
//!
//! In-memory value storage for the lode DHT node.
//!
//! Values are keyed by the 40-character hex form of their content hash and
//! expire 24 hours after their last access: a successful `get` refreshes
//! the entry's timestamp, so values that keep being read keep living.
//! Nothing persists across restarts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Entry time-to-live in milliseconds (24 hours), measured from the last
/// access.
pub const TTL_MS: i64 = 86_400_000;

/// Maximum stored value size in bytes. Keeps a STORE datagram with JSON
/// overhead under the transport's receive buffer.
pub const MAX_VALUE_LEN: usize = 8 * 1024;

/// Error types for store operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// The key is empty.
    #[error("invalid key")]
    InvalidKey,

    /// The value is empty.
    #[error("invalid value")]
    InvalidValue,

    /// The value exceeds the maximum allowed size.
    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    /// The timestamp lies outside the `[now - TTL, now]` window.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// No live entry exists for the key.
    #[error("unknown key: {0}")]
    UnknownKey(String),
}

/// Convenience result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone, Debug)]
struct StoredValue {
    value: String,
    last_access_ms: i64,
}

/// Thread-safe map from hex key to value with TTL eviction.
///
/// A single mutex guards the map; every operation is O(1) under the lock
/// except [`KvStore::clean`], which scans all entries.
#[derive(Default)]
pub struct KvStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl KvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] or [`StoreError::InvalidValue`]
    /// for empty inputs, [`StoreError::ValueTooLarge`] past the size cap.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_with_timestamp(key, value, now_ms())
    }

    /// Store `value` under `key` with an explicit last-access timestamp.
    ///
    /// # Errors
    ///
    /// In addition to the [`KvStore::put`] validations, returns
    /// [`StoreError::InvalidTimestamp`] if `timestamp_ms` lies outside
    /// `[now - TTL, now]`.
    pub fn put_with_timestamp(&self, key: &str, value: &str, timestamp_ms: i64) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey);
        }
        if value.is_empty() {
            return Err(StoreError::InvalidValue);
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(StoreError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_LEN,
            });
        }
        if !timestamp_is_live(timestamp_ms, now_ms()) {
            return Err(StoreError::InvalidTimestamp(timestamp_ms));
        }

        let mut entries = self.lock();
        entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                last_access_ms: timestamp_ms,
            },
        );
        Ok(())
    }

    /// Fetch the value for `key`, refreshing its TTL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] for an empty key and
    /// [`StoreError::UnknownKey`] when no entry exists.
    pub fn get(&self, key: &str) -> Result<String> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey);
        }

        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.last_access_ms = now_ms();
                Ok(entry.value.clone())
            }
            None => Err(StoreError::UnknownKey(key.to_string())),
        }
    }

    /// Number of entries, live or not yet cleaned.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Drop every entry whose last access is older than the TTL.
    pub fn clean(&self) {
        let now = now_ms();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, v| timestamp_is_live(v.last_access_ms, now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "expired entries cleaned");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredValue>> {
        // A poisoned mutex means a panic mid-insert on a map of owned
        // strings; the data is still structurally sound.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Whether an entry stamped at `timestamp_ms` is still live at `now`.
fn timestamp_is_live(timestamp_ms: i64, now: i64) -> bool {
    let age = now - timestamp_ms;
    (0..=TTL_MS).contains(&age)
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let store = KvStore::new();
        store.put("abc123", "hello").expect("put");
        assert_eq!(store.get("abc123").expect("get"), "hello");
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_put_overwrites() {
        let store = KvStore::new();
        store.put("k", "first").expect("put");
        store.put("k", "second").expect("put");
        assert_eq!(store.get("k").expect("get"), "second");
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_empty_key_and_value_rejected() {
        let store = KvStore::new();
        assert_eq!(store.put("", "v"), Err(StoreError::InvalidKey));
        assert_eq!(store.put("k", ""), Err(StoreError::InvalidValue));
        assert_eq!(store.get(""), Err(StoreError::InvalidKey));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let store = KvStore::new();
        let big = "x".repeat(MAX_VALUE_LEN + 1);
        assert!(matches!(
            store.put("k", &big),
            Err(StoreError::ValueTooLarge { .. })
        ));

        let max = "x".repeat(MAX_VALUE_LEN);
        store.put("k", &max).expect("exactly max size is accepted");
    }

    #[test]
    fn test_unknown_key() {
        let store = KvStore::new();
        assert_eq!(
            store.get("missing"),
            Err(StoreError::UnknownKey("missing".to_string()))
        );
    }

    #[test]
    fn test_timestamp_window() {
        let store = KvStore::new();
        let now = now_ms();

        // Future timestamps and timestamps beyond one TTL ago are invalid.
        assert!(matches!(
            store.put_with_timestamp("k", "v", now + 10_000),
            Err(StoreError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            store.put_with_timestamp("k", "v", now - TTL_MS - 10_000),
            Err(StoreError::InvalidTimestamp(_))
        ));

        // The edge of the window is still valid.
        store
            .put_with_timestamp("k", "v", now - TTL_MS)
            .expect("edge of window");
    }

    #[test]
    fn test_clean_evicts_expired_entries() {
        let store = KvStore::new();
        store
            .put_with_timestamp("old", "v", now_ms() - TTL_MS)
            .expect("put at window edge");
        store.put("fresh", "v").expect("put");

        // Let the edge entry age past the TTL, then clean.
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.clean();

        assert_eq!(
            store.get("old"),
            Err(StoreError::UnknownKey("old".to_string()))
        );
        assert_eq!(store.get("fresh").expect("get"), "v");
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_get_refreshes_ttl() {
        let store = KvStore::new();
        store
            .put_with_timestamp("k", "v", now_ms() - TTL_MS)
            .expect("put at window edge");

        // Reading moves last_access to now, so the entry survives a clean
        // that would otherwise evict it.
        assert_eq!(store.get("k").expect("get"), "v");
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.clean();
        assert_eq!(store.get("k").expect("still live"), "v");
    }
}
