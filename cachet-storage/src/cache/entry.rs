//! Tagged cache entries.
//!
//! A cached value is either `Present(value)` or `Absent` ("looked up, found
//! nothing"). A key with no entry at all is a plain miss. Keeping the three
//! states apart means no payload value can be mistaken for "not cached".

use cachet_core::{CacheError, CacheKey};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The value stored under a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum CacheEntry<T> {
    Present(T),
    Absent,
}

/// Outcome of reading one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    /// A cached value.
    Hit(T),
    /// A cached negative result.
    CachedAbsent,
    /// Nothing usable cached under the key.
    Miss,
}

impl<T> CacheLookup<T> {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }
}

/// Serialize an entry for storage under `key`.
pub fn encode<T: Serialize>(key: &CacheKey, entry: &CacheEntry<T>) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(entry).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Serialize `Present(value)` without taking ownership of the value.
pub fn encode_present<T: Serialize>(key: &CacheKey, value: &T) -> Result<Vec<u8>, CacheError> {
    encode(key, &CacheEntry::Present(value))
}

/// Serialize the negative marker.
pub fn encode_absent(key: &CacheKey) -> Result<Vec<u8>, CacheError> {
    encode::<()>(key, &CacheEntry::Absent)
}

/// Deserialize an entry read from `key`.
pub fn decode<T: DeserializeOwned>(key: &CacheKey, bytes: &[u8]) -> Result<CacheEntry<T>, CacheError> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Classify raw backend bytes.
///
/// An entry that does not decode as `T` (written by an older build, or by a
/// lookup of a different shape sharing the key) is reported as a miss so the
/// caller refetches and overwrites it.
pub fn classify<T: DeserializeOwned>(key: &CacheKey, raw: Option<&[u8]>) -> CacheLookup<T> {
    let Some(bytes) = raw else {
        return CacheLookup::Miss;
    };
    match decode::<T>(key, bytes) {
        Ok(CacheEntry::Present(value)) => CacheLookup::Hit(value),
        Ok(CacheEntry::Absent) => CacheLookup::CachedAbsent,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
            CacheLookup::Miss
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_tagged() {
        let key = CacheKey::new("k");
        let present = encode_present(&key, &-1i64).unwrap();
        assert_eq!(present, br#"{"state":"present","value":-1}"#.to_vec());

        let absent = encode_absent(&key).unwrap();
        assert_eq!(absent, br#"{"state":"absent"}"#.to_vec());
    }

    #[test]
    fn test_former_sentinel_value_is_a_hit() {
        let key = CacheKey::new("k");
        let bytes = encode_present(&key, &-1i64).unwrap();
        assert_eq!(classify::<i64>(&key, Some(&bytes)), CacheLookup::Hit(-1));
    }

    #[test]
    fn test_classify_states() {
        let key = CacheKey::new("k");
        assert_eq!(classify::<String>(&key, None), CacheLookup::Miss);

        let absent = encode_absent(&key).unwrap();
        assert_eq!(classify::<String>(&key, Some(&absent)), CacheLookup::CachedAbsent);

        let hit = encode_present(&key, &"v".to_string()).unwrap();
        assert_eq!(
            classify::<String>(&key, Some(&hit)),
            CacheLookup::Hit("v".to_string())
        );
    }

    #[test]
    fn test_undecodable_entry_is_a_miss() {
        let key = CacheKey::new("k");
        assert!(classify::<String>(&key, Some(b"not json")).is_miss());

        let wrong_shape = encode_present(&key, &vec![1, 2]).unwrap();
        assert!(classify::<String>(&key, Some(&wrong_shape)).is_miss());
    }

    #[test]
    fn test_decode_error_names_key() {
        let err = decode::<i64>(&CacheKey::new("user:1"), b"{").unwrap_err();
        assert!(matches!(err, CacheError::Serialization { ref key, .. } if key == "user:1"));
    }
}
