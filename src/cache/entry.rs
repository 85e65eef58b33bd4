//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::clock::{current_timestamp_ms, duration_ms};

// == Cache Entry ==
/// A single cached value owned by one layer.
///
/// The value is kept as serialized JSON bytes; typed access happens at the
/// manager boundary through [`CacheEntry::decode`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// Serialized value
    pub value: Vec<u8>,
    /// Name of the owning layer
    pub layer: String,
    /// Creation timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Expiration timestamp (Unix milliseconds), always > `stored_at`
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry from already-encoded bytes.
    ///
    /// A zero TTL is rounded up to one millisecond so `expires_at > stored_at`
    /// always holds.
    pub fn new(key: impl Into<String>, value: Vec<u8>, layer: impl Into<String>, ttl: Duration) -> Self {
        Self::new_at(key, value, layer, ttl, current_timestamp_ms())
    }

    /// Same as [`CacheEntry::new`] with an explicit creation time.
    pub fn new_at(
        key: impl Into<String>,
        value: Vec<u8>,
        layer: impl Into<String>,
        ttl: Duration,
        now: u64,
    ) -> Self {
        let ttl_ms = duration_ms(ttl).max(1);
        Self {
            key: key.into(),
            value,
            layer: layer.into(),
            stored_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    /// Serializes `value` and wraps it in an entry.
    pub fn encode<T: Serialize>(
        key: impl Into<String>,
        value: &T,
        layer: impl Into<String>,
        ttl: Duration,
    ) -> serde_json::Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::new(key, bytes, layer, ttl))
    }

    /// Deserializes the stored bytes as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.value)
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at <= now
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }

    /// Approximate payload size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.key.len() + self.value.len()
    }
}
