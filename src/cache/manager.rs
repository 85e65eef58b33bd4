//! Cache Manager Module
//!
//! Owns every named layer, each behind its own lock so traffic on one layer
//! never serializes against another.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheStatsSnapshot, CacheStore, LayerConfig, Lookup};
use crate::error::{LayerError, Result};

// == Cache Manager ==
/// Multi-layer cache facade.
///
/// Values are serialized to JSON on the way in and decoded as the caller's
/// type on the way out. Lookups never fail: an unknown layer, an expired entry
/// or a value that no longer decodes as the requested type is reported as
/// absent.
#[derive(Debug)]
pub struct CacheManager {
    layers: HashMap<String, RwLock<CacheStore>>,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager with the given layers. Later configs with a repeated
    /// name replace earlier ones.
    pub fn new(layers: Vec<LayerConfig>) -> Self {
        let layers = layers
            .into_iter()
            .map(|config| (config.name.clone(), RwLock::new(CacheStore::new(config))))
            .collect();
        Self { layers }
    }

    /// Creates a manager with the stock hot/query/session/analytics layers.
    pub fn with_defaults() -> Self {
        Self::new(LayerConfig::defaults())
    }

    /// Sorted layer names.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.layers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_layer(&self, layer: &str) -> bool {
        self.layers.contains_key(layer)
    }

    fn layer(&self, layer: &str) -> Option<&RwLock<CacheStore>> {
        let store = self.layers.get(layer);
        if store.is_none() {
            warn!(layer, "unknown cache layer");
        }
        store
    }

    // == Get ==
    /// Typed lookup.
    ///
    /// Served under the layer's read lock; only a lookup that lands on an
    /// expired entry takes the write lock to remove it.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, layer: &str) -> Option<T> {
        let store = self.layer(layer)?;
        let outcome = store.read().await.lookup(key, |entry| match entry.decode::<T>() {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(layer, key, error = %err, "cached value does not decode as requested type");
                None
            }
        });
        if outcome.is_expired() {
            store.write().await.expire(key);
        }
        let value = outcome.value();
        debug!(layer, key, hit = value.is_some(), "cache lookup");
        value
    }

    /// Returns the stored JSON bytes without decoding.
    pub async fn get_raw(&self, key: &str, layer: &str) -> Option<Vec<u8>> {
        let store = self.layer(layer)?;
        let outcome = store.read().await.lookup(key, |entry| Some(entry.value.clone()));
        if outcome.is_expired() {
            store.write().await.expire(key);
        }
        outcome.value()
    }

    // == Set ==
    /// Serializes and stores `value`. `ttl` falls back to the layer default.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        layer: &str,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let store = self
            .layer(layer)
            .ok_or_else(|| LayerError::UnknownLayer(layer.to_string()))?;
        let mut store = store.write().await;
        store.set(key.to_string(), bytes, ttl)
    }

    // == Delete ==
    /// Removes `key` from `layer`, returning 0 or 1.
    pub async fn delete(&self, key: &str, layer: &str) -> usize {
        match self.layer(layer) {
            Some(store) => store.write().await.delete(key),
            None => 0,
        }
    }

    // == Get Or Fetch ==
    /// Cache-aside read.
    ///
    /// Returns the cached value when fresh; otherwise awaits `fetch`, stores
    /// its result and returns it. A failing `fetch` is logged and yields
    /// `None`. No lock is held while `fetch` runs, so concurrent misses on the
    /// same key may each call their own `fetch`.
    pub async fn get_or_fetch<T, F, Fut, E>(
        &self,
        key: &str,
        layer: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        if let Some(value) = self.get::<T>(key, layer).await {
            return Some(value);
        }

        match fetch().await {
            Ok(value) => {
                if let Err(err) = self.set(key, &value, ttl, layer).await {
                    warn!(layer, key, error = %err, "failed to cache fetched value");
                }
                Some(value)
            }
            Err(err) => {
                warn!(layer, key, error = %err, "cache fetch failed, degrading to miss");
                None
            }
        }
    }

    // == Batch ==
    /// Looks up several keys in one layer under a single read lock. Only hits
    /// appear in the result.
    pub async fn get_many<T, K>(&self, keys: &[K], layer: &str) -> HashMap<String, T>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        let mut found = HashMap::new();
        let Some(store) = self.layer(layer) else {
            return found;
        };
        let mut expired = Vec::new();
        {
            let store = store.read().await;
            for key in keys {
                let key = key.as_ref();
                match store.lookup(key, |entry| entry.decode::<T>().ok()) {
                    Lookup::Hit(value) => {
                        found.insert(key.to_string(), value);
                    }
                    Lookup::Expired => expired.push(key),
                    Lookup::Miss => {}
                }
            }
        }
        if !expired.is_empty() {
            let mut store = store.write().await;
            for key in expired {
                store.expire(key);
            }
        }
        found
    }

    /// Stores several values in one layer, returning how many were stored.
    ///
    /// Every value is serialized before any is written, so an encoding error
    /// leaves the layer untouched. Keys rejected by validation are skipped.
    pub async fn set_many<T: Serialize>(
        &self,
        items: &[(String, T)],
        ttl: Option<Duration>,
        layer: &str,
    ) -> Result<usize> {
        let encoded = items
            .iter()
            .map(|(key, value)| -> Result<(String, Vec<u8>)> {
                Ok((key.clone(), serde_json::to_vec(value)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let store = self
            .layer(layer)
            .ok_or_else(|| LayerError::UnknownLayer(layer.to_string()))?;

        let mut store = store.write().await;
        let mut stored = 0;
        for (key, bytes) in encoded {
            match store.set(key, bytes, ttl) {
                Ok(()) => stored += 1,
                Err(err) => warn!(layer, error = %err, "skipping batch entry"),
            }
        }
        Ok(stored)
    }

    // == Invalidate Pattern ==
    /// Removes every key containing `pattern` from `layer`, or from all layers
    /// when `layer` is `None`. Returns the number of entries removed.
    pub async fn invalidate_pattern(&self, pattern: &str, layer: Option<&str>) -> usize {
        let removed = match layer {
            Some(name) => match self.layer(name) {
                Some(store) => store.write().await.invalidate_pattern(pattern),
                None => 0,
            },
            None => {
                let mut total = 0;
                for store in self.layers.values() {
                    total += store.write().await.invalidate_pattern(pattern);
                }
                total
            }
        };
        debug!(pattern, ?layer, removed, "pattern invalidation");
        removed
    }

    // == Clear Layer ==
    pub async fn clear_layer(&self, layer: &str) -> Result<usize> {
        let store = self
            .layer(layer)
            .ok_or_else(|| LayerError::UnknownLayer(layer.to_string()))?;
        let removed = store.write().await.clear();
        info!(layer, removed, "cleared cache layer");
        Ok(removed)
    }

    // == Cleanup Expired ==
    /// Sweeps every layer for expired entries.
    pub async fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        for store in self.layers.values() {
            removed += store.write().await.cleanup_expired();
        }
        removed
    }

    // == Stats ==
    /// Counters summed over all layers.
    pub async fn stats(&self) -> CacheStatsSnapshot {
        let mut combined = CacheStatsSnapshot::default();
        for store in self.layers.values() {
            combined.merge(&store.read().await.stats());
        }
        combined
    }

    /// Per-layer counters keyed by layer name.
    pub async fn layer_stats(&self) -> BTreeMap<String, CacheStatsSnapshot> {
        let mut out = BTreeMap::new();
        for (name, store) in &self.layers {
            out.insert(name.clone(), store.read().await.stats());
        }
        out
    }

    /// Approximate bytes held across all layers.
    pub async fn size_bytes(&self) -> usize {
        let mut total = 0;
        for store in self.layers.values() {
            total += store.read().await.size_bytes();
        }
        total
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}
