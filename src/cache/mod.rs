//! Cache Module
//!
//! Multi-layer in-memory caching with per-layer TTL and capacity policy.

mod entry;
pub mod layer;
mod manager;
mod order;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use layer::LayerConfig;
pub use manager::CacheManager;
pub use order::InsertionOrder;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use store::{CacheStore, Lookup};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed serialized value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
