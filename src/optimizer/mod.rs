//! Query Optimizer Module
//!
//! Cache-aside helpers for read-heavy aggregate queries and batched writes
//! that keep those caches from serving stale results.

mod batch;
mod key;
mod query;

pub use batch::{fold_deltas, BatchReport};
pub use key::{page_key, query_key};
pub use query::{QueryOptimizer, IDENTITY_PLACEHOLDER};
