//! Deterministic cache keys for parameterized queries.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::cache::MAX_KEY_LENGTH;

/// Builds `query:<name>:<k=v&...>` with parameters in sorted order, so the
/// same logical query always maps to the same key.
///
/// Keys that would exceed the cache's key limit are shortened to the name plus
/// a hash of the parameter string.
pub fn query_key<K, V>(name: &str, params: &BTreeMap<K, V>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let joined = params
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join("&");
    let key = format!("query:{}:{}", name, joined);
    if key.len() <= MAX_KEY_LENGTH {
        return key;
    }

    let mut hasher = DefaultHasher::new();
    joined.hash(&mut hasher);
    let mut short = format!("query:{}:#{:016x}", name, hasher.finish());
    short.truncate(MAX_KEY_LENGTH);
    short
}

/// Key for one page of a listing.
pub fn page_key(name: &str, page: u32, per_page: u32) -> String {
    let params = BTreeMap::from([("page", page.to_string()), ("per_page", per_page.to_string())]);
    query_key(name, &params)
}
