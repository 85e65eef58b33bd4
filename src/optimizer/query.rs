//! Cache-aside wrapper for aggregate reads plus write-triggered invalidation.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::layer::QUERY;
use crate::cache::CacheManager;
use crate::optimizer::{fold_deltas, page_key, BatchReport};

/// Placeholder replaced by each written identity in trigger patterns.
pub const IDENTITY_PLACEHOLDER: &str = "{id}";

/// Separator that marks an identity as namespaced (`user:42`).
const NAMESPACE_SEPARATOR: char = ':';

// == Query Optimizer ==
/// Facade over [`CacheManager`] for expensive reads.
///
/// Writes that go through [`QueryOptimizer::batch_write`] or
/// [`QueryOptimizer::invalidate_for_write`] remove every cache entry keyed by
/// the written identities before returning.
///
/// A namespaced identity such as `user:42` is itself used as a substring
/// pattern. Bare identities (`42`) would match unrelated keys, so they only
/// reach the cache through `{id}` trigger patterns.
#[derive(Debug)]
pub struct QueryOptimizer {
    cache: Arc<CacheManager>,
    triggers: RwLock<HashMap<String, Vec<String>>>,
}

impl QueryOptimizer {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self {
            cache,
            triggers: RwLock::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    // == Cached Query ==
    /// Returns the cached result for `key` or computes, caches and returns it.
    /// A failing `compute` is logged and yields `None`.
    pub async fn cached_query<T, F, Fut, E>(
        &self,
        key: &str,
        compute: F,
        ttl: Option<Duration>,
        layer: &str,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.cache.get_or_fetch(key, layer, ttl, compute).await
    }

    /// Cached page of a listing; `compute` receives `(offset, limit)`.
    pub async fn cached_page<T, F, Fut, E>(
        &self,
        name: &str,
        page: u32,
        per_page: u32,
        ttl: Option<Duration>,
        compute: F,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(u64, u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let offset = u64::from(page.saturating_sub(1)) * u64::from(per_page);
        let key = page_key(name, page, per_page);
        self.cached_query(&key, || compute(offset, per_page), ttl, QUERY).await
    }

    // == Triggers ==
    /// Adds key patterns to invalidate whenever `entity` is written.
    ///
    /// Patterns may contain `{id}`, which is replaced by each written identity;
    /// patterns without it are invalidated once per write.
    pub async fn register_trigger<I, S>(&self, entity: &str, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut triggers = self.triggers.write().await;
        triggers
            .entry(entity.to_string())
            .or_default()
            .extend(patterns.into_iter().map(Into::into));
    }

    async fn patterns_for(&self, entity: &str, identities: &[String]) -> Vec<String> {
        let mut patterns: Vec<String> = identities
            .iter()
            .filter(|id| id.contains(NAMESPACE_SEPARATOR))
            .cloned()
            .collect();
        if let Some(extra) = self.triggers.read().await.get(entity) {
            for pattern in extra {
                if pattern.contains(IDENTITY_PLACEHOLDER) {
                    patterns.extend(
                        identities
                            .iter()
                            .map(|id| pattern.replace(IDENTITY_PLACEHOLDER, id)),
                    );
                } else {
                    patterns.push(pattern.clone());
                }
            }
        }
        patterns.sort();
        patterns.dedup();
        patterns
    }

    // == Invalidate For Write ==
    /// Removes, from every layer, keys containing any namespaced written
    /// identity or any trigger pattern registered for `entity`.
    pub async fn invalidate_for_write(&self, entity: &str, identities: &[String]) -> usize {
        let mut removed = 0;
        for pattern in self.patterns_for(entity, identities).await {
            removed += self.cache.invalidate_pattern(&pattern, None).await;
        }
        debug!(entity, identities = identities.len(), removed, "write invalidation");
        removed
    }

    // == Batch Write ==
    /// Folds `(identity, delta)` pairs, hands the folded upserts to `apply`,
    /// then invalidates the affected cache keys.
    ///
    /// Invalidation runs even when `apply` fails, since a partial write may
    /// already have landed; the writer's error is returned unchanged.
    pub async fn batch_write<I, S, F, Fut, E>(
        &self,
        entity: &str,
        updates: I,
        apply: F,
    ) -> Result<BatchReport, E>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
        F: FnOnce(Vec<(String, i64)>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let updates: Vec<(String, i64)> = updates.into_iter().map(|(id, d)| (id.into(), d)).collect();
        let received = updates.len();
        let folded = fold_deltas(updates);
        if folded.is_empty() {
            return Ok(BatchReport::default());
        }

        let identities: Vec<String> = folded.iter().map(|(id, _)| id.clone()).collect();
        let applied = folded.len();
        let outcome = apply(folded).await;
        let invalidated = self.invalidate_for_write(entity, &identities).await;

        match outcome {
            Ok(()) => Ok(BatchReport {
                received,
                applied,
                invalidated,
            }),
            Err(err) => {
                warn!(entity, error = %err, "batched write failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::layer::{ANALYTICS, HOT};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn optimizer() -> QueryOptimizer {
        QueryOptimizer::new(Arc::new(CacheManager::with_defaults()))
    }

    #[tokio::test]
    async fn test_cached_query_computes_once() {
        let opt = optimizer();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let total = opt
                .cached_query(
                    "query:usage:user=1",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(42u64)
                    },
                    None,
                    ANALYTICS,
                )
                .await;
            assert_eq!(total, Some(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_query_failure_is_absent() {
        let opt = optimizer();

        let result: Option<u64> = opt
            .cached_query("k", || async { Err("db timeout") }, None, ANALYTICS)
            .await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cached_page_offsets() {
        let opt = optimizer();

        let page = opt
            .cached_page("posts", 3, 10, None, |offset, limit| async move {
                Ok::<_, String>(vec![offset, u64::from(limit)])
            })
            .await;

        assert_eq!(page, Some(vec![20, 10]));
        let cached: Option<Vec<u64>> = opt.cache().get("query:posts:page=3&per_page=10", QUERY).await;
        assert_eq!(cached, Some(vec![20, 10]));
    }

    #[tokio::test]
    async fn test_batch_write_folds_and_invalidates_before_return() {
        let opt = optimizer();
        let cache = opt.cache();
        cache.set("usage:user:1", &10, None, ANALYTICS).await.unwrap();
        cache.set("profile:user:1", &"p", None, HOT).await.unwrap();
        cache.set("usage:user:2", &20, None, ANALYTICS).await.unwrap();

        let written = Mutex::new(Vec::new());
        let report = opt
            .batch_write(
                "usage",
                vec![("user:1", 1), ("user:1", 2), ("user:3", 1)],
                |folded| {
                    written.lock().unwrap().extend(folded);
                    async { Ok::<_, String>(()) }
                },
            )
            .await
            .unwrap();

        assert_eq!(report.received, 3);
        assert_eq!(report.applied, 2);
        assert_eq!(report.invalidated, 2);
        assert_eq!(
            *written.lock().unwrap(),
            vec![("user:1".to_string(), 3), ("user:3".to_string(), 1)]
        );
        assert_eq!(cache.get::<i32>("usage:user:1", ANALYTICS).await, None);
        assert_eq!(cache.get::<i32>("usage:user:2", ANALYTICS).await, Some(20));
    }

    #[tokio::test]
    async fn test_batch_write_failure_still_invalidates() {
        let opt = optimizer();
        opt.cache().set("user:9:stats", &1, None, ANALYTICS).await.unwrap();

        let result = opt
            .batch_write("usage", vec![("user:9", 1)], |_| async { Err("write failed") })
            .await;

        assert_eq!(result, Err("write failed"));
        assert_eq!(opt.cache().get::<i32>("user:9:stats", ANALYTICS).await, None);
    }

    #[tokio::test]
    async fn test_triggers_expand_identity_placeholder() {
        let opt = optimizer();
        opt.register_trigger("post", ["feed:{id}", "query:posts:"]).await;
        let cache = opt.cache();
        cache.set("feed:author-7:latest", &1, None, HOT).await.unwrap();
        cache.set("query:posts:page=1&per_page=20", &1, None, QUERY).await.unwrap();
        cache.set("feed:author-8:latest", &1, None, HOT).await.unwrap();

        let removed = opt.invalidate_for_write("post", &["author-7".to_string()]).await;

        assert_eq!(removed, 2);
        assert_eq!(cache.get::<i32>("feed:author-8:latest", HOT).await, Some(1));
    }

    #[tokio::test]
    async fn test_bare_identity_only_expands_through_triggers() {
        let opt = optimizer();
        opt.register_trigger("usage", ["usage:user:{id}"]).await;
        let cache = opt.cache();
        cache.set("usage:user:1", &1, None, ANALYTICS).await.unwrap();
        cache.set("profile:user:21", &2, None, HOT).await.unwrap();
        cache.set("query:top:limit=10", &3, None, QUERY).await.unwrap();

        let removed = opt.invalidate_for_write("usage", &["1".to_string()]).await;

        assert_eq!(removed, 1);
        assert_eq!(cache.get::<i32>("usage:user:1", ANALYTICS).await, None);
        assert_eq!(cache.get::<i32>("profile:user:21", HOT).await, Some(2));
        assert_eq!(cache.get::<i32>("query:top:limit=10", QUERY).await, Some(3));
    }

    #[tokio::test]
    async fn test_bare_identity_without_trigger_removes_nothing() {
        let opt = optimizer();
        opt.cache().set("user:1:profile", &1, None, HOT).await.unwrap();

        let removed = opt.invalidate_for_write("usage", &["1".to_string()]).await;

        assert_eq!(removed, 0);
        assert_eq!(opt.cache().get::<i32>("user:1:profile", HOT).await, Some(1));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let opt = optimizer();
        let report = opt
            .batch_write("usage", Vec::<(String, i64)>::new(), |_| async {
                Ok::<_, String>(())
            })
            .await
            .unwrap();
        assert_eq!(report, BatchReport::default());
    }
}
