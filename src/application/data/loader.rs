//! Per-request batched data access.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::try_join_all;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::ResolveError;

/// Backing store consulted by resolvers through [`Loaders`].
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self, kind: &str, key: &str) -> Result<Option<Value>, ResolveError>;
}

type LoadKey = (String, String);

/// Memoizing view over a [`DataSource`] scoped to one request.
///
/// Concurrent loads of the same `(kind, key)` share a single call to the source;
/// failed loads are not memoized.
#[derive(Clone)]
pub struct Loaders {
    source: Arc<dyn DataSource>,
    memo: Arc<DashMap<LoadKey, Arc<OnceCell<Option<Value>>>>>,
}

impl Loaders {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            memo: Arc::new(DashMap::new()),
        }
    }

    pub async fn load(&self, kind: &str, key: &str) -> Result<Option<Value>, ResolveError> {
        let cell = self
            .memo
            .entry((kind.to_string(), key.to_string()))
            .or_default()
            .clone();

        let value = cell
            .get_or_try_init(|| self.source.load(kind, key))
            .await?;
        Ok(value.clone())
    }

    pub async fn load_many<K>(
        &self,
        kind: &str,
        keys: &[K],
    ) -> Result<Vec<Option<Value>>, ResolveError>
    where
        K: AsRef<str>,
    {
        try_join_all(keys.iter().map(|key| self.load(kind, key.as_ref()))).await
    }

    /// Number of distinct keys requested so far.
    pub fn requested(&self) -> usize {
        self.memo.len()
    }
}

/// Hands out a fresh [`Loaders`] batch per request.
#[derive(Clone)]
pub struct LoaderFactory {
    source: Arc<dyn DataSource>,
}

impl LoaderFactory {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    pub fn create(&self) -> Loaders {
        Loaders::new(Arc::clone(&self.source))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for CountingSource {
        async fn load(&self, kind: &str, key: &str) -> Result<Option<Value>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if key == "broken" {
                return Err(ResolveError::source("boom"));
            }
            Ok(Some(json!({ "kind": kind, "key": key })))
        }
    }

    #[tokio::test]
    async fn concurrent_loads_of_same_key_hit_source_once() {
        let source = Arc::new(CountingSource::default());
        let loaders = Loaders::new(source.clone());

        let (a, b) = tokio::join!(loaders.load("user", "1"), loaders.load("user", "1"));

        assert_eq!(a.expect("load a"), b.expect("load b"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn load_many_preserves_key_order() {
        let source = Arc::new(CountingSource::default());
        let loaders = Loaders::new(source.clone());

        let values = loaders
            .load_many("thread", &["b", "a", "b"])
            .await
            .expect("loads");

        assert_eq!(values[0], Some(json!({"kind": "thread", "key": "b"})));
        assert_eq!(values[1], Some(json!({"kind": "thread", "key": "a"})));
        assert_eq!(loaders.requested(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_memoized() {
        let source = Arc::new(CountingSource::default());
        let loaders = Loaders::new(source.clone());

        assert!(loaders.load("user", "broken").await.is_err());
        assert!(loaders.load("user", "broken").await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn factory_batches_are_isolated() {
        let source = Arc::new(CountingSource::default());
        let factory = LoaderFactory::new(source.clone());

        factory.create().load("user", "1").await.expect("first");
        factory.create().load("user", "1").await.expect("second");

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
