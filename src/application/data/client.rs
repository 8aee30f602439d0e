use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::domain::request::CurrentUser;

use super::{
    CacheOptions, DataError, ExecutionContext, LoaderFactory, NormalizedCache, PossibleTypes,
    QueryRequest, SchemaResolver,
};

/// Resolution link that hands queries straight to the in-process schema.
#[derive(Clone)]
pub struct LocalSchemaLink {
    schema: Arc<dyn SchemaResolver>,
    context: ExecutionContext,
}

impl LocalSchemaLink {
    pub fn new(schema: Arc<dyn SchemaResolver>, context: ExecutionContext) -> Self {
        Self { schema, context }
    }

    pub async fn execute(&self, request: &QueryRequest) -> Result<Value, DataError> {
        self.schema
            .execute(request, &self.context)
            .await
            .map_err(|source| DataError::Resolve {
                operation: request.operation.clone(),
                source,
            })
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }
}

/// Data client owned by exactly one request.
///
/// Reads take `&self`; anything that changes the cache takes `&mut self`, so a
/// client can only be written by whoever owns it.
pub struct DataClient {
    cache: NormalizedCache,
    link: LocalSchemaLink,
}

impl DataClient {
    pub fn new(link: LocalSchemaLink, cache: NormalizedCache) -> Self {
        Self { cache, link }
    }

    /// Cached result for `request`, if every referenced entity is present.
    pub fn read(&self, request: &QueryRequest) -> Option<Value> {
        self.cache.read_query(request)
    }

    /// Run `request` against the schema without consulting or updating the cache.
    pub async fn execute(&self, request: &QueryRequest) -> Result<Value, DataError> {
        debug!(
            target = "trellis::data",
            operation = %request.operation,
            key = %request.cache_key(),
            "executing query"
        );
        self.link.execute(request).await
    }

    pub fn write(&mut self, request: &QueryRequest, data: &Value) {
        self.cache.write_query(request, data);
    }

    /// Cache-first query.
    pub async fn query(&mut self, request: &QueryRequest) -> Result<Value, DataError> {
        if let Some(cached) = self.read(request) {
            return Ok(cached);
        }
        let data = self.execute(request).await?;
        self.write(request, &data);
        Ok(data)
    }

    /// Snapshot of everything the rendered tree required.
    pub fn extract(&self) -> Value {
        self.cache.extract()
    }

    pub fn context(&self) -> &ExecutionContext {
        self.link.context()
    }
}

/// Builds a fresh [`DataClient`] per request from shared, immutable parts.
#[derive(Clone)]
pub struct DataClientFactory {
    schema: Arc<dyn SchemaResolver>,
    loaders: LoaderFactory,
    options: Arc<CacheOptions>,
    possible_types: Arc<PossibleTypes>,
}

impl DataClientFactory {
    pub fn new(
        schema: Arc<dyn SchemaResolver>,
        loaders: LoaderFactory,
        options: CacheOptions,
        possible_types: PossibleTypes,
    ) -> Self {
        Self {
            schema,
            loaders,
            options: Arc::new(options),
            possible_types: Arc::new(possible_types),
        }
    }

    pub fn create(&self, user: Option<CurrentUser>) -> DataClient {
        let context = ExecutionContext::new(user, self.loaders.create());
        let link = LocalSchemaLink::new(Arc::clone(&self.schema), context);
        let cache = NormalizedCache::new(
            Arc::clone(&self.options),
            Arc::clone(&self.possible_types),
        );
        DataClient::new(link, cache)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::application::data::{DataSource, ResolveError};

    struct EchoSchema {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SchemaResolver for EchoSchema {
        async fn execute(
            &self,
            request: &QueryRequest,
            context: &ExecutionContext,
        ) -> Result<Value, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match request.operation.as_str() {
                "thread" => {
                    let id = request
                        .variable_str("id")
                        .ok_or_else(|| ResolveError::missing_variable("thread", "id"))?;
                    Ok(json!({"thread": {"__typename": "Thread", "id": id, "title": "hello"}}))
                }
                "viewer" => {
                    let viewer = context
                        .user
                        .as_ref()
                        .map(|user| json!({"__typename": "User", "id": user.id}));
                    Ok(json!({ "viewer": viewer }))
                }
                other => Err(ResolveError::UnknownOperation(other.to_string())),
            }
        }
    }

    struct NoSource;

    #[async_trait]
    impl DataSource for NoSource {
        async fn load(&self, _kind: &str, _key: &str) -> Result<Option<Value>, ResolveError> {
            Ok(None)
        }
    }

    fn factory() -> (Arc<EchoSchema>, DataClientFactory) {
        let schema = Arc::new(EchoSchema {
            calls: AtomicUsize::new(0),
        });
        let factory = DataClientFactory::new(
            schema.clone(),
            LoaderFactory::new(Arc::new(NoSource)),
            CacheOptions::default(),
            PossibleTypes::default(),
        );
        (schema, factory)
    }

    #[tokio::test]
    async fn query_is_cache_first() {
        let (schema, factory) = factory();
        let mut client = factory.create(None);
        let request = QueryRequest::new("thread").var("id", "1");

        let first = client.query(&request).await.expect("first query");
        let second = client.query(&request).await.expect("second query");

        assert_eq!(first, second);
        assert_eq!(schema.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clients_never_share_cache_state() {
        let (_, factory) = factory();
        let mut first = factory.create(None);
        let second = factory.create(None);
        let request = QueryRequest::new("thread").var("id", "1");

        first.query(&request).await.expect("query");

        assert!(first.read(&request).is_some());
        assert!(second.read(&request).is_none());
        assert_eq!(second.extract(), json!({}));
    }

    #[tokio::test]
    async fn resolver_sees_request_user() {
        let (_, factory) = factory();
        let mut client = factory.create(Some(CurrentUser::new("u7")));

        let data = client
            .query(&QueryRequest::new("viewer"))
            .await
            .expect("viewer query");

        assert_eq!(data["viewer"]["id"], json!("u7"));
    }

    #[tokio::test]
    async fn resolver_errors_name_the_operation() {
        let (_, factory) = factory();
        let mut client = factory.create(None);

        let err = client
            .query(&QueryRequest::new("missing"))
            .await
            .expect_err("unknown operation");

        let DataError::Resolve { operation, source } = err;
        assert_eq!(operation, "missing");
        assert!(matches!(source, ResolveError::UnknownOperation(_)));
    }

    #[tokio::test]
    async fn execute_does_not_touch_the_cache() {
        let (_, factory) = factory();
        let client = factory.create(None);
        let request = QueryRequest::new("thread").var("id", "1");

        client.execute(&request).await.expect("execute");

        assert!(client.read(&request).is_none());
    }
}
