//! Request-scoped data access: a client bound to an in-process schema resolver
//! and backed by a normalized cache that is created fresh for every request.

mod cache;
mod client;
mod expiry;
mod introspection;
mod loader;
mod schema;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use cache::{CacheOptions, NormalizedCache, ROOT_QUERY};
pub use client::{DataClient, DataClientFactory, LocalSchemaLink};
pub use expiry::signed_url_expiry;
pub use introspection::{IntrospectionResult, PossibleTypes};
pub use loader::{DataSource, LoaderFactory, Loaders};
pub use schema::{ExecutionContext, SchemaResolver};

/// A named query plus its variables, as declared by a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub operation: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl QueryRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            variables: Map::new(),
        }
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn variable_str(&self, name: &str) -> Option<&str> {
        self.variables.get(name).and_then(Value::as_str)
    }

    /// Stable identity of the request inside the cache root. Variables are
    /// serialized in key order so equal requests always share a key.
    pub fn cache_key(&self) -> String {
        if self.variables.is_empty() {
            self.operation.clone()
        } else {
            format!(
                "{}({})",
                self.operation,
                Value::Object(self.variables.clone())
            )
        }
    }
}

/// Failures raised by schema resolvers and data sources.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("operation `{operation}` is missing variable `{name}`")]
    MissingVariable { operation: String, name: String },
    #[error("data source failed: {0}")]
    Source(String),
    #[error("resolver failed: {0}")]
    Failed(String),
}

impl ResolveError {
    pub fn missing_variable(operation: &str, name: &str) -> Self {
        Self::MissingVariable {
            operation: operation.to_string(),
            name: name.to_string(),
        }
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("query `{operation}` failed")]
    Resolve {
        operation: String,
        #[source]
        source: ResolveError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_is_independent_of_variable_insertion_order() {
        let a = QueryRequest::new("thread").var("id", "1").var("first", 10);
        let b = QueryRequest::new("thread").var("first", 10).var("id", "1");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), r#"thread({"first":10,"id":"1"})"#);
    }

    #[test]
    fn cache_key_without_variables_is_operation_name() {
        assert_eq!(QueryRequest::new("threads").cache_key(), "threads");
    }

    #[test]
    fn variable_str_reads_string_variables_only() {
        let request = QueryRequest::new("thread").var("id", "1").var("n", json!(2));
        assert_eq!(request.variable_str("id"), Some("1"));
        assert_eq!(request.variable_str("n"), None);
    }
}
