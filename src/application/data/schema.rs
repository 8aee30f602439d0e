use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use crate::domain::request::CurrentUser;

use super::expiry::signed_url_expiry_now;
use super::{Loaders, QueryRequest, ResolveError};

/// Answers queries in-process; there is no network hop between the render
/// pipeline and the schema.
#[async_trait]
pub trait SchemaResolver: Send + Sync {
    async fn execute(
        &self,
        request: &QueryRequest,
        context: &ExecutionContext,
    ) -> Result<Value, ResolveError>;
}

/// Everything a resolver may consult while answering one request.
#[derive(Clone)]
pub struct ExecutionContext {
    pub user: Option<CurrentUser>,
    pub loaders: Loaders,
    signed_url_expiry: fn() -> OffsetDateTime,
}

impl ExecutionContext {
    pub fn new(user: Option<CurrentUser>, loaders: Loaders) -> Self {
        Self {
            user,
            loaders,
            signed_url_expiry: signed_url_expiry_now,
        }
    }

    pub fn with_signed_url_expiry(mut self, expiry: fn() -> OffsetDateTime) -> Self {
        self.signed_url_expiry = expiry;
        self
    }

    pub fn signed_url_expires_at(&self) -> OffsetDateTime {
        (self.signed_url_expiry)()
    }
}
