//! Seeded in-memory records backing the community schema.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::application::data::{DataSource, ResolveError};

pub const THREAD: &str = "thread";
pub const MESSAGE: &str = "message";
pub const USER: &str = "user";
/// Ordered thread ids, stored under [`ALL_KEY`].
pub const THREAD_INDEX: &str = "thread_index";
pub const ALL_KEY: &str = "all";

/// Read-only record store keyed by `(kind, id)`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: BTreeMap<(String, String), Value>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: &str, id: &str, record: Value) -> &mut Self {
        self.records
            .insert((kind.to_string(), id.to_string()), record);
        self
    }

    /// A small forum: two members, three threads, a handful of messages.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        store
            .insert(USER, "u1", json!({"id": "u1", "username": "ada"}))
            .insert(USER, "u2", json!({"id": "u2", "username": "grace"}))
            .insert(
                THREAD,
                "1",
                json!({
                    "id": "1",
                    "title": "Welcome to the community",
                    "authorId": "u1",
                    "messageIds": ["m1", "m2"],
                }),
            )
            .insert(
                THREAD,
                "2",
                json!({
                    "id": "2",
                    "title": "Release planning",
                    "authorId": "u2",
                    "messageIds": ["m3"],
                }),
            )
            .insert(
                THREAD,
                "3",
                json!({
                    "id": "3",
                    "title": "Show and tell",
                    "authorId": "u1",
                    "messageIds": [],
                }),
            )
            .insert(
                MESSAGE,
                "m1",
                json!({
                    "id": "m1",
                    "body": "Say hello here.",
                    "authorId": "u1",
                    "attachment": null
                }),
            )
            .insert(
                MESSAGE,
                "m2",
                json!({
                    "id": "m2",
                    "body": "Hello!",
                    "authorId": "u2",
                    "attachment": "avatars/grace.png"
                }),
            )
            .insert(
                MESSAGE,
                "m3",
                json!({
                    "id": "m3",
                    "body": "Freeze is on Friday.",
                    "authorId": "u2",
                    "attachment": "docs/plan.pdf"
                }),
            )
            .insert(THREAD_INDEX, ALL_KEY, json!(["1", "2", "3"]));
        store
    }
}

#[async_trait]
impl DataSource for InMemoryStore {
    async fn load(&self, kind: &str, key: &str) -> Result<Option<Value>, ResolveError> {
        Ok(self
            .records
            .get(&(kind.to_string(), key.to_string()))
            .cloned())
    }
}
