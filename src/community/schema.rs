//! In-process schema for the community app.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::application::data::{ExecutionContext, QueryRequest, ResolveError, SchemaResolver};

use super::data::{ALL_KEY, MESSAGE, THREAD, THREAD_INDEX, USER};

pub const THREADS: &str = "threads";
pub const THREAD_BY_ID: &str = "thread";
pub const THREAD_MESSAGES: &str = "threadMessages";
pub const VIEWER: &str = "viewer";

const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, Copy, Default)]
pub struct CommunitySchema;

#[async_trait]
impl SchemaResolver for CommunitySchema {
    async fn execute(
        &self,
        request: &QueryRequest,
        context: &ExecutionContext,
    ) -> Result<Value, ResolveError> {
        match request.operation.as_str() {
            THREADS => {
                let threads = threads(context).await?;
                Ok(json!({ THREADS: threads }))
            }
            THREAD_BY_ID => {
                let id = required(request, "id")?;
                let thread = thread(context, id).await?;
                Ok(json!({ THREAD_BY_ID: thread }))
            }
            THREAD_MESSAGES => {
                let thread_id = required(request, "threadId")?;
                let messages = thread_messages(context, thread_id).await?;
                Ok(json!({ THREAD_MESSAGES: messages }))
            }
            VIEWER => {
                let viewer = viewer(context).await?;
                Ok(json!({ VIEWER: viewer }))
            }
            other => Err(ResolveError::UnknownOperation(other.to_string())),
        }
    }
}

fn required<'a>(request: &'a QueryRequest, name: &str) -> Result<&'a str, ResolveError> {
    request
        .variable_str(name)
        .ok_or_else(|| ResolveError::missing_variable(&request.operation, name))
}

fn string_field<'a>(record: &'a Value, field: &str) -> &'a str {
    record.get(field).and_then(Value::as_str).unwrap_or_default()
}

fn string_list(record: &Value, field: &str) -> Vec<String> {
    record
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

async fn threads(context: &ExecutionContext) -> Result<Value, ResolveError> {
    let ids = match context.loaders.load(THREAD_INDEX, ALL_KEY).await? {
        Some(index) => index
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let records = context.loaders.load_many(THREAD, &ids).await?;
    let threads = records
        .into_iter()
        .flatten()
        .map(|record| {
            json!({
                "__typename": "Thread",
                "id": string_field(&record, "id"),
                "title": string_field(&record, "title"),
                "messageCount": string_list(&record, "messageIds").len(),
            })
        })
        .collect();
    Ok(Value::Array(threads))
}

async fn thread(context: &ExecutionContext, id: &str) -> Result<Value, ResolveError> {
    let Some(record) = context.loaders.load(THREAD, id).await? else {
        return Ok(Value::Null);
    };
    let author = user(context, string_field(&record, "authorId")).await?;
    Ok(json!({
        "__typename": "Thread",
        "id": string_field(&record, "id"),
        "title": string_field(&record, "title"),
        "author": author,
    }))
}

async fn thread_messages(
    context: &ExecutionContext,
    thread_id: &str,
) -> Result<Value, ResolveError> {
    let Some(record) = context.loaders.load(THREAD, thread_id).await? else {
        return Ok(Value::Array(Vec::new()));
    };
    let ids = string_list(&record, "messageIds");
    let expires = context.signed_url_expires_at().unix_timestamp();

    let mut messages = Vec::with_capacity(ids.len());
    for message in context.loaders.load_many(MESSAGE, &ids).await?.into_iter().flatten() {
        let author = user(context, string_field(&message, "authorId")).await?;
        let attachment = message
            .get("attachment")
            .and_then(Value::as_str)
            .map(|path| Value::String(format!("{UPLOADS_PREFIX}{path}?expires={expires}")))
            .unwrap_or(Value::Null);
        messages.push(json!({
            "__typename": "Message",
            "id": string_field(&message, "id"),
            "body": string_field(&message, "body"),
            "author": author,
            "attachmentUrl": attachment,
        }));
    }
    Ok(Value::Array(messages))
}

async fn viewer(context: &ExecutionContext) -> Result<Value, ResolveError> {
    let Some(current) = context.user.as_ref() else {
        return Ok(Value::Null);
    };
    let stored = user(context, &current.id).await?;
    if !stored.is_null() {
        return Ok(stored);
    }
    let mut fields = Map::new();
    fields.insert("__typename".to_string(), json!("User"));
    fields.insert("id".to_string(), json!(current.id));
    fields.insert(
        "username".to_string(),
        json!(current.username.clone().unwrap_or_else(|| current.id.clone())),
    );
    Ok(Value::Object(fields))
}

async fn user(context: &ExecutionContext, id: &str) -> Result<Value, ResolveError> {
    if id.is_empty() {
        return Ok(Value::Null);
    }
    Ok(match context.loaders.load(USER, id).await? {
        Some(record) => json!({
            "__typename": "User",
            "id": string_field(&record, "id"),
            "username": string_field(&record, "username"),
        }),
        None => Value::Null,
    })
}
