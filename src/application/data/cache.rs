//! Normalized query cache.
//!
//! Objects that carry a `__typename` and their key fields are stored once as
//! flat entities (`Thread:42`) and referenced elsewhere as `{"__ref": "Thread:42"}`.
//! Query roots live under [`ROOT_QUERY`] keyed by [`QueryRequest::cache_key`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{PossibleTypes, QueryRequest};

pub const ROOT_QUERY: &str = "ROOT_QUERY";
const REF_FIELD: &str = "__ref";
const TYPENAME_FIELD: &str = "__typename";
const DEFAULT_KEY_FIELD: &str = "id";

/// Baseline cache options shared by the server and the browser bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheOptions {
    /// When false, results are stored verbatim without normalization.
    pub add_typename: bool,
    /// Key fields per type or abstract type. Types without an entry (directly
    /// or through a supertype) are keyed by `id`.
    pub key_fields: BTreeMap<String, Vec<String>>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            add_typename: true,
            key_fields: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedCache {
    entities: BTreeMap<String, Map<String, Value>>,
    options: Arc<CacheOptions>,
    possible_types: Arc<PossibleTypes>,
}

impl NormalizedCache {
    pub fn new(options: Arc<CacheOptions>, possible_types: Arc<PossibleTypes>) -> Self {
        Self {
            entities: BTreeMap::new(),
            options,
            possible_types,
        }
    }

    /// Cache id of an object, when it can be normalized.
    pub fn identify(&self, object: &Map<String, Value>) -> Option<String> {
        if !self.options.add_typename {
            return None;
        }
        let typename = object.get(TYPENAME_FIELD)?.as_str()?;

        let mut parts = Vec::new();
        for field in self.key_fields_for(typename) {
            match object.get(field)? {
                Value::String(value) => parts.push(value.clone()),
                Value::Null => return None,
                other => parts.push(other.to_string()),
            }
        }
        Some(format!("{typename}:{}", parts.join(":")))
    }

    fn key_fields_for<'a>(&'a self, typename: &'a str) -> Vec<&'a str> {
        if let Some(fields) = self.options.key_fields.get(typename) {
            return fields.iter().map(String::as_str).collect();
        }
        for supertype in self.possible_types.supertypes_of(typename) {
            if let Some(fields) = self.options.key_fields.get(supertype) {
                return fields.iter().map(String::as_str).collect();
            }
        }
        vec![DEFAULT_KEY_FIELD]
    }

    pub fn write_query(&mut self, request: &QueryRequest, data: &Value) {
        let normalized = self.normalize(data);
        self.entities
            .entry(ROOT_QUERY.to_string())
            .or_default()
            .insert(request.cache_key(), normalized);
    }

    /// Denormalized result for `request`, or `None` if any part is missing.
    pub fn read_query(&self, request: &QueryRequest) -> Option<Value> {
        let root = self.entities.get(ROOT_QUERY)?;
        let stored = root.get(&request.cache_key())?;
        let mut visiting = HashSet::new();
        self.denormalize(stored, &mut visiting)
    }

    fn normalize(&mut self, value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.iter().map(|v| self.normalize(v)).collect()),
            Value::Object(object) => {
                let mut fields = Map::with_capacity(object.len());
                for (name, field) in object {
                    fields.insert(name.clone(), self.normalize(field));
                }

                match self.identify(object) {
                    Some(id) => {
                        self.entities
                            .entry(id.clone())
                            .or_default()
                            .extend(fields);
                        let mut reference = Map::new();
                        reference.insert(REF_FIELD.to_string(), Value::String(id));
                        Value::Object(reference)
                    }
                    None => Value::Object(fields),
                }
            }
            scalar => scalar.clone(),
        }
    }

    fn denormalize(&self, value: &Value, visiting: &mut HashSet<String>) -> Option<Value> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.denormalize(item, visiting))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Value::Object(object) => {
                if let Some(id) = reference_id(object) {
                    // Cyclic references are left as references.
                    if !visiting.insert(id.to_string()) {
                        return Some(value.clone());
                    }
                    let entity = self.entities.get(id)?;
                    let resolved = self.denormalize_fields(entity, visiting);
                    visiting.remove(id);
                    return resolved;
                }
                self.denormalize_fields(object, visiting)
            }
            scalar => Some(scalar.clone()),
        }
    }

    fn denormalize_fields(
        &self,
        object: &Map<String, Value>,
        visiting: &mut HashSet<String>,
    ) -> Option<Value> {
        let mut fields = Map::with_capacity(object.len());
        for (name, field) in object {
            fields.insert(name.clone(), self.denormalize(field, visiting)?);
        }
        Some(Value::Object(fields))
    }

    pub fn entity(&self, id: &str) -> Option<&Map<String, Value>> {
        self.entities.get(id)
    }

    /// Serializable snapshot of every stored entity, root included.
    pub fn extract(&self) -> Value {
        let mut snapshot = Map::new();
        for (id, fields) in &self.entities {
            snapshot.insert(id.clone(), Value::Object(fields.clone()));
        }
        Value::Object(snapshot)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn reference_id(object: &Map<String, Value>) -> Option<&str> {
    if object.len() != 1 {
        return None;
    }
    object.get(REF_FIELD)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache_with(options: CacheOptions, types: PossibleTypes) -> NormalizedCache {
        NormalizedCache::new(Arc::new(options), Arc::new(types))
    }

    fn default_cache() -> NormalizedCache {
        cache_with(CacheOptions::default(), PossibleTypes::default())
    }

    #[test]
    fn shared_entities_are_stored_once() {
        let mut cache = default_cache();
        let request = QueryRequest::new("threads");
        let data = json!({
            "threads": [
                {
                    "__typename": "Thread",
                    "id": "1",
                    "author": {"__typename": "User", "id": "u1", "name": "Ada"}
                },
                {
                    "__typename": "Thread",
                    "id": "2",
                    "author": {"__typename": "User", "id": "u1", "name": "Ada"}
                }
            ]
        });

        cache.write_query(&request, &data);

        assert!(cache.entity("User:u1").is_some());
        assert_eq!(
            cache.entity("Thread:1").and_then(|t| t.get("author")),
            Some(&json!({"__ref": "User:u1"}))
        );
        assert_eq!(cache.read_query(&request), Some(data));
    }

    #[test]
    fn later_writes_update_shared_entities() {
        let mut cache = default_cache();
        let list = QueryRequest::new("threads");
        let detail = QueryRequest::new("thread").var("id", "1");

        cache.write_query(
            &list,
            &json!({"threads": [{"__typename": "Thread", "id": "1", "title": "old"}]}),
        );
        cache.write_query(
            &detail,
            &json!({"thread": {"__typename": "Thread", "id": "1", "title": "new"}}),
        );

        assert_eq!(
            cache.read_query(&list),
            Some(json!({"threads": [{"__typename": "Thread", "id": "1", "title": "new"}]}))
        );
    }

    #[test]
    fn key_fields_are_inherited_from_supertypes() {
        let mut options = CacheOptions::default();
        options
            .key_fields
            .insert("Node".to_string(), vec!["slug".to_string()]);
        let mut types = PossibleTypes::default();
        types.insert("Node", vec!["Channel".to_string()]);
        let cache = cache_with(options, types);

        let object = json!({"__typename": "Channel", "id": "9", "slug": "general"});
        let Value::Object(object) = object else {
            panic!("object literal");
        };
        assert_eq!(cache.identify(&object).as_deref(), Some("Channel:general"));
    }

    #[test]
    fn objects_without_key_fields_stay_inline() {
        let mut cache = default_cache();
        let request = QueryRequest::new("stats");
        cache.write_query(
            &request,
            &json!({"stats": {"__typename": "Stats", "count": 3}}),
        );

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.read_query(&request),
            Some(json!({"stats": {"__typename": "Stats", "count": 3}}))
        );
    }

    #[test]
    fn disabled_typename_skips_normalization() {
        let options = CacheOptions {
            add_typename: false,
            ..CacheOptions::default()
        };
        let mut cache = cache_with(options, PossibleTypes::default());
        let request = QueryRequest::new("thread");
        cache.write_query(
            &request,
            &json!({"thread": {"__typename": "Thread", "id": "1"}}),
        );

        assert!(cache.entity("Thread:1").is_none());
    }

    #[test]
    fn unknown_request_reads_none() {
        let cache = default_cache();
        assert!(cache.read_query(&QueryRequest::new("threads")).is_none());
    }

    #[test]
    fn cycles_are_left_as_references() {
        let mut cache = default_cache();
        let request = QueryRequest::new("me");
        cache.write_query(
            &request,
            &json!({"me": {
                "__typename": "User",
                "id": "u1",
                "best": {"__typename": "User", "id": "u1"}
            }}),
        );

        let read = cache.read_query(&request).expect("cached");
        assert_eq!(read["me"]["best"], json!({"__ref": "User:u1"}));
    }

    #[test]
    fn extract_contains_root_and_entities() {
        let mut cache = default_cache();
        cache.write_query(
            &QueryRequest::new("thread").var("id", "1"),
            &json!({"thread": {"__typename": "Thread", "id": "1"}}),
        );

        let snapshot = cache.extract();
        assert_eq!(
            snapshot[ROOT_QUERY][r#"thread({"id":"1"})"#],
            json!({"thread": {"__ref": "Thread:1"}})
        );
        assert_eq!(snapshot["Thread:1"], json!({"__typename": "Thread", "id": "1"}));
    }
}
