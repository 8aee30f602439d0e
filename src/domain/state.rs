//! Serializable application state tree owned by a single request.
//!
//! The store is addressed with dot-separated paths (`dashboardFeed.activeThread`).
//! Writing through a path creates any missing intermediate objects and replaces
//! intermediate scalars, so a `set` never fails.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    tree: Map<String, Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the value stored at `path`, if any.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.').filter(|segment| !segment.is_empty());
        let first = segments.next()?;
        let mut current = self.tree.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Convenience accessor for string leaves.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Store `value` at `path`, returning the previous leaf value.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Option<Value> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let (leaf, parents) = segments.split_last()?;

        let mut current = &mut self.tree;
        for segment in parents {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(map) = slot else {
                return None;
            };
            current = map;
        }

        current.insert(leaf.to_string(), value.into())
    }

    /// Copy of the full tree for hydration.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.tree.clone())
    }

    pub fn into_snapshot(self) -> Value {
        Value::Object(self.tree)
    }
}
