//! Fragment matching rules derived from schema introspection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Shape of the introspection payload the schema layer publishes, e.g.
/// `{"__schema": {"types": [{"kind": "UNION", "possibleTypes": [{"name": "Thread"}]}]}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionResult {
    #[serde(rename = "__schema")]
    pub schema: IntrospectedSchema,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectedSchema {
    #[serde(default)]
    pub types: Vec<IntrospectedType>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectedType {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub possible_types: Option<Vec<NamedType>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedType {
    pub name: String,
}

/// Abstract type name → concrete type names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleTypes(BTreeMap<String, Vec<String>>);

impl PossibleTypes {
    pub fn from_introspection(result: IntrospectionResult) -> Self {
        let mut map = BTreeMap::new();
        for ty in result.schema.types {
            if ty.kind != "INTERFACE" && ty.kind != "UNION" {
                continue;
            }
            let Some(possible) = ty.possible_types else {
                continue;
            };
            map.insert(ty.name, possible.into_iter().map(|t| t.name).collect());
        }
        Self(map)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<IntrospectionResult>(raw).map(Self::from_introspection)
    }

    pub fn insert(&mut self, supertype: impl Into<String>, subtypes: Vec<String>) {
        self.0.insert(supertype.into(), subtypes);
    }

    /// Whether an object of `typename` satisfies a fragment on `condition`.
    pub fn matches(&self, typename: &str, condition: &str) -> bool {
        typename == condition
            || self
                .0
                .get(condition)
                .is_some_and(|types| types.iter().any(|t| t == typename))
    }

    pub fn supertypes_of<'a>(&'a self, typename: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(_, subtypes)| subtypes.iter().any(|t| t == typename))
            .map(|(supertype, _)| supertype.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "__schema": {
            "types": [
                {
                    "kind": "INTERFACE",
                    "name": "Node",
                    "possibleTypes": [{"name": "Thread"}, {"name": "User"}]
                },
                {"kind": "UNION", "name": "SearchResult", "possibleTypes": [{"name": "Thread"}]},
                {"kind": "OBJECT", "name": "Thread", "possibleTypes": null}
            ]
        }
    }"#;

    #[test]
    fn keeps_only_abstract_types() {
        let types = PossibleTypes::from_json(SAMPLE).expect("valid introspection");
        assert!(types.matches("Thread", "Node"));
        assert!(types.matches("Thread", "SearchResult"));
        assert!(!types.matches("User", "SearchResult"));
    }

    #[test]
    fn concrete_type_matches_itself() {
        let types = PossibleTypes::default();
        assert!(types.matches("Thread", "Thread"));
        assert!(!types.matches("Thread", "Node"));
    }

    #[test]
    fn lists_supertypes() {
        let types = PossibleTypes::from_json(SAMPLE).expect("valid introspection");
        let supertypes: Vec<&str> = types.supertypes_of("Thread").collect();
        assert_eq!(supertypes, vec!["Node", "SearchResult"]);
    }
}
