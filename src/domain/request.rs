//! Per-request inputs shared by every render concern.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Signed-in viewer placed into request extensions by upstream middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Content-Security-Policy nonce assigned before the render pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CspNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded query parameters. Repeated keys keep their first value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    params: BTreeMap<String, String>,
}

impl RequestQuery {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut params = BTreeMap::new();
        if let Some(raw) = raw {
            for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                params
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }
        Self { params }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RequestQuery
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = BTreeMap::new();
        for (key, value) in iter {
            params.entry(key.into()).or_insert_with(|| value.into());
        }
        Self { params }
    }
}

/// Where the router believes the request is pointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub hostname: String,
    pub path: String,
    pub query: RequestQuery,
    /// Original path and query as received.
    pub url: String,
}

impl Location {
    pub fn new(hostname: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path.to_string(), RequestQuery::parse(Some(query))),
            None => (url.clone(), RequestQuery::default()),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };

        Self {
            hostname: hostname.into(),
            path,
            query,
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_keeps_first_value_for_repeated_keys() {
        let query = RequestQuery::parse(Some("t=first&t=second&q=a%20b"));
        assert_eq!(query.get("t"), Some("first"));
        assert_eq!(query.get("q"), Some("a b"));
    }

    #[test]
    fn location_splits_path_and_query() {
        let location = Location::new("example.com", "/thread/42?t=42");
        assert_eq!(location.path, "/thread/42");
        assert_eq!(location.query.get("t"), Some("42"));
        assert_eq!(location.url, "/thread/42?t=42");
    }

    #[test]
    fn empty_path_defaults_to_root() {
        let location = Location::new("example.com", "?t=1");
        assert_eq!(location.path, "/");
    }
}
