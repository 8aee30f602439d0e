//! Path-pattern routing to root components.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use super::{Component, Node, RenderContext, RenderError};

/// Values bound by `{name}` segments of the matched pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(BTreeMap<String, String>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

#[derive(Clone)]
struct Route {
    pattern: String,
    segments: Vec<Segment>,
    component: Arc<dyn Component>,
}

impl Route {
    fn matches(&self, path: &[&str]) -> Option<RouteParams> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Static(expected) if expected == actual => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(RouteParams(params))
    }
}

/// Route table. Patterns are tried in registration order; unmatched paths
/// render the not-found component.
#[derive(Clone)]
pub struct Routes {
    routes: Vec<Route>,
    not_found: Arc<dyn Component>,
}

impl Routes {
    pub fn new(not_found: impl Component + 'static) -> Self {
        Self {
            routes: Vec::new(),
            not_found: Arc::new(not_found),
        }
    }

    pub fn route(mut self, pattern: &str, component: impl Component + 'static) -> Self {
        let segments = split_path(pattern)
            .into_iter()
            .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Static(segment.to_string()),
            })
            .collect();
        self.routes.push(Route {
            pattern: pattern.to_string(),
            segments,
            component: Arc::new(component),
        });
        self
    }

    /// Root component for `path` and the parameters it binds.
    pub fn resolve(&self, path: &str) -> MatchedRoute {
        // Decoded per segment, so an escaped `/` stays inside its segment.
        let decoded: Vec<Cow<'_, str>> = split_path(path)
            .into_iter()
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy())
            .collect();
        let segments: Vec<&str> = decoded.iter().map(|segment| &**segment).collect();
        for route in &self.routes {
            if let Some(params) = route.matches(&segments) {
                return MatchedRoute {
                    pattern: Some(route.pattern.clone()),
                    component: Arc::clone(&route.component),
                    params,
                };
            }
        }
        MatchedRoute {
            pattern: None,
            component: Arc::clone(&self.not_found),
            params: RouteParams::default(),
        }
    }
}

#[derive(Clone)]
pub struct MatchedRoute {
    /// `None` when the not-found component was chosen.
    pub pattern: Option<String>,
    pub component: Arc<dyn Component>,
    pub params: RouteParams,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Sends the router elsewhere; renders nothing.
#[derive(Debug, Clone)]
pub struct Redirect {
    to: String,
}

impl Redirect {
    pub fn to(target: impl Into<String>) -> Self {
        Self { to: target.into() }
    }
}

impl Component for Redirect {
    fn name(&self) -> &str {
        "Redirect"
    }

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
        cx.redirect(self.to.clone());
        Ok(Node::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Component for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn render(&self, _cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
            Ok(Node::text(self.0))
        }
    }

    fn routes() -> Routes {
        Routes::new(Named("NotFound"))
            .route("/", Named("Home"))
            .route("/thread/{id}", Named("Thread"))
            .route("/thread/new", Named("Unreachable"))
    }

    #[test]
    fn binds_parameters() {
        let matched = routes().resolve("/thread/42");
        assert_eq!(matched.component.name(), "Thread");
        assert_eq!(matched.params.get("id"), Some("42"));
        assert_eq!(matched.pattern.as_deref(), Some("/thread/{id}"));
    }

    #[test]
    fn first_registered_pattern_wins() {
        assert_eq!(routes().resolve("/thread/new").component.name(), "Thread");
    }

    #[test]
    fn trailing_slashes_are_ignored() {
        assert_eq!(routes().resolve("/thread/7/").component.name(), "Thread");
        assert_eq!(routes().resolve("").component.name(), "Home");
    }

    #[test]
    fn escaped_segments_are_decoded_before_matching() {
        let matched = routes().resolve("/thread/%31");
        assert_eq!(matched.component.name(), "Thread");
        assert_eq!(matched.params.get("id"), Some("1"));

        let slash = routes().resolve("/thread/a%2Fb");
        assert_eq!(slash.component.name(), "Thread");
        assert_eq!(slash.params.get("id"), Some("a/b"));

        assert_eq!(routes().resolve("/%74hread/new").component.name(), "Thread");
    }

    #[test]
    fn unmatched_paths_fall_back() {
        let matched = routes().resolve("/nope/a/b");
        assert_eq!(matched.component.name(), "NotFound");
        assert!(matched.pattern.is_none());
        assert!(matched.params.is_empty());
    }
}
