//! Component tree nodes and their HTML serialization.

use std::fmt;
use std::sync::Arc;

use super::{RenderContext, RenderError};

/// A renderable unit. Components are re-rendered on every resolution pass, so
/// `render` must be a pure function of the context it is handed.
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError>;
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    /// Escaped on output.
    Text(String),
    Element(Element),
    Fragment(Vec<Node>),
    Component(Arc<dyn Component>),
    /// A component whose code lives in a separately loaded module.
    Lazy {
        module: String,
        component: Arc<dyn Component>,
    },
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Self::Fragment(children.into_iter().collect())
    }

    pub fn component(component: impl Component + 'static) -> Self {
        Self::Component(Arc::new(component))
    }

    pub fn lazy(module: impl Into<String>, component: impl Component + 'static) -> Self {
        Self::Lazy {
            module: module.into(),
            component: Arc::new(component),
        }
    }

    /// Top-level nodes, each of which becomes one markup chunk.
    pub(crate) fn into_top_level(self) -> Vec<Node> {
        match self {
            Node::Fragment(children) => children,
            Node::Empty => Vec::new(),
            other => vec![other],
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Empty => f.write_str("Empty"),
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Element(element) => element.fmt(f),
            Node::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            Node::Component(component) => {
                f.debug_tuple("Component").field(&component.name()).finish()
            }
            Node::Lazy { module, component } => f
                .debug_struct("Lazy")
                .field("module", module)
                .field("component", &component.name())
                .finish(),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::text(text)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

/// Start building an element: `el("a").attr("href", "/").child("home")`.
pub fn el(tag: impl Into<String>) -> Element {
    Element {
        tag: tag.into(),
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

impl Element {
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn class(self, value: impl Into<String>) -> Self {
        self.attr("class", value)
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Serialize `node`, rendering nested components against `cx`.
pub(crate) fn write_node(
    node: &Node,
    cx: &mut RenderContext<'_>,
    out: &mut String,
) -> Result<(), RenderError> {
    match node {
        Node::Empty => {}
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Element(element) => write_element(element, cx, out)?,
        Node::Fragment(children) => {
            for child in children {
                write_node(child, cx, out)?;
            }
        }
        Node::Component(component) => {
            let rendered = component.render(cx)?;
            write_node(&rendered, cx, out)?;
        }
        Node::Lazy { module, component } => {
            cx.record_module(module);
            let rendered = component.render(cx)?;
            write_node(&rendered, cx, out)?;
        }
    }
    Ok(())
}

fn write_element(
    element: &Element,
    cx: &mut RenderContext<'_>,
    out: &mut String,
) -> Result<(), RenderError> {
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&element.tag.as_str()) {
        return Ok(());
    }

    for child in &element.children {
        write_node(child, cx, out)?;
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
    Ok(())
}

pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_escaped() {
        assert_eq!(escape_text("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }

    #[test]
    fn attributes_escape_quotes() {
        assert_eq!(escape_attribute(r#"a"b'c"#), "a&quot;b&#39;c");
    }

    #[test]
    fn fragments_split_into_top_level_nodes() {
        let node = Node::fragment([Node::text("a"), el("p").into()]);
        assert_eq!(node.into_top_level().len(), 2);
        assert!(Node::Empty.into_top_level().is_empty());
        assert_eq!(Node::text("x").into_top_level().len(), 1);
    }
}
