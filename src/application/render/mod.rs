//! Render driver: walks the component tree until every data dependency is
//! settled, then hands back markup and the side outputs collected on the way.

mod context;
mod driver;
mod head;
mod markup;
mod node;
mod router;
mod styles;

use thiserror::Error;

use crate::application::data::DataError;

pub use context::{PassOutput, RenderContext};
pub use driver::{DEFAULT_MAX_PASSES, RenderDriver, RenderOutcome, RenderOutput, RenderScope};
pub use head::{HeadTags, LinkTag, MetaTag};
pub use markup::MarkupStream;
pub use node::{Component, Element, Node, el, escape_attribute, escape_text};
pub use router::{MatchedRoute, Redirect, RouteParams, Routes};
pub use styles::StyleSheet;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("component `{component}` failed: {message}")]
    Component { component: String, message: String },
    #[error("data dependencies still pending after {passes} resolution passes")]
    Unsettled { passes: u32 },
}

impl RenderError {
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}
