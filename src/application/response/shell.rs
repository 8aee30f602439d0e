//! Static document shell wrapped around the streamed markup.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::application::render::HeadTags;
use crate::domain::request::CspNonce;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to serialize hydration payload")]
    Serialize(#[from] serde_json::Error),
    #[error("document template `{template}` failed to render")]
    Template {
        template: &'static str,
        #[source]
        source: askama::Error,
    },
}

/// What the footer needs to boot the client: both hydration snapshots, the
/// scripts for touched lazy modules and the nonce that authorises them.
#[derive(Debug, Clone)]
pub struct FooterContext<'a> {
    pub state: &'a Value,
    pub data: &'a Value,
    pub scripts: &'a [String],
    pub nonce: &'a CspNonce,
}

/// Produces the bytes sent before and after the rendered markup.
pub trait DocumentShell: Send + Sync {
    fn header(&self, head: &HeadTags, nonce: &CspNonce) -> Result<String, ShellError>;

    fn footer(&self, footer: &FooterContext<'_>) -> Result<String, ShellError>;
}

/// JSON that can sit inside an inline `<script>` without ending it early or
/// being misread as a line terminator.
pub fn script_safe_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut escaped = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            _ => escaped.push(ch),
        }
    }
    Ok(escaped)
}
