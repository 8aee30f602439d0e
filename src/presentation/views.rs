use askama::Template;

use crate::application::render::HeadTags;
use crate::application::response::{DocumentShell, FooterContext, ShellError, script_safe_json};
use crate::domain::request::CspNonce;

const DEFAULT_LANG: &str = "en";

#[derive(Template)]
#[template(path = "document_head.html")]
pub struct DocumentHeadTemplate<'a> {
    pub lang: &'a str,
    pub head_tags: String,
    pub nonce: &'a str,
}

#[derive(Template)]
#[template(path = "document_tail.html")]
pub struct DocumentTailTemplate<'a> {
    pub state_json: String,
    pub data_json: String,
    pub scripts: &'a [String],
    pub nonce: &'a str,
}

fn render_template<T: Template>(template: &T, name: &'static str) -> Result<String, ShellError> {
    template.render().map_err(|source| ShellError::Template {
        template: name,
        source,
    })
}

/// Askama-backed document shell.
#[derive(Debug, Clone)]
pub struct HtmlShell {
    lang: String,
}

impl HtmlShell {
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }
}

impl Default for HtmlShell {
    fn default() -> Self {
        Self::new(DEFAULT_LANG)
    }
}

impl DocumentShell for HtmlShell {
    fn header(&self, head: &HeadTags, nonce: &CspNonce) -> Result<String, ShellError> {
        render_template(
            &DocumentHeadTemplate {
                lang: &self.lang,
                head_tags: head.to_html(),
                nonce: nonce.as_str(),
            },
            "document_head.html",
        )
    }

    fn footer(&self, footer: &FooterContext<'_>) -> Result<String, ShellError> {
        render_template(
            &DocumentTailTemplate {
                state_json: script_safe_json(footer.state)?,
                data_json: script_safe_json(footer.data)?,
                scripts: footer.scripts,
                nonce: footer.nonce.as_str(),
            },
            "document_tail.html",
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn header_carries_head_tags_and_nonce() {
        let mut head = HeadTags::new();
        head.title("Community");
        let html = HtmlShell::default()
            .header(&head, &CspNonce::new("abc123"))
            .expect("header renders");

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Community</title>"));
        assert!(html.contains("content=\"abc123\""));
        assert!(html.trim_end().ends_with("<div id=\"root\">"));
    }

    #[test]
    fn footer_embeds_escaped_state_and_scripts() {
        let state = json!({"dashboardFeed": {"activeThread": "</script>"}});
        let data = json!({"ROOT_QUERY": {}});
        let scripts = vec!["/static/thread.js".to_string()];
        let nonce = CspNonce::new("n0");

        let html = HtmlShell::default()
            .footer(&FooterContext {
                state: &state,
                data: &data,
                scripts: &scripts,
                nonce: &nonce,
            })
            .expect("footer renders");

        assert!(html.contains(
            r#"window.__INITIAL_STATE__ = {"dashboardFeed":{"activeThread":"\u003c/script\u003e"}}"#
        ));
        assert!(!html.contains("\"</script>"));
        assert!(html.contains(r#"<script nonce="n0" src="/static/thread.js" defer></script>"#));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
