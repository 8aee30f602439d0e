//! Builds the streamed 200 response for a settled render.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::application::render::RenderOutput;
use crate::domain::request::CspNonce;

use super::{
    AssetManifest, CachePolicy, DocumentShell, FooterContext, HTML_CONTENT_TYPE, ShellError,
};

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error(transparent)]
    Shell(#[from] ShellError),
}

#[derive(Clone)]
pub struct ResponseAssembler {
    shell: Arc<dyn DocumentShell>,
    manifest: Arc<AssetManifest>,
}

impl ResponseAssembler {
    pub fn new(shell: Arc<dyn DocumentShell>, manifest: Arc<AssetManifest>) -> Self {
        Self { shell, manifest }
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    /// Header and footer are rendered up front so that nothing can fail once
    /// the first body byte has gone out. The body then yields the header, every
    /// markup chunk, and the footer, strictly in that order.
    pub fn assemble(
        &self,
        output: RenderOutput,
        authenticated: bool,
        nonce: &CspNonce,
    ) -> Result<Response, AssembleError> {
        let policy = CachePolicy::for_viewer(authenticated);
        let header = self.shell.header(&output.head, nonce)?;
        let scripts = self.manifest.scripts_for(&output.modules);
        let footer = self.shell.footer(&FooterContext {
            state: &output.state,
            data: &output.data,
            scripts: &scripts,
            nonce,
        })?;

        debug!(
            target = "trellis::response",
            markup_bytes = output.markup.len(),
            modules = output.modules.len(),
            scripts = scripts.len(),
            cache_control = policy.directive(),
            "assembling streamed response"
        );

        let markup = output.markup;
        let body = stream! {
            yield Ok::<Bytes, Infallible>(Bytes::from(header));
            for await chunk in markup {
                yield Ok(chunk);
            }
            yield Ok(Bytes::from(footer));
        };

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HTML_CONTENT_TYPE),
        );
        headers.insert(header::CACHE_CONTROL, policy.header_value());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::application::render::{HeadTags, MarkupStream, StyleSheet};
    use crate::application::response::{ManifestEntry, script_safe_json};

    struct PlainShell;

    impl DocumentShell for PlainShell {
        fn header(&self, head: &HeadTags, nonce: &CspNonce) -> Result<String, ShellError> {
            Ok(format!("<head nonce=\"{nonce}\">{}</head><body>", head.to_html()))
        }

        fn footer(&self, footer: &FooterContext<'_>) -> Result<String, ShellError> {
            Ok(format!(
                "<script>{};{}</script>{}</body>",
                script_safe_json(footer.state)?,
                script_safe_json(footer.data)?,
                footer.scripts.join(",")
            ))
        }
    }

    fn output(modules: &[&str]) -> RenderOutput {
        let mut head = HeadTags::new();
        head.title("T");
        let mut styles = StyleSheet::new();
        styles.add(".x{}");
        RenderOutput {
            markup: MarkupStream::new(&styles, vec!["<p>a</p>".into(), "<p>b</p>".into()]),
            state: json!({"s": 1}),
            data: json!({"d": 2}),
            modules: modules.iter().map(|m| m.to_string()).collect(),
            head,
            passes: 1,
        }
    }

    fn assembler() -> ResponseAssembler {
        let mut manifest = AssetManifest::new("/static/");
        manifest.insert(
            "Thread",
            vec![ManifestEntry {
                file: "thread.js".into(),
                public_path: None,
            }],
        );
        ResponseAssembler::new(Arc::new(PlainShell), Arc::new(manifest))
    }

    #[tokio::test]
    async fn body_is_header_then_markup_then_footer() {
        let response = assembler()
            .assemble(output(&["Thread", "Thread"]), false, &CspNonce::new("abc"))
            .expect("assembled");

        let mut body = response.into_body();
        let mut frames = Vec::new();
        while let Some(frame) = body.frame().await {
            let frame = frame.expect("infallible body");
            if let Ok(data) = frame.into_data() {
                frames.push(String::from_utf8(data.to_vec()).expect("utf-8"));
            }
        }

        assert_eq!(
            frames,
            vec![
                "<head nonce=\"abc\"><title>T</title></head><body>".to_string(),
                "<style data-trellis>.x{}</style>".to_string(),
                "<p>a</p>".to_string(),
                "<p>b</p>".to_string(),
                "<script>{\"s\":1};{\"d\":2}</script>/static/thread.js</body>".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn headers_follow_viewer_state() {
        let nonce = CspNonce::new("n");
        let anonymous = assembler().assemble(output(&[]), false, &nonce).expect("assembled");
        let signed_in = assembler().assemble(output(&[]), true, &nonce).expect("assembled");

        assert_eq!(anonymous.status(), StatusCode::OK);
        assert_eq!(
            anonymous.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(
            anonymous.headers()[header::CACHE_CONTROL],
            "max-age=300, s-maxage=3600, stale-while-revalidate=300, must-revalidate"
        );
        assert_eq!(signed_in.headers()[header::CACHE_CONTROL], "s-maxage=0");
    }
}
