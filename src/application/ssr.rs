//! Request-to-response server rendering pipeline.
//!
//! Each request gets its own data client, state store and render context. The
//! driver settles all data first; only then is a redirect, a streamed page, or
//! a failure page produced.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode, header},
    response::Response,
};
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::data::DataClientFactory;
use crate::application::error::ErrorReport;
use crate::application::failure::FailureReporter;
use crate::application::render::{RenderDriver, RenderError, RenderOutcome, RenderScope, Routes};
use crate::application::response::{AssembleError, HTML_CONTENT_TYPE, ResponseAssembler};
use crate::application::state::initialize_store;
use crate::domain::request::{CspNonce, CurrentUser, Location, RequestQuery};

pub const METRIC_RENDER_TOTAL: &str = "trellis_ssr_render_total";
pub const METRIC_RENDER_MS: &str = "trellis_ssr_render_ms";
pub const METRIC_RESOLUTION_PASSES: &str = "trellis_ssr_resolution_passes";

const DEFAULT_HOSTNAME: &str = "localhost";

/// Failures that abort before the pipeline starts. These are configuration
/// faults, not render failures, and are never shown the correlation page.
#[derive(Debug, Error)]
pub enum SsrError {
    #[error("no content-security-policy nonce was assigned to the request")]
    MissingNonce,
}

/// Failures inside the pipeline; all of them end in the failure page.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error("redirect target `{0}` is not a valid header value")]
    InvalidRedirect(String),
}

/// Immutable per-request inputs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub url: String,
    pub hostname: String,
    pub query: RequestQuery,
    pub user: Option<CurrentUser>,
    pub nonce: CspNonce,
}

impl RequestContext {
    /// Reads the nonce and viewer that upstream middleware stored in the
    /// request extensions. Fails before any async work when the nonce is absent.
    pub fn from_request<B>(request: &Request<B>) -> Result<Self, SsrError> {
        let nonce = request
            .extensions()
            .get::<CspNonce>()
            .cloned()
            .ok_or(SsrError::MissingNonce)?;
        let user = request.extensions().get::<CurrentUser>().cloned();

        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| request.uri().host());

        Ok(Self {
            query: RequestQuery::parse(request.uri().query()),
            hostname: host.map(hostname_of).unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            url,
            user,
            nonce,
        })
    }

    pub fn location(&self) -> Location {
        Location::new(self.hostname.clone(), self.url.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

fn hostname_of(host: &str) -> String {
    url::Url::parse(&format!("http://{host}"))
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| host.to_string())
}

/// Shared, immutable collaborators for the pipeline; cloned into every request.
#[derive(Clone)]
pub struct ServerRenderer {
    clients: DataClientFactory,
    routes: Arc<Routes>,
    driver: RenderDriver,
    assembler: ResponseAssembler,
    failures: FailureReporter,
}

impl ServerRenderer {
    pub fn new(
        clients: DataClientFactory,
        routes: Arc<Routes>,
        driver: RenderDriver,
        assembler: ResponseAssembler,
        failures: FailureReporter,
    ) -> Self {
        Self {
            clients,
            routes,
            driver,
            assembler,
            failures,
        }
    }

    /// Render one request. Never fails: redirects, pages and failures all come
    /// back as responses with an HTML content type.
    pub async fn render(&self, context: RequestContext) -> Response {
        let started = Instant::now();
        let result = self.run(&context).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let (outcome, mut response) = match result {
            Ok(Rendered::Redirect(response)) => ("redirect", response),
            Ok(Rendered::Page(response)) => ("rendered", response),
            Err(err) => {
                let report = ErrorReport::from_error(
                    "application::ssr",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &err,
                );
                ("failed", self.failures.respond(report).await)
            }
        };

        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HTML_CONTENT_TYPE),
        );
        counter!(METRIC_RENDER_TOTAL, "outcome" => outcome).increment(1);
        histogram!(METRIC_RENDER_MS).record(elapsed_ms);

        info!(
            target = "trellis::ssr",
            url = %context.url,
            outcome,
            status = response.status().as_u16(),
            authenticated = context.is_authenticated(),
            elapsed_ms,
            "request rendered"
        );
        response
    }

    async fn run(&self, context: &RequestContext) -> Result<Rendered, PipelineError> {
        let scope = RenderScope {
            client: self.clients.create(context.user.clone()),
            state: initialize_store(&context.query),
            location: context.location(),
            user: context.user.clone(),
        };

        match self.driver.render(&self.routes, scope).await? {
            RenderOutcome::Redirect { location, passes } => {
                histogram!(METRIC_RESOLUTION_PASSES).record(f64::from(passes));
                debug!(target = "trellis::ssr", %location, "render requested a redirect");
                redirect_response(&location).map(Rendered::Redirect)
            }
            RenderOutcome::Rendered(output) => {
                histogram!(METRIC_RESOLUTION_PASSES).record(f64::from(output.passes));
                let response =
                    self.assembler
                        .assemble(output, context.is_authenticated(), &context.nonce)?;
                Ok(Rendered::Page(response))
            }
        }
    }
}

enum Rendered {
    Redirect(Response),
    Page(Response),
}

fn redirect_response(location: &str) -> Result<Response, PipelineError> {
    let value = HeaderValue::from_str(location)
        .map_err(|_| PipelineError::InvalidRedirect(location.to_string()))?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    response.headers_mut().insert(header::LOCATION, value);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> axum::http::request::Builder {
        Request::builder().uri(uri).header(header::HOST, "forum.example:8080")
    }

    #[test]
    fn context_reads_extensions_and_query() {
        let mut req = request("/thread/4?t=4&x=1").body(()).expect("request");
        req.extensions_mut().insert(CspNonce::new("nonce-1"));
        req.extensions_mut().insert(CurrentUser::new("u1"));

        let context = RequestContext::from_request(&req).expect("context");

        assert_eq!(context.url, "/thread/4?t=4&x=1");
        assert_eq!(context.hostname, "forum.example");
        assert_eq!(context.query.get("t"), Some("4"));
        assert_eq!(context.nonce.as_str(), "nonce-1");
        assert!(context.is_authenticated());
        assert_eq!(context.location().path, "/thread/4");
    }

    #[test]
    fn missing_nonce_fails_fast() {
        let req = request("/").body(()).expect("request");
        assert!(matches!(
            RequestContext::from_request(&req),
            Err(SsrError::MissingNonce)
        ));
    }

    #[test]
    fn redirect_has_location_and_no_body() {
        let response = redirect_response("/thread/1").expect("valid target");
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "/thread/1");
    }

    #[test]
    fn invalid_redirect_targets_are_pipeline_failures() {
        assert!(matches!(
            redirect_response("/bad\nheader"),
            Err(PipelineError::InvalidRedirect(_))
        ));
    }
}
