use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    application::{error::ErrorReport, failure::FailureId},
    domain::request::{CspNonce, CurrentUser},
};

/// Header a trusted upstream proxy uses to name the signed-in viewer.
pub const VIEWER_HEADER: HeaderName = HeaderName::from_static("x-trellis-user");

#[derive(Clone)]
pub struct RequestTrace {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let trace = RequestTrace {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(trace.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(trace);
    response
}

/// Give every request a fresh nonce and restrict scripts to it.
pub async fn assign_csp_nonce(mut request: Request<Body>, next: Next) -> Response {
    let nonce = CspNonce::new(STANDARD.encode(Uuid::new_v4().as_bytes()));
    let policy = format!(
        "script-src 'nonce-{nonce}' 'strict-dynamic'; object-src 'none'; base-uri 'none'"
    );
    request.extensions_mut().insert(nonce);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&policy) {
        response
            .headers_mut()
            .entry(header::CONTENT_SECURITY_POLICY)
            .or_insert(value);
    }
    response
}

/// Record the viewer named by [`VIEWER_HEADER`], if any.
pub async fn identify_viewer(mut request: Request<Body>, next: Next) -> Response {
    let viewer = request
        .headers()
        .get(&VIEWER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(CurrentUser::new);
    if let Some(viewer) = viewer {
        request.extensions_mut().insert(viewer);
    }
    next.run(request).await
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let authenticated = request.extensions().get::<CurrentUser>().is_some();

    let request_id = request
        .extensions()
        .get::<RequestTrace>()
        .map(|trace| trace.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let error_id = response
            .extensions_mut()
            .remove::<FailureId>()
            .map(|FailureId(id)| id)
            .unwrap_or_default();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "trellis::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                error_id = %error_id,
                authenticated,
                "request failed",
            );
        } else {
            warn!(
                target = "trellis::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                authenticated,
                "client request error",
            );
        }
    }

    response
}
