use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::{
    error::HttpError,
    response::HTML_CONTENT_TYPE,
    ssr::{RequestContext, ServerRenderer},
};

use super::middleware::{assign_csp_nonce, identify_viewer, log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub renderer: ServerRenderer,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .fallback(render_page)
        .with_state(state)
        .layer(middleware::from_fn(assign_csp_nonce))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(identify_viewer))
        .layer(middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Every other GET is server rendered.
pub async fn render_page(State(state): State<HttpState>, request: Request<Body>) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        let mut response = HttpError::new(
            "infra::http::public::render_page",
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            format!("{} is not served by the renderer", request.method()),
        )
        .into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HTML_CONTENT_TYPE),
        );
        return response;
    }

    match RequestContext::from_request(&request) {
        Ok(context) => state.renderer.render(context).await,
        Err(err) => HttpError::from(err).into_response(),
    }
}
