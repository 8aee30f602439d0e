//! Turns render failures into a user-safe 500 page carrying a correlation id.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::error::ErrorReport;
use crate::application::response::HTML_CONTENT_TYPE;

pub const PLACEHOLDER_ERROR_ID: &str = "only-reported-in-production";
pub const UNREPORTED_ERROR_ID: &str = "unreported";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Development,
    Production,
}

impl RuntimeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeMode::Development => "development",
            RuntimeMode::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, RuntimeMode::Production)
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("error tracker is not configured")]
    NotConfigured,
    #[error("error tracker request failed: {0}")]
    Transport(String),
    #[error("error tracker rejected the event with status {0}")]
    Rejected(u16),
    #[error("error tracker response was malformed: {0}")]
    Malformed(String),
}

/// External error-tracking transport.
#[async_trait]
pub trait ErrorTracker: Send + Sync {
    /// Submit `report` and return the tracker's event identifier.
    async fn capture(&self, report: &ErrorReport) -> Result<String, TrackerError>;
}

/// Correlation id shown on a failure page, carried in the response
/// extensions so the access log can print it next to the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureId(pub String);

pub fn failure_message(error_id: &str) -> String {
    format!("Oops, something went wrong. Please try again! (Error ID: {error_id})")
}

#[derive(Clone)]
pub struct FailureReporter {
    mode: RuntimeMode,
    tracker: Arc<dyn ErrorTracker>,
}

impl FailureReporter {
    pub fn new(mode: RuntimeMode, tracker: Arc<dyn ErrorTracker>) -> Self {
        Self { mode, tracker }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Correlation id for `report`. Only production submits to the tracker;
    /// everywhere else the placeholder is used.
    ///
    /// The failure itself is logged once, at ERROR, by the HTTP access log.
    pub async fn report(&self, report: &ErrorReport) -> String {
        let error_id = self.correlation_id(report).await;
        debug!(
            target = "trellis::ssr::failure",
            source = report.source,
            status = %report.status,
            messages = ?report.messages,
            error_id = %error_id,
            "render pipeline failed"
        );
        error_id
    }

    async fn correlation_id(&self, report: &ErrorReport) -> String {
        if !self.mode.is_production() {
            return PLACEHOLDER_ERROR_ID.to_string();
        }

        match self.tracker.capture(report).await {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    target = "trellis::ssr::failure",
                    error = %err,
                    "failed to submit error to tracker"
                );
                UNREPORTED_ERROR_ID.to_string()
            }
        }
    }

    /// Report the failure and build the 500 response shown to the viewer.
    pub async fn respond(&self, report: ErrorReport) -> Response {
        let error_id = self.report(&report).await;
        let mut response =
            (StatusCode::INTERNAL_SERVER_ERROR, failure_message(&error_id)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HTML_CONTENT_TYPE),
        );
        response.extensions_mut().insert(FailureId(error_id));
        report.attach(&mut response);
        response
    }
}
