//! Error-tracker transports used by the failure reporter in production.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::debug;
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::application::failure::{ErrorTracker, TrackerError};
use crate::config::ErrorTrackingSettings;

use super::error::InfraError;

#[derive(Debug, Serialize)]
struct TrackerEvent<'a> {
    event_id: String,
    environment: &'a str,
    source: &'static str,
    status: u16,
    messages: &'a [String],
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct TrackerAck {
    #[serde(default)]
    id: Option<String>,
}

/// Posts each failure as JSON to an HTTP collector.
#[derive(Clone, Debug)]
pub struct HttpErrorTracker {
    client: Client,
    endpoint: Url,
    environment: String,
}

impl HttpErrorTracker {
    pub fn new(
        endpoint: Url,
        environment: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build tracker client: {err}"))
            })?;
        Ok(Self {
            client,
            endpoint,
            environment: environment.into(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("trellis/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl ErrorTracker for HttpErrorTracker {
    async fn capture(&self, report: &ErrorReport) -> Result<String, TrackerError> {
        let event_id = Uuid::new_v4().simple().to_string();
        let event = TrackerEvent {
            event_id: event_id.clone(),
            environment: &self.environment,
            source: report.source,
            status: report.status.as_u16(),
            messages: &report.messages,
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&event)
            .send()
            .await
            .map_err(|err| TrackerError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Rejected(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| TrackerError::Transport(err.to_string()))?;
        if body.is_empty() {
            return Ok(event_id);
        }
        let ack: TrackerAck = serde_json::from_slice(&body)
            .map_err(|err| TrackerError::Malformed(err.to_string()))?;

        debug!(
            target = "trellis::infra::tracker",
            event_id = %event_id,
            "error submitted to tracker"
        );
        Ok(ack.id.filter(|id| !id.is_empty()).unwrap_or(event_id))
    }
}

/// Tracker used when no endpoint is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledTracker;

#[async_trait]
impl ErrorTracker for DisabledTracker {
    async fn capture(&self, _report: &ErrorReport) -> Result<String, TrackerError> {
        Err(TrackerError::NotConfigured)
    }
}

/// Pick the transport for `settings`.
pub fn build_tracker(
    settings: &ErrorTrackingSettings,
) -> Result<std::sync::Arc<dyn ErrorTracker>, InfraError> {
    match settings.endpoint.as_ref() {
        Some(endpoint) => Ok(std::sync::Arc::new(HttpErrorTracker::new(
            endpoint.clone(),
            settings.environment.clone(),
            settings.timeout,
        )?)),
        None => Ok(std::sync::Arc::new(DisabledTracker)),
    }
}
