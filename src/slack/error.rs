//! Error and response types for the Slack Web API.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from a single Slack API attempt.
#[derive(Error, Debug)]
pub enum SlackError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// API rate limited. `retry_after` is absent when Slack did not say.
    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Slack answered with `ok: false` or an unexpected HTTP status.
    #[error("Slack API error: {0}")]
    Api(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Inbound event payload is missing required fields.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlackError {
    /// Short machine-readable code, in the style of Slack's own `error` field.
    pub fn code(&self) -> String {
        match self {
            SlackError::Config(_) => "configuration_error".to_string(),
            SlackError::RateLimited { .. } => "ratelimited".to_string(),
            SlackError::Api(code) => code.clone(),
            SlackError::Network(_) => "network_error".to_string(),
            SlackError::Timeout(_) => "request_timeout".to_string(),
            SlackError::InvalidPayload(_) => "invalid_payload".to_string(),
            SlackError::Json(_) => "invalid_response".to_string(),
            SlackError::Internal(_) => "internal_error".to_string(),
        }
    }
}

impl From<reqwest::Error> for SlackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlackError::Timeout(err.to_string())
        } else if err.is_connect() {
            SlackError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            SlackError::Json(err.to_string())
        } else {
            SlackError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlackError {
    fn from(err: serde_json::Error) -> Self {
        SlackError::Json(err.to_string())
    }
}

/// Result type for Slack operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Body of a Slack Web API response.
///
/// Also used for the synthetic failure payload returned once retries run out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlackResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_metadata: Option<ResponseMetadata>,
}

impl SlackResponse {
    pub fn failure(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            response_metadata: Some(ResponseMetadata {
                messages: vec![detail.into()],
            }),
            ..Default::default()
        }
    }
}
