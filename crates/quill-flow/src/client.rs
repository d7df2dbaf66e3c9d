//! HTTP client for the flow-execution engine.
//!
//! The engine is treated as a black box: one request carrying the query text
//! in a conversational mode, one response carrying either the generated
//! message text or an error detail.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use quill_core::{FlowConfig, QuillError, SessionId};

use crate::error::FlowError;

/// Interface to the upstream AI execution engine.
///
/// One call per user query, no retries; the fixed timeout bound lives in the
/// implementation.
#[async_trait]
pub trait FlowClient: Send + Sync {
    /// Run the flow once with the raw query text and, when the caller has
    /// one, the session identifier, returning the generated message text.
    async fn run(&self, query: &str, session_id: Option<SessionId>)
        -> Result<String, FlowError>;
}

// =============================================================================
// Wire types
// =============================================================================

/// Request body for a single flow run, fixed to the conversational mode.
#[derive(Debug, Clone, Serialize)]
pub struct RunFlowRequest {
    pub input_value: String,
    pub input_type: String,
    pub output_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub tweaks: HashMap<String, serde_json::Value>,
}

impl RunFlowRequest {
    pub fn chat(
        query: &str,
        session_id: Option<SessionId>,
        tweaks: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            input_value: query.to_string(),
            input_type: "chat".to_string(),
            output_type: "chat".to_string(),
            session_id: session_id.map(|id| id.to_string()),
            tweaks,
        }
    }
}

/// Response envelope: a success flag plus either the message text or an
/// error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct RunFlowResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// HttpFlowClient
// =============================================================================

/// Reqwest-backed [`FlowClient`] with bearer auth and a fixed per-request
/// timeout.
pub struct HttpFlowClient {
    client: reqwest::Client,
    config: FlowConfig,
}

impl HttpFlowClient {
    /// Build a client from the flow section of the configuration.
    pub fn new(config: FlowConfig) -> quill_core::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuillError::Flow(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Full URL of the run endpoint. Streaming is pinned off.
    fn endpoint_url(&self) -> String {
        format!(
            "{}/lf/{}/api/v1/run/{}?stream=false",
            self.config.base_url.trim_end_matches('/'),
            self.config.engine_id,
            self.config.flow_id,
        )
    }
}

#[async_trait]
impl FlowClient for HttpFlowClient {
    async fn run(
        &self,
        query: &str,
        session_id: Option<SessionId>,
    ) -> Result<String, FlowError> {
        let body = RunFlowRequest::chat(query, session_id, self.config.tweaks.clone());
        let url = self.endpoint_url();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.application_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                warn!("Flow engine request failed: {err}");
                classify_transport(&err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!("Flow engine returned status {status}");
            return Err(reported_from_http(status, &body_text));
        }

        let body_text = response.text().await.map_err(|err| {
            if err.is_timeout() {
                FlowError::Timeout
            } else {
                FlowError::Malformed(format!("failed to read response body: {err}"))
            }
        })?;

        interpret_body(&body_text)
    }
}

// =============================================================================
// Classification helpers
// =============================================================================

/// Map a transport-level failure to its category. Timeout wins over any
/// other classification.
fn classify_transport(err: &reqwest::Error) -> FlowError {
    if err.is_timeout() {
        FlowError::Timeout
    } else {
        FlowError::Unreachable(err.to_string())
    }
}

/// Build a `Reported` error from a non-success HTTP response, pulling the
/// server-supplied detail out of the body when it parses.
fn reported_from_http(status: StatusCode, body: &str) -> FlowError {
    let detail = serde_json::from_str::<RunFlowResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .filter(|d| !d.is_empty());
    FlowError::Reported {
        status: Some(status.as_u16()),
        detail,
    }
}

/// Interpret a 2xx response body against the success/message/error envelope.
fn interpret_body(body: &str) -> Result<String, FlowError> {
    let parsed: RunFlowResponse = serde_json::from_str(body)
        .map_err(|e| FlowError::Malformed(format!("invalid response JSON: {e}")))?;

    if !parsed.success {
        return Err(FlowError::Reported {
            status: None,
            detail: parsed.error.filter(|d| !d.is_empty()),
        });
    }

    match parsed.message {
        Some(text) => Ok(text),
        None => Err(FlowError::Malformed(
            "success response missing message text".to_string(),
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================
