//! Report orchestrator: central coordinator wiring the upstream flow
//! client, the visualization extractor, the format renderer, and the
//! session store.
//!
//! Every failure path resolves to a well-formed [`ReportResult`]; no error
//! crosses the orchestrator boundary as a panic or a raw `Err`.

use std::sync::Arc;

use tracing::{info, warn};

use quill_core::{ReportConfig, ReportFormat, ReportResult, SessionId};
use quill_flow::{FlowClient, FlowError};

use crate::error::ReportError;
use crate::extract::extract;
use crate::render::render;
use crate::session::SessionStore;

// =============================================================================
// Fixed user-facing messages
// =============================================================================

pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a valid message.";
pub const QUERY_TOO_LONG_MESSAGE: &str =
    "Your message is too long. Please shorten it and try again.";
pub const SESSION_BUSY_MESSAGE: &str =
    "A report is already being generated for this session. Please wait for it to finish.";
pub const TIMEOUT_MESSAGE: &str = "The report generation request timed out. Please try again.";
pub const UNREACHABLE_MESSAGE: &str =
    "Could not reach the report generation service. Please check your connection and try again.";
pub const SERVER_ERROR_MESSAGE: &str =
    "The report generation service reported an error. Please try again.";
pub const FALLBACK_MESSAGE: &str = "Something went wrong, please try again.";

// =============================================================================
// Request
// =============================================================================

/// One report-generation request from the presentation layer.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub user_id: String,
    pub project_id: String,
    /// Existing session to continue; a new session is created when absent
    /// or stale.
    pub session_id: Option<SessionId>,
    pub query: String,
    pub format: ReportFormat,
}

// =============================================================================
// ReportOrchestrator
// =============================================================================

/// Coordinates one user query through validation, the single upstream call,
/// extraction, rendering, and session bookkeeping.
pub struct ReportOrchestrator {
    flow: Arc<dyn FlowClient>,
    store: Arc<SessionStore>,
    config: ReportConfig,
}

impl ReportOrchestrator {
    pub fn new(flow: Arc<dyn FlowClient>, store: Arc<SessionStore>, config: ReportConfig) -> Self {
        Self {
            flow,
            store,
            config,
        }
    }

    /// The session store backing this orchestrator, shared with the
    /// presentation layer's session query surface.
    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    /// Generate a report for one query.
    ///
    /// Exactly one upstream call is made per accepted request; rejected
    /// input never reaches the upstream engine. The pending marker placed
    /// on the session is replaced by the final turn before this returns,
    /// on success and failure alike.
    pub async fn generate(&self, request: GenerateRequest) -> ReportResult {
        let query = match self.validate(&request.query) {
            Ok(query) => query,
            Err(ReportError::EmptyQuery) => return ReportResult::error(EMPTY_QUERY_MESSAGE),
            Err(_) => return ReportResult::error(QUERY_TOO_LONG_MESSAGE),
        };

        let session_id = match self.resolve_session(&request, query) {
            Ok(id) => id,
            Err(err) => {
                warn!("Session resolution failed: {err}");
                return ReportResult::error(FALLBACK_MESSAGE);
            }
        };

        if let Err(err) = self.store.begin_pending(session_id, &request.query) {
            return match err {
                ReportError::SessionBusy(_) => ReportResult::error(SESSION_BUSY_MESSAGE),
                other => {
                    warn!("Could not mark session pending: {other}");
                    ReportResult::error(FALLBACK_MESSAGE)
                }
            };
        }

        let result = match self.flow.run(query, Some(session_id)).await {
            Ok(raw_text) => {
                let extraction = extract(&raw_text);
                info!(
                    "Generated report for session {session_id} ({} visualization(s))",
                    extraction.specs.len()
                );
                render(&extraction.cleaned, request.format, extraction.specs)
            }
            Err(err) => {
                warn!("Upstream flow call failed for session {session_id}: {err}");
                ReportResult::error(flow_error_message(&err))
            }
        };

        let turn = result.clone().into_turn(request.query.clone());
        if let Err(err) = self.store.resolve_pending(session_id, turn) {
            warn!("Failed to record turn for session {session_id}: {err}");
        }

        result
    }

    /// Local validation; rejected input never reaches the upstream engine.
    fn validate<'a>(&self, query: &'a str) -> Result<&'a str, ReportError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ReportError::EmptyQuery);
        }
        if trimmed.chars().count() > self.config.max_query_length {
            return Err(ReportError::QueryTooLong(self.config.max_query_length));
        }
        Ok(trimmed)
    }

    /// Reuse the requested session when it exists; otherwise create a new
    /// one titled from the query.
    fn resolve_session(
        &self,
        request: &GenerateRequest,
        query: &str,
    ) -> Result<SessionId, ReportError> {
        if let Some(id) = request.session_id {
            if self.store.get_session(id).is_some() {
                return Ok(id);
            }
        }
        self.store
            .create_session(&request.user_id, &request.project_id, query)
            .map(|session| session.id)
    }
}

/// Select the user-facing message for an upstream failure.
///
/// Categories are mutually exclusive and checked in fixed priority order:
/// timeout, then connectivity, then server-reported detail, then the
/// generic fallback.
fn flow_error_message(err: &FlowError) -> String {
    match err {
        FlowError::Timeout => TIMEOUT_MESSAGE.to_string(),
        FlowError::Unreachable(_) => UNREACHABLE_MESSAGE.to_string(),
        FlowError::Reported {
            detail: Some(detail),
            ..
        } => format!("The report generation service reported an error: {detail}"),
        FlowError::Reported { detail: None, .. } => SERVER_ERROR_MESSAGE.to_string(),
        FlowError::Malformed(_) => FALLBACK_MESSAGE.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
