//! Error types for the report pipeline.

use quill_core::SessionId;
use quill_flow::FlowError;

/// Errors from the report pipeline and session store.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("query exceeds maximum length of {0} characters")]
    QueryTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("a report is already being generated for session {0}")]
    SessionBusy(SessionId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("render error: {0}")]
    Render(String),
    #[error(transparent)]
    Flow(#[from] FlowError),
}
