use thiserror::Error;

/// Errors from the upstream flow-execution engine.
///
/// Variants are mutually exclusive failure categories, classified in a fixed
/// priority order: timeout first, then transport/connectivity, then
/// server-reported detail, then malformed payloads.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow engine request timed out")]
    Timeout,

    #[error("flow engine unreachable: {0}")]
    Unreachable(String),

    #[error("flow engine reported an error: {}", .detail.as_deref().unwrap_or("no detail provided"))]
    Reported {
        /// HTTP status when the failure came with one.
        status: Option<u16>,
        /// Server-supplied error detail, when present.
        detail: Option<String>,
    },

    #[error("flow engine returned a malformed payload: {0}")]
    Malformed(String),
}
