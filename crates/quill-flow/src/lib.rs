//! Client for the upstream flow-execution engine.
//!
//! Exposes the [`FlowClient`] contract consumed by the report orchestrator
//! and an HTTP implementation with a fixed timeout bound and mutually
//! exclusive failure categories.

pub mod client;
pub mod error;

pub use client::{FlowClient, HttpFlowClient, RunFlowRequest, RunFlowResponse};
pub use error::FlowError;
