//! # Workflow Engine Signal Port
//!
//! The external engine that runs the multi-step delivery process parks a task on an
//! opaque token and waits for us to report success or failure. This module is the
//! boundary to that engine; the in-process adapter is used for tests and local runs.

pub mod in_process;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use in_process::{InProcessWorkflowEngine, RecordedSignal, SignalKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("Token {token} was already settled")]
    TokenAlreadySettled { token: String },

    #[error("Token {token} is unknown to the workflow engine")]
    UnknownToken { token: String },

    #[error("Workflow engine rejected the signal: {0}")]
    Rejected(String),
}

/// Report the outcome of a parked workflow task.
///
/// Each token may be signalled at most once; a second signal is an error in the engine.
#[async_trait]
pub trait WorkflowSignal: Send + Sync {
    async fn signal_success(&self, token: &str, payload: Value) -> Result<(), SignalError>;

    async fn signal_failure(
        &self,
        token: &str,
        error_kind: &str,
        cause: &str,
    ) -> Result<(), SignalError>;
}
