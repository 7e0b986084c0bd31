use super::{SignalError, WorkflowSignal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SignalKind {
    Success(Value),
    Failure { error_kind: String, cause: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSignal {
    pub token: String,
    pub kind: SignalKind,
    pub received_at: DateTime<Utc>,
}

/// Workflow engine stand-in that behaves like the real one towards tokens: each can be
/// settled once, a second signal is rejected.
#[derive(Clone, Default)]
pub struct InProcessWorkflowEngine {
    settled: Arc<DashMap<String, ()>>,
    signals: Arc<Mutex<Vec<RecordedSignal>>>,
    rejecting: Arc<AtomicBool>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl InProcessWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent signal fail with `Rejected`.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Delay every subsequent signal, to exercise caller timeouts.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn signals(&self) -> Vec<RecordedSignal> {
        self.signals.lock().clone()
    }

    pub fn signal_count(&self, token: &str) -> usize {
        self.signals
            .lock()
            .iter()
            .filter(|signal| signal.token == token)
            .count()
    }

    async fn record(&self, token: &str, kind: SignalKind) -> Result<(), SignalError> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.rejecting.load(Ordering::SeqCst) {
            return Err(SignalError::Rejected("engine unavailable".to_string()));
        }

        if self.settled.insert(token.to_string(), ()).is_some() {
            warn!(token, "duplicate signal for settled token");
            return Err(SignalError::TokenAlreadySettled {
                token: token.to_string(),
            });
        }

        debug!(token, "workflow signal recorded");
        self.signals.lock().push(RecordedSignal {
            token: token.to_string(),
            kind,
            received_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl WorkflowSignal for InProcessWorkflowEngine {
    async fn signal_success(&self, token: &str, payload: Value) -> Result<(), SignalError> {
        self.record(token, SignalKind::Success(payload)).await
    }

    async fn signal_failure(
        &self,
        token: &str,
        error_kind: &str,
        cause: &str,
    ) -> Result<(), SignalError> {
        self.record(
            token,
            SignalKind::Failure {
                error_kind: error_kind.to_string(),
                cause: cause.to_string(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_second_signal_is_rejected() {
        let engine = InProcessWorkflowEngine::new();
        engine.signal_success("tok-1", json!({"ok": true})).await.unwrap();

        let again = engine.signal_failure("tok-1", "DeliveryCancelled", "late").await;
        assert_eq!(
            again,
            Err(SignalError::TokenAlreadySettled {
                token: "tok-1".into()
            })
        );
        assert_eq!(engine.signal_count("tok-1"), 1);
    }

    #[tokio::test]
    async fn test_rejecting_engine_records_nothing() {
        let engine = InProcessWorkflowEngine::new();
        engine.set_rejecting(true);
        assert!(matches!(
            engine.signal_success("tok-1", json!({})).await,
            Err(SignalError::Rejected(_))
        ));
        assert!(engine.signals().is_empty());
    }
}
