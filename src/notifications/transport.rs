//! Subscriber transport port and an in-process adapter.

use crate::error::DeliveryError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Errors reported by a single subscriber send
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The peer connection no longer exists; the subscriber should be evicted.
    #[error("Connection {connection_id} is gone")]
    Gone { connection_id: String },

    #[error("Send to {connection_id} failed: {reason}")]
    Failed {
        connection_id: String,
        reason: String,
    },
}

impl TransportError {
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone { .. })
    }
}

impl From<TransportError> for DeliveryError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Gone { connection_id } => DeliveryError::TransportGone { connection_id },
            TransportError::Failed {
                connection_id,
                reason,
            } => DeliveryError::TransportFailed {
                connection_id,
                reason,
            },
        }
    }
}

/// Push channel to connected subscribers (websocket gateway, SSE hub, ...).
#[async_trait]
pub trait SubscriberTransport: Send + Sync {
    async fn send(&self, connection_id: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    async fn force_close(&self, connection_id: &str) -> Result<(), TransportError>;
}

/// One bounded mpsc channel per connection.
///
/// The receiving half is handed to whoever owns the connection. Dropping it makes later
/// sends report [`TransportError::Gone`].
#[derive(Debug, Clone, Default)]
pub struct ChannelTransport {
    connections: Arc<DashMap<String, mpsc::Sender<Vec<u8>>>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection, replacing any previous channel under the same id
    pub fn connect(&self, connection_id: impl Into<String>, capacity: usize) -> mpsc::Receiver<Vec<u8>> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.connections.insert(connection_id.into(), sender);
        receiver
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.connections
            .get(connection_id)
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[async_trait]
impl SubscriberTransport for ChannelTransport {
    async fn send(&self, connection_id: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        // Clone the sender out so no map guard is held across the await
        let sender = self
            .connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::Gone {
                connection_id: connection_id.to_string(),
            })?;

        if sender.send(payload).await.is_err() {
            self.connections.remove(connection_id);
            return Err(TransportError::Gone {
                connection_id: connection_id.to_string(),
            });
        }
        Ok(())
    }

    async fn force_close(&self, connection_id: &str) -> Result<(), TransportError> {
        match self.connections.remove(connection_id) {
            Some(_) => {
                debug!(connection_id, "connection closed");
                Ok(())
            }
            None => Err(TransportError::Gone {
                connection_id: connection_id.to_string(),
            }),
        }
    }
}
