use super::types::{ErrorKind, OutboundEvent};
use crate::config::ServiceConfig;
use crate::error::{DeliveryError, DeliveryResult};
use crate::models::DeliveryRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, instrument};
use uuid::Uuid;

/// An event as placed on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: Uuid,
    pub source: String,
    pub detail_type: String,
    pub detail: Value,
    pub event_bus_name: String,
    pub published_at: DateTime<Utc>,
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Event bus rejected {count} event(s): {reason}")]
    Rejected { count: usize, reason: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PublishError> for DeliveryError {
    fn from(error: PublishError) -> Self {
        DeliveryError::EventPublish(error.to_string())
    }
}

/// Event bus port
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), PublishError>;

    async fn publish_batch(&self, envelopes: Vec<EventEnvelope>) -> Result<(), PublishError>;
}

/// In-process event bus on a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastEventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), PublishError> {
        // No subscribers is acceptable - events are published even if no one is listening
        let _ = self.sender.send(envelope);
        Ok(())
    }

    async fn publish_batch(&self, envelopes: Vec<EventEnvelope>) -> Result<(), PublishError> {
        for envelope in envelopes {
            let _ = self.sender.send(envelope);
        }
        Ok(())
    }
}

/// Typed publishing of delivery lifecycle events
#[derive(Clone)]
pub struct DeliveryEventPublisher {
    bus: Arc<dyn EventBus>,
    source: String,
    event_bus_name: String,
}

impl DeliveryEventPublisher {
    pub fn new(bus: Arc<dyn EventBus>, service: &ServiceConfig) -> Self {
        Self {
            bus,
            source: service.event_source.clone(),
            event_bus_name: service.event_bus_name.clone(),
        }
    }

    fn envelope(&self, event: &OutboundEvent) -> DeliveryResult<EventEnvelope> {
        Ok(EventEnvelope {
            id: Uuid::new_v4(),
            source: self.source.clone(),
            detail_type: event.detail_type().to_string(),
            detail: event.detail()?,
            event_bus_name: self.event_bus_name.clone(),
            published_at: Utc::now(),
        })
    }

    #[instrument(skip(self, event), fields(detail_type = event.detail_type(), order_id = event.order_id()))]
    pub async fn publish(&self, event: OutboundEvent) -> DeliveryResult<EventEnvelope> {
        let envelope = self.envelope(&event)?;
        self.bus.publish(envelope.clone()).await?;
        debug!(event_id = %envelope.id, "event published");
        Ok(envelope)
    }

    pub async fn publish_batch(&self, events: Vec<OutboundEvent>) -> DeliveryResult<Vec<EventEnvelope>> {
        let envelopes = events
            .iter()
            .map(|event| self.envelope(event))
            .collect::<DeliveryResult<Vec<_>>>()?;
        self.bus.publish_batch(envelopes.clone()).await?;
        debug!(count = envelopes.len(), "event batch published");
        Ok(envelopes)
    }

    pub async fn publish_in_preparation(&self, record: &DeliveryRecord) -> DeliveryResult<EventEnvelope> {
        self.publish(OutboundEvent::in_preparation(record)?).await
    }

    pub async fn publish_in_dispatch(&self, record: &DeliveryRecord) -> DeliveryResult<EventEnvelope> {
        self.publish(OutboundEvent::in_dispatch(record)?).await
    }

    pub async fn publish_en_route(&self, record: &DeliveryRecord) -> DeliveryResult<EventEnvelope> {
        self.publish(OutboundEvent::en_route(record)?).await
    }

    pub async fn publish_delivered(&self, record: &DeliveryRecord) -> DeliveryResult<EventEnvelope> {
        self.publish(OutboundEvent::delivered(record)?).await
    }

    pub async fn publish_error(
        &self,
        order_id: &str,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> DeliveryResult<EventEnvelope> {
        self.publish(OutboundEvent::error(order_id, kind, message)).await
    }
}
