use super::transport::{SubscriberTransport, TransportError};
use crate::config::NotificationConfig;
use crate::constants::indexes;
use crate::error::{DeliveryError, DeliveryResult};
use crate::logging::{log_error, log_fanout_operation};
use crate::models::Subscriber;
use crate::state_machine::OrderStatus;
use crate::store::{RecordStore, StoreError, Versioned};
use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub type SubscriberStore = Arc<dyn RecordStore<Subscriber>>;

/// Aggregate result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub sent: usize,
    /// Includes evicted subscribers
    pub failed: usize,
    pub evicted: usize,
}

impl BroadcastSummary {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }
}

/// Status push sent to a restaurant's live connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub data: Map<String, Value>,
}

#[derive(Debug)]
enum SendOutcome {
    Sent,
    Failed(DeliveryError),
    Evicted,
}

const OVERWRITE_ATTEMPTS: u32 = 3;

/// Pushes messages to every subscriber of a tenant and prunes dead connections.
#[derive(Clone)]
pub struct NotificationFanout {
    store: SubscriberStore,
    transport: Arc<dyn SubscriberTransport>,
    send_timeout: Duration,
    message_type: String,
}

impl NotificationFanout {
    pub fn new(
        store: SubscriberStore,
        transport: Arc<dyn SubscriberTransport>,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            store,
            transport,
            send_timeout: config.send_timeout(),
            message_type: config.message_type.clone(),
        }
    }

    /// Register a connection for a tenant. A known connection id is overwritten.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, connection_id: &str, tenant_id: &str) -> DeliveryResult<Subscriber> {
        let subscriber = Subscriber::new(connection_id, tenant_id);

        let stored = match self.store.create_if_absent(connection_id, subscriber.clone()).await {
            Ok(created) => created.into_record(),
            Err(StoreError::AlreadyExists { .. }) => self.overwrite(subscriber).await?,
            Err(e) => return Err(DeliveryError::Store(e.to_string())),
        };

        debug!(connection_id, tenant_id, "subscriber registered");
        Ok(stored)
    }

    /// Replace an existing registration. A lost race re-reads and tries again; if the
    /// id stays contended the caller gets whatever registration is actually stored.
    async fn overwrite(&self, subscriber: Subscriber) -> DeliveryResult<Subscriber> {
        let key = subscriber.connection_id.clone();
        for attempt in 1..=OVERWRITE_ATTEMPTS {
            let Some(current) = self.store_call(self.store.get_by_key(&key).await)? else {
                // Unsubscribed between the two calls
                match self.store.create_if_absent(&key, subscriber.clone()).await {
                    Ok(created) => return Ok(created.into_record()),
                    Err(StoreError::AlreadyExists { .. }) => continue,
                    Err(e) => return Err(DeliveryError::Store(e.to_string())),
                }
            };

            let replacement = subscriber.clone();
            match self
                .store
                .conditional_update(&key, current.version, Box::new(move |s: &mut Subscriber| *s = replacement))
                .await
            {
                Ok(updated) => return Ok(updated.into_record()),
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(connection_id = %key, attempt, "subscribe lost a race, re-reading");
                }
                Err(e) => return Err(DeliveryError::Store(e.to_string())),
            }
        }

        warn!(connection_id = %key, "subscribe still contended, returning stored registration");
        self.store_call(self.store.get_by_key(&key).await)?
            .map(Versioned::into_record)
            .ok_or_else(|| DeliveryError::Store(format!("subscriber {key} removed during subscribe")))
    }

    /// Remove a connection. Absent ids are a no-op.
    pub async fn unsubscribe(&self, connection_id: &str) -> DeliveryResult<()> {
        let removed = self.store_call(self.store.delete(connection_id).await)?;
        debug!(connection_id, removed, "subscriber removed");
        Ok(())
    }

    /// Snapshot of a tenant's subscribers
    pub async fn subscribers(&self, tenant_id: &str) -> DeliveryResult<Vec<Subscriber>> {
        let found = self.store_call(self.store.query_by_index(indexes::TENANT_ID, tenant_id).await)?;
        Ok(found.into_iter().map(|v| v.into_record()).collect())
    }

    /// Send `message` to every subscriber of `tenant_id` concurrently.
    ///
    /// Individual send failures are counted, never raised. Only a failed subscriber
    /// lookup makes the whole call fail.
    #[instrument(skip(self, message))]
    pub async fn broadcast(&self, tenant_id: &str, message: &Value) -> DeliveryResult<BroadcastSummary> {
        let payload = serde_json::to_vec(message)?;
        let snapshot = self.store_call(self.store.query_by_index(indexes::TENANT_ID, tenant_id).await)?;

        let sends = snapshot
            .iter()
            .map(|entry| self.deliver(&entry.record.connection_id, Some(entry), payload.clone()));
        let outcomes = join_all(sends).await;

        let mut summary = BroadcastSummary::default();
        for outcome in outcomes {
            match outcome {
                SendOutcome::Sent => summary.sent += 1,
                SendOutcome::Failed(_) => summary.failed += 1,
                SendOutcome::Evicted => {
                    summary.failed += 1;
                    summary.evicted += 1;
                }
            }
        }

        log_fanout_operation(tenant_id, summary.sent, summary.failed, summary.evicted);
        Ok(summary)
    }

    /// Push `message` to a single connection. A gone peer is evicted and reported as
    /// `TransportGone`.
    #[instrument(skip(self, message))]
    pub async fn send_to(&self, connection_id: &str, message: &Value) -> DeliveryResult<()> {
        let payload = serde_json::to_vec(message)?;
        let registration = self.store_call(self.store.get_by_key(connection_id).await)?;
        match self.deliver(connection_id, registration.as_ref(), payload).await {
            SendOutcome::Sent => Ok(()),
            SendOutcome::Evicted => Err(DeliveryError::TransportGone {
                connection_id: connection_id.to_string(),
            }),
            SendOutcome::Failed(err) => Err(err),
        }
    }

    /// One bounded send. A gone peer evicts `registration`, the entry the send was
    /// addressed from, unless it changed in the meantime.
    async fn deliver(
        &self,
        connection_id: &str,
        registration: Option<&Versioned<Subscriber>>,
        payload: Vec<u8>,
    ) -> SendOutcome {
        let sent = tokio::time::timeout(self.send_timeout, self.transport.send(connection_id, payload)).await;
        let err = match sent {
            Ok(Ok(())) => return SendOutcome::Sent,
            Ok(Err(TransportError::Gone { .. })) => {
                let evicted = match registration {
                    Some(registration) => self.evict(registration).await,
                    None => Ok(false),
                };
                match evicted {
                    Ok(true) => {
                        warn!(connection_id, "stale connection evicted");
                        return SendOutcome::Evicted;
                    }
                    Ok(false) => DeliveryError::TransportGone {
                        connection_id: connection_id.to_string(),
                    },
                    Err(err) => err,
                }
            }
            Ok(Err(e)) => e.into(),
            Err(_) => {
                let timeout_ms = u64::try_from(self.send_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(connection_id, timeout_ms, "send timed out");
                DeliveryError::TimeoutExpired {
                    operation: format!("send to {connection_id}"),
                    timeout_ms,
                }
            }
        };
        log_error("NotificationFanout", "send", &err.to_string(), Some(connection_id));
        SendOutcome::Failed(err)
    }

    /// Delete `registration` iff it is still exactly what is stored. A connection that
    /// re-subscribed after the snapshot keeps its new registration.
    async fn evict(&self, registration: &Versioned<Subscriber>) -> DeliveryResult<bool> {
        let key = registration.record.connection_id.as_str();
        let current = self.store_call(self.store.get_by_key(key).await)?;
        if current.as_ref() != Some(registration) {
            debug!(connection_id = key, "registration changed since send, not evicted");
            return Ok(false);
        }
        self.store_call(self.store.delete_if_version(key, registration.version).await)
    }

    /// Build the status push for an order
    pub fn status_update_message(
        &self,
        order_id: &str,
        status: OrderStatus,
        extra: Option<Map<String, Value>>,
    ) -> StatusUpdateMessage {
        let mut data = Map::new();
        data.insert("orderId".into(), Value::from(order_id));
        data.insert("status".into(), Value::from(status.as_str()));
        data.insert(
            "timestamp".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        if let Some(extra) = extra {
            data.extend(extra);
        }
        StatusUpdateMessage {
            message_type: self.message_type.clone(),
            data,
        }
    }

    pub async fn notify_order_status_update(
        &self,
        tenant_id: &str,
        order_id: &str,
        status: OrderStatus,
        extra: Option<Map<String, Value>>,
    ) -> DeliveryResult<BroadcastSummary> {
        let message = serde_json::to_value(self.status_update_message(order_id, status, extra))?;
        self.broadcast(tenant_id, &message).await
    }

    /// Close a connection at the transport and drop its registration.
    ///
    /// The registration is removed even when the transport refuses the close.
    pub async fn force_disconnect(&self, connection_id: &str) -> DeliveryResult<()> {
        match self.transport.force_close(connection_id).await {
            Ok(()) | Err(TransportError::Gone { .. }) => {}
            Err(e) => log_error("NotificationFanout", "force_disconnect", &e.to_string(), Some(connection_id)),
        }
        self.unsubscribe(connection_id).await
    }

    fn store_call<T>(&self, result: Result<T, StoreError>) -> DeliveryResult<T> {
        result.map_err(|e| DeliveryError::Store(e.to_string()))
    }
}
