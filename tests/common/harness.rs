//! In-memory wiring of the orchestrator with scripted collaborators.

#![allow(dead_code)]

use super::builders::{dispatched, food_ready, OrderBuilder};
use async_trait::async_trait;
use delivery_orchestrator::callbacks::AwaitedStep;
use delivery_orchestrator::config::DeliveryConfig;
use delivery_orchestrator::events::{BroadcastEventBus, EventEnvelope};
use delivery_orchestrator::models::{ActorProfile, DeliveryRecord, Subscriber};
use delivery_orchestrator::notifications::{SubscriberTransport, TransportError};
use delivery_orchestrator::orchestration::{build_orchestrator, DeliveryAdapters, Trigger};
use delivery_orchestrator::services::{AssignmentContext, AssignmentResolver, SelectionError};
use delivery_orchestrator::store::InMemoryRecordStore;
use delivery_orchestrator::workflow::InProcessWorkflowEngine;
use delivery_orchestrator::{DeliveryOrchestrator, Role};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Resolver returning fixed actors, with roles that can be switched off
#[derive(Default)]
pub struct ScriptedResolver {
    unavailable: Mutex<Vec<Role>>,
}

impl ScriptedResolver {
    pub fn make_unavailable(&self, role: Role) {
        self.unavailable.lock().push(role);
    }

    pub fn profile(role: Role) -> ActorProfile {
        match role {
            Role::Cook => ActorProfile::new("COC-1", "Juan"),
            Role::Dispatcher => ActorProfile::new("DES-1", "Ana"),
            Role::Courier => ActorProfile::courier("REP-1", "Luis", "Moto", 30),
        }
    }

    fn pick(&self, role: Role, ctx: &AssignmentContext) -> Result<ActorProfile, SelectionError> {
        if self.unavailable.lock().contains(&role) {
            return Err(SelectionError::NoActorsAvailable {
                role,
                restaurant_id: ctx.restaurant_id.clone(),
            });
        }
        Ok(Self::profile(role))
    }
}

#[async_trait]
impl AssignmentResolver for ScriptedResolver {
    async fn select_cook(&self, ctx: &AssignmentContext) -> Result<ActorProfile, SelectionError> {
        self.pick(Role::Cook, ctx)
    }

    async fn select_dispatcher(
        &self,
        ctx: &AssignmentContext,
    ) -> Result<ActorProfile, SelectionError> {
        self.pick(Role::Dispatcher, ctx)
    }

    async fn select_courier(
        &self,
        ctx: &AssignmentContext,
    ) -> Result<ActorProfile, SelectionError> {
        self.pick(Role::Courier, ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendBehavior {
    Deliver,
    Gone,
    Fail,
    Hang,
}

/// Transport whose per-connection behaviour is set by the test
#[derive(Default)]
pub struct ScriptedTransport {
    behaviors: Mutex<HashMap<String, SendBehavior>>,
    attempts: Mutex<Vec<String>>,
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedTransport {
    pub fn set_behavior(&self, connection_id: &str, behavior: SendBehavior) {
        self.behaviors
            .lock()
            .insert(connection_id.to_string(), behavior);
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    pub fn clear_attempts(&self) {
        self.attempts.lock().clear();
    }

    pub fn delivered(&self) -> Vec<(String, Vec<u8>)> {
        self.delivered.lock().clone()
    }

    pub fn delivered_json(&self) -> Vec<serde_json::Value> {
        self.delivered
            .lock()
            .iter()
            .map(|(_, bytes)| serde_json::from_slice(bytes).expect("valid json push"))
            .collect()
    }
}

#[async_trait]
impl SubscriberTransport for ScriptedTransport {
    async fn send(&self, connection_id: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.attempts.lock().push(connection_id.to_string());
        let behavior = self
            .behaviors
            .lock()
            .get(connection_id)
            .copied()
            .unwrap_or(SendBehavior::Deliver);

        match behavior {
            SendBehavior::Deliver => {
                self.delivered
                    .lock()
                    .push((connection_id.to_string(), payload));
                Ok(())
            }
            SendBehavior::Gone => Err(TransportError::Gone {
                connection_id: connection_id.to_string(),
            }),
            SendBehavior::Fail => Err(TransportError::Failed {
                connection_id: connection_id.to_string(),
                reason: "socket reset".to_string(),
            }),
            SendBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }
    }

    async fn force_close(&self, _connection_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

pub fn test_config() -> DeliveryConfig {
    let mut config = DeliveryConfig::default();
    config.orchestration.signal_timeout_ms = 200;
    config.notifications.send_timeout_ms = 100;
    config
}

pub struct TestHarness {
    pub orchestrator: DeliveryOrchestrator,
    pub workflow: InProcessWorkflowEngine,
    pub bus: BroadcastEventBus,
    pub transport: Arc<ScriptedTransport>,
    pub resolver: Arc<ScriptedResolver>,
    pub records: Arc<InMemoryRecordStore<DeliveryRecord>>,
    pub subscribers: Arc<InMemoryRecordStore<Subscriber>>,
    events: Mutex<broadcast::Receiver<EventEnvelope>>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: DeliveryConfig) -> Self {
        let workflow = InProcessWorkflowEngine::new();
        let bus = BroadcastEventBus::new(256);
        let events = Mutex::new(bus.subscribe());
        let transport = Arc::new(ScriptedTransport::default());
        let resolver = Arc::new(ScriptedResolver::default());
        let records = Arc::new(InMemoryRecordStore::new());
        let subscribers = Arc::new(InMemoryRecordStore::new());

        let adapters = DeliveryAdapters {
            records: records.clone(),
            subscribers: subscribers.clone(),
            workflow: Arc::new(workflow.clone()),
            event_bus: Arc::new(bus.clone()),
            transport: transport.clone(),
            resolver: resolver.clone(),
        };

        Self {
            orchestrator: build_orchestrator(&config, adapters),
            workflow,
            bus,
            transport,
            resolver,
            records,
            subscribers,
            events,
        }
    }

    /// Detail types published since the last call
    pub fn published(&self) -> Vec<EventEnvelope> {
        let mut receiver = self.events.lock();
        let mut drained = Vec::new();
        while let Ok(envelope) = receiver.try_recv() {
            drained.push(envelope);
        }
        drained
    }

    pub fn published_types(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|envelope| envelope.detail_type)
            .collect()
    }

    /// Order paid and cook assigned
    pub async fn place_order(&self, order_id: &str) -> DeliveryRecord {
        let payment = OrderBuilder::new().with_order_id(order_id).payment();
        self.orchestrator
            .handle(Trigger::PaymentConfirmed(payment))
            .await
            .expect("payment handled")
            .record
    }

    /// Paid, cooked and dispatched; ends `EN_CAMINO` with no token pending
    pub async fn advance_to_en_route(&self, order_id: &str) -> DeliveryRecord {
        self.place_order(order_id).await;

        let kitchen_token = format!("tok-kitchen-{order_id}");
        self.orchestrator
            .await_confirmation(order_id, AwaitedStep::FoodPreparation, &kitchen_token)
            .await
            .expect("kitchen token registered");
        self.orchestrator
            .handle(Trigger::FoodReady(food_ready(order_id, &kitchen_token)))
            .await
            .expect("food ready handled");

        let dispatch_token = format!("tok-dispatch-{order_id}");
        self.orchestrator
            .await_confirmation(order_id, AwaitedStep::Dispatch, &dispatch_token)
            .await
            .expect("dispatch token registered");
        self.orchestrator
            .handle(Trigger::Dispatched(dispatched(order_id, &dispatch_token)))
            .await
            .expect("dispatched handled")
            .record
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
