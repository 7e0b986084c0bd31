//! # Orchestrator Bootstrap
//!
//! Wires a [`DeliveryOrchestrator`] from configuration and a set of port adapters.
//! Production deployments pass their own store, workflow engine, event bus and
//! transport; [`DeliveryAdapters::in_process`] provides the in-memory set used by tests
//! and local runs.

use super::orchestrator::DeliveryOrchestrator;
use crate::callbacks::CallbackTokenRegistry;
use crate::config::{ConfigManager, DeliveryConfig};
use crate::error::DeliveryResult;
use crate::events::{BroadcastEventBus, DeliveryEventPublisher, EventBus};
use crate::notifications::{ChannelTransport, NotificationFanout, SubscriberStore, SubscriberTransport};
use crate::services::{AssignmentResolver, RosterAssignmentResolver};
use crate::state_machine::{DeliveryStore, OrderStateMachine};
use crate::store::InMemoryRecordStore;
use crate::workflow::{InProcessWorkflowEngine, WorkflowSignal};
use std::sync::Arc;
use tracing::info;

/// Everything the orchestrator talks to
#[derive(Clone)]
pub struct DeliveryAdapters {
    pub records: DeliveryStore,
    pub subscribers: SubscriberStore,
    pub workflow: Arc<dyn WorkflowSignal>,
    pub event_bus: Arc<dyn EventBus>,
    pub transport: Arc<dyn SubscriberTransport>,
    pub resolver: Arc<dyn AssignmentResolver>,
}

/// Concrete handles to the in-process adapters, for inspection
#[derive(Clone)]
pub struct InProcessHandles {
    pub workflow: InProcessWorkflowEngine,
    pub event_bus: BroadcastEventBus,
    pub transport: ChannelTransport,
}

impl DeliveryAdapters {
    pub fn in_process(config: &DeliveryConfig) -> (Self, InProcessHandles) {
        let handles = InProcessHandles {
            workflow: InProcessWorkflowEngine::new(),
            event_bus: BroadcastEventBus::new(config.event_bus.buffer_size),
            transport: ChannelTransport::new(),
        };
        let adapters = Self {
            records: Arc::new(InMemoryRecordStore::new()),
            subscribers: Arc::new(InMemoryRecordStore::new()),
            workflow: Arc::new(handles.workflow.clone()),
            event_bus: Arc::new(handles.event_bus.clone()),
            transport: Arc::new(handles.transport.clone()),
            resolver: Arc::new(RosterAssignmentResolver::new(config.roster.clone())),
        };
        (adapters, handles)
    }
}

/// Build an orchestrator from an already validated configuration
pub fn build_orchestrator(config: &DeliveryConfig, adapters: DeliveryAdapters) -> DeliveryOrchestrator {
    let retries = config.orchestration.max_conflict_retries;
    let state_machine = OrderStateMachine::new(adapters.records, retries);
    let callbacks = CallbackTokenRegistry::new(
        state_machine.persistence().clone(),
        adapters.workflow,
        config.orchestration.signal_timeout(),
        retries,
    );
    let publisher = DeliveryEventPublisher::new(adapters.event_bus, &config.service);
    let fanout = NotificationFanout::new(adapters.subscribers, adapters.transport, &config.notifications);

    DeliveryOrchestrator::new(state_machine, callbacks, adapters.resolver, publisher, fanout)
}

/// Validate the managed configuration and wire the orchestrator over `adapters`
pub fn bootstrap(
    config_manager: &ConfigManager,
    adapters: DeliveryAdapters,
) -> DeliveryResult<DeliveryOrchestrator> {
    let config = config_manager.config();
    config.validate()?;
    info!(
        environment = %config_manager.environment(),
        service = %config.service.name,
        "delivery orchestrator bootstrapped"
    );
    Ok(build_orchestrator(config, adapters))
}

/// Same as [`bootstrap`] with the in-process adapters
pub fn bootstrap_in_process(
    config_manager: &ConfigManager,
) -> DeliveryResult<(DeliveryOrchestrator, InProcessHandles)> {
    let (adapters, handles) = DeliveryAdapters::in_process(config_manager.config());
    let orchestrator = bootstrap(config_manager, adapters)?;
    Ok((orchestrator, handles))
}
