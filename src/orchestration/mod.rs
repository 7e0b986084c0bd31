//! # Orchestration
//!
//! The lifecycle driver sitting on top of the state machine, the callback registry, the
//! assignment resolver, the event publisher and the notification fanout.
//!
//! - [`DeliveryOrchestrator`]: handles the five trigger kinds plus the confirmation and
//!   timeout entry points
//! - [`bootstrap`]: wiring from configuration and port adapters

pub mod bootstrap;
pub mod orchestrator;
pub mod types;

pub use bootstrap::{
    bootstrap, bootstrap_in_process, build_orchestrator, DeliveryAdapters, InProcessHandles,
};
pub use orchestrator::DeliveryOrchestrator;
pub use types::{
    ConfirmationReceipt, ConfirmationRequest, DirectConfirmation, Trigger, TriggerKind,
    TriggerOutcome,
};
