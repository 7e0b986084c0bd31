#![allow(clippy::doc_markdown)] // Allow Spanish domain terms and wire names in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Delivery Orchestrator
//!
//! Coordination core for the delivery leg of a food-ordering platform.
//!
//! ## Overview
//!
//! Every paid order becomes a delivery record that moves through a fixed lifecycle:
//! `RECIBIDO → EN_PREPARACION → EN_DESPACHO → EN_CAMINO → ENTREGADO`, with `CANCELADO`
//! and `FALLIDO` reachable from any non-terminal status. A cook, a dispatcher and a
//! courier are assigned along the way. An external workflow engine runs the
//! multi-step process and parks on opaque callback tokens; this crate hands those tokens
//! back exactly once when the matching confirmation arrives.
//!
//! ## Architecture
//!
//! All state lives behind ports, so the core runs unchanged on any storage engine,
//! workflow engine, event bus or push transport:
//!
//! - [`store`] - durable record store port with optimistic concurrency
//! - [`workflow`] - workflow-engine signal port
//! - [`events`] - event bus port, inbound and outbound payloads
//! - [`notifications`] - subscriber transport port and tenant fanout
//!
//! On top of those:
//!
//! - [`state_machine`] - per-order status machine; every change is one conditional write
//! - [`callbacks`] - at most one outstanding confirmation token per order
//! - [`services`] - actor assignment policy
//! - [`orchestration`] - trigger handling, confirmation and timeout entry points
//! - [`config`], [`logging`], [`error`], [`constants`] - ambient plumbing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use delivery_orchestrator::config::ConfigManager;
//! use delivery_orchestrator::orchestration::bootstrap_in_process;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let (orchestrator, _handles) = bootstrap_in_process(&manager)?;
//!
//! let outcome = orchestrator
//!     .handle_inbound(
//!         "PagoConfirmado",
//!         json!({
//!             "orderId": "ORD-1",
//!             "restaurantId": "REST-1",
//!             "customerId": "CUST-1",
//!             "items": [{"productId": "P-1", "name": "Ceviche", "quantity": 1, "price": 32.0}],
//!             "deliveryAddress": {"street": "Av. Larco 101", "city": "Lima", "postalCode": "15074"},
//!             "totalAmount": 32.0,
//!             "paymentId": "PAY-1"
//!         }),
//!     )
//!     .await?;
//! println!("order {} is {}", outcome.record.order_id, outcome.record.status);
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod orchestration;
pub mod services;
pub mod state_machine;
pub mod store;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use callbacks::{AwaitedStep, CallbackTokenRegistry, TokenExpectation};
pub use config::{ConfigManager, DeliveryConfig};
pub use error::{DeliveryError, DeliveryResult};
pub use events::{DeliveryEventPublisher, ErrorKind, InboundEvent, OutboundEvent};
pub use models::{ActorProfile, DeliveryRecord, DeliveryStatusView, OrderDetail, Subscriber};
pub use notifications::{BroadcastSummary, NotificationFanout};
pub use orchestration::{
    ConfirmationReceipt, ConfirmationRequest, DeliveryOrchestrator, Trigger, TriggerKind,
};
pub use services::{AssignmentResolver, RosterAssignmentResolver};
pub use state_machine::{OrderStateMachine, OrderStatus, Role};
pub use store::{InMemoryRecordStore, RecordStore, StoreError, Versioned};
pub use workflow::{InProcessWorkflowEngine, WorkflowSignal};
