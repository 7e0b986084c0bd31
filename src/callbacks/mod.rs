//! # Callback Token Registry
//!
//! At most one external confirmation is outstanding per order. Registering parks the
//! order on a workflow-engine token; resolving or cancelling consumes the token exactly
//! once and signals the engine.

pub mod registry;
pub mod types;

pub use registry::CallbackTokenRegistry;
pub use types::{AwaitedStep, CallbackOutcome, Settlement, SignalOutcome, Termination, TokenExpectation};
