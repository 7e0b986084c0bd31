// Order state machine
//
// Status definitions, pure guards and record mutations, and the conditional-write
// persistence cycle every lifecycle change goes through.

pub mod actions;
pub mod guards;
pub mod order_state_machine;
pub mod persistence;
pub mod states;

// Re-export main types for convenient access
pub use order_state_machine::OrderStateMachine;
pub use persistence::{retry_on_conflict, DeliveryRecordPersistence, DeliveryStore, RecordChange};
pub use states::{OrderStatus, Role};
