pub mod delivery_record;
pub mod order_detail;
pub mod status_view;
pub mod subscriber;

// Re-export core models for easy access
pub use delivery_record::{
    ActorProfile, AssignedActor, DeliveryRecord, PendingCallback, StatusHistoryEntry,
};
pub use order_detail::{Address, Coordinates, OrderDetail, OrderItem};
pub use status_view::DeliveryStatusView;
pub use subscriber::Subscriber;
