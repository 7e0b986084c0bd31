//! # Notification Fanout
//!
//! Live status pushes to the connections watching a restaurant. Subscribers are kept in
//! a [`RecordStore`](crate::store::RecordStore) indexed by tenant; every broadcast works
//! on a snapshot of that index, sends to each connection concurrently and evicts the ones
//! the transport reports as gone.

pub mod fanout;
pub mod transport;

pub use fanout::{BroadcastSummary, NotificationFanout, StatusUpdateMessage, SubscriberStore};
pub use transport::{ChannelTransport, SubscriberTransport, TransportError};
