pub mod publisher;
pub mod types;

// Re-export key types for convenience
pub use publisher::{BroadcastEventBus, DeliveryEventPublisher, EventBus, EventEnvelope, PublishError};
pub use types::{
    ComidaPreparada, Despachado, Entregado, ErrorDelivery, ErrorKind, InboundEvent, OutboundEvent,
    PagoConfirmado, PedidoEnCamino, PedidoEnDespacho, PedidoEnPreparacion, PedidoEntregado,
};
