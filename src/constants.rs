//! # System Constants
//!
//! Event names, sources and index names shared by the delivery core and the
//! services it talks to. The string values are part of the wire contract with the
//! other microservices and must not change.

/// Event types exchanged on the event bus
pub mod events {
    // Inbound
    pub const PAGO_CONFIRMADO: &str = "PagoConfirmado";
    pub const COMIDA_PREPARADA: &str = "ComidaPreparada";
    pub const DESPACHADO: &str = "Despachado";
    pub const ENTREGADO: &str = "Entregado";

    // Outbound
    pub const PEDIDO_EN_PREPARACION: &str = "PedidoEnPreparacion";
    pub const PEDIDO_EN_DESPACHO: &str = "PedidoEnDespacho";
    pub const PEDIDO_EN_CAMINO: &str = "PedidoEnCamino";
    pub const PEDIDO_ENTREGADO: &str = "PedidoEntregado";
    pub const ERROR_DELIVERY: &str = "ErrorDelivery";

    pub const INBOUND: &[&str] = &[PAGO_CONFIRMADO, COMIDA_PREPARADA, DESPACHADO, ENTREGADO];
}

/// Event sources
pub mod sources {
    pub const DELIVERY: &str = "delivery.service";
    pub const ORDERS: &str = "orders.service";
    pub const KITCHEN: &str = "kitchen.service";
    pub const DISPATCH: &str = "dispatch.service";
}

/// Secondary index names understood by record stores
pub mod indexes {
    pub const RESTAURANT_ID: &str = "restaurantId";
    pub const STATUS: &str = "status";
    pub const TENANT_ID: &str = "tenantId";
}

pub mod system {
    pub const EVENT_BUS_NAME: &str = "delivery-event-bus";

    /// `type` field of push messages sent to subscribers.
    pub const ORDER_STATUS_UPDATE: &str = "ORDER_STATUS_UPDATE";

    /// Error kind reported to the workflow engine when a pending step is cancelled.
    pub const DELIVERY_CANCELLED: &str = "DeliveryCancelled";

    /// Error kind reported when an order is failed while a step is still pending.
    pub const DELIVERY_FAILED: &str = "DeliveryFailed";

    pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
    pub const DEFAULT_SIGNAL_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 3_000;
    pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1_000;
}
