//! Event payloads exchanged with the other services.
//!
//! Field names follow the platform's JSON contract (camelCase, Spanish domain terms).

use crate::constants::events;
use crate::error::{DeliveryError, DeliveryResult};
use crate::models::{Address, DeliveryRecord, OrderDetail, OrderItem};
use crate::state_machine::{OrderStatus, Role};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Error tag carried by `ErrorDelivery` so downstream systems can alert or retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AsignacionCocineroFallida,
    AsignacionDespachadorFallida,
    AsignacionRepartidorFallida,
    TimeoutEntrega,
    ErrorConfirmacionEntrega,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AsignacionCocineroFallida => "ASIGNACION_COCINERO_FALLIDA",
            Self::AsignacionDespachadorFallida => "ASIGNACION_DESPACHADOR_FALLIDA",
            Self::AsignacionRepartidorFallida => "ASIGNACION_REPARTIDOR_FALLIDA",
            Self::TimeoutEntrega => "TIMEOUT_ENTREGA",
            Self::ErrorConfirmacionEntrega => "ERROR_CONFIRMACION_ENTREGA",
        }
    }

    /// Kind reported when assigning `role` fails.
    pub fn for_assignment(role: Role) -> Self {
        match role {
            Role::Cook => Self::AsignacionCocineroFallida,
            Role::Dispatcher => Self::AsignacionDespachadorFallida,
            Role::Courier => Self::AsignacionRepartidorFallida,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Outbound
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedidoEnPreparacion {
    pub order_id: String,
    pub status: OrderStatus,
    pub cocinero_id: String,
    pub cocinero_nombre: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedidoEnDespacho {
    pub order_id: String,
    pub status: OrderStatus,
    pub despachador_id: String,
    pub despachador_nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cocinero_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedidoEnCamino {
    pub order_id: String,
    pub status: OrderStatus,
    pub repartidor_id: String,
    pub repartidor_nombre: String,
    pub vehiculo: String,
    pub estimated_delivery_time: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedidoEntregado {
    pub order_id: String,
    pub status: OrderStatus,
    pub repartidor_id: String,
    pub delivery_timestamp: DateTime<Utc>,
    pub confirmation_code: String,
    /// Minutes from order creation to delivery
    pub total_delivery_time: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDelivery {
    pub order_id: String,
    pub error_type: ErrorKind,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything this service emits on the event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    PedidoEnPreparacion(PedidoEnPreparacion),
    PedidoEnDespacho(PedidoEnDespacho),
    PedidoEnCamino(PedidoEnCamino),
    PedidoEntregado(PedidoEntregado),
    ErrorDelivery(ErrorDelivery),
}

impl OutboundEvent {
    pub fn detail_type(&self) -> &'static str {
        match self {
            Self::PedidoEnPreparacion(_) => events::PEDIDO_EN_PREPARACION,
            Self::PedidoEnDespacho(_) => events::PEDIDO_EN_DESPACHO,
            Self::PedidoEnCamino(_) => events::PEDIDO_EN_CAMINO,
            Self::PedidoEntregado(_) => events::PEDIDO_ENTREGADO,
            Self::ErrorDelivery(_) => events::ERROR_DELIVERY,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            Self::PedidoEnPreparacion(e) => &e.order_id,
            Self::PedidoEnDespacho(e) => &e.order_id,
            Self::PedidoEnCamino(e) => &e.order_id,
            Self::PedidoEntregado(e) => &e.order_id,
            Self::ErrorDelivery(e) => &e.order_id,
        }
    }

    /// JSON detail as published on the bus
    pub fn detail(&self) -> DeliveryResult<Value> {
        let value = match self {
            Self::PedidoEnPreparacion(e) => serde_json::to_value(e)?,
            Self::PedidoEnDespacho(e) => serde_json::to_value(e)?,
            Self::PedidoEnCamino(e) => serde_json::to_value(e)?,
            Self::PedidoEntregado(e) => serde_json::to_value(e)?,
            Self::ErrorDelivery(e) => serde_json::to_value(e)?,
        };
        Ok(value)
    }

    /// `PedidoEnPreparacion` for a record whose cook is assigned.
    pub fn in_preparation(record: &DeliveryRecord) -> DeliveryResult<Self> {
        let cook = required_slot(record, Role::Cook)?;
        Ok(Self::PedidoEnPreparacion(PedidoEnPreparacion {
            order_id: record.order_id.clone(),
            status: OrderStatus::Preparing,
            cocinero_id: cook.id.clone(),
            cocinero_nombre: cook.name.clone(),
            timestamp: Utc::now(),
        }))
    }

    pub fn in_dispatch(record: &DeliveryRecord) -> DeliveryResult<Self> {
        let dispatcher = required_slot(record, Role::Dispatcher)?;
        Ok(Self::PedidoEnDespacho(PedidoEnDespacho {
            order_id: record.order_id.clone(),
            status: OrderStatus::Dispatching,
            despachador_id: dispatcher.id.clone(),
            despachador_nombre: dispatcher.name.clone(),
            cocinero_id: record.cook.as_ref().map(|cook| cook.id.clone()),
            timestamp: Utc::now(),
        }))
    }

    pub fn en_route(record: &DeliveryRecord) -> DeliveryResult<Self> {
        let courier = required_slot(record, Role::Courier)?;
        Ok(Self::PedidoEnCamino(PedidoEnCamino {
            order_id: record.order_id.clone(),
            status: OrderStatus::EnRoute,
            repartidor_id: courier.id.clone(),
            repartidor_nombre: courier.name.clone(),
            vehiculo: courier.vehicle.clone().unwrap_or_default(),
            estimated_delivery_time: courier.estimated_minutes.unwrap_or_default(),
            timestamp: Utc::now(),
        }))
    }

    /// `PedidoEntregado` with the real elapsed delivery time.
    pub fn delivered(record: &DeliveryRecord) -> DeliveryResult<Self> {
        let courier = required_slot(record, Role::Courier)?;
        let delivered_at = record.delivered_at.ok_or_else(|| {
            DeliveryError::InvalidEvent(format!("order {} has no delivery time", record.order_id))
        })?;
        Ok(Self::PedidoEntregado(PedidoEntregado {
            order_id: record.order_id.clone(),
            status: OrderStatus::Delivered,
            repartidor_id: courier.id.clone(),
            delivery_timestamp: delivered_at,
            confirmation_code: record.confirmation_code.clone().unwrap_or_default(),
            total_delivery_time: record.elapsed_minutes(delivered_at),
            timestamp: Utc::now(),
        }))
    }

    pub fn error(order_id: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::ErrorDelivery(ErrorDelivery {
            order_id: order_id.to_string(),
            error_type: kind,
            error_message: message.into(),
            timestamp: Utc::now(),
        })
    }
}

fn required_slot(record: &DeliveryRecord, role: Role) -> DeliveryResult<&crate::models::AssignedActor> {
    record.slot(role).ok_or_else(|| {
        DeliveryError::InvalidEvent(format!("order {} has no {role} assigned", record.order_id))
    })
}

// ============================================
// Inbound
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagoConfirmado {
    pub order_id: String,
    pub restaurant_id: String,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub delivery_address: Address,
    pub total_amount: f64,
    pub payment_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl PagoConfirmado {
    pub fn into_order_detail(self) -> OrderDetail {
        OrderDetail {
            order_id: self.order_id,
            restaurant_id: self.restaurant_id,
            customer_id: self.customer_id,
            items: self.items,
            delivery_address: self.delivery_address,
            total_amount: self.total_amount,
            created_at: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComidaPreparada {
    pub order_id: String,
    pub cocinero_id: String,
    pub task_token: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Despachado {
    pub order_id: String,
    pub despachador_id: String,
    pub task_token: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entregado {
    pub order_id: String,
    pub repartidor_id: String,
    pub task_token: String,
    pub confirmation_code: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Events consumed from the bus, keyed by their detail type.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    PagoConfirmado(PagoConfirmado),
    ComidaPreparada(ComidaPreparada),
    Despachado(Despachado),
    Entregado(Entregado),
}

impl InboundEvent {
    /// Decode and shape-check an inbound event.
    pub fn parse(detail_type: &str, detail: Value) -> DeliveryResult<Self> {
        let event = match detail_type {
            events::PAGO_CONFIRMADO => Self::PagoConfirmado(decode(detail_type, detail)?),
            events::COMIDA_PREPARADA => Self::ComidaPreparada(decode(detail_type, detail)?),
            events::DESPACHADO => Self::Despachado(decode(detail_type, detail)?),
            events::ENTREGADO => Self::Entregado(decode(detail_type, detail)?),
            other => {
                return Err(DeliveryError::InvalidEvent(format!(
                    "unsupported event type: {other}"
                )))
            }
        };
        event.validate()?;
        Ok(event)
    }

    pub fn detail_type(&self) -> &'static str {
        match self {
            Self::PagoConfirmado(_) => events::PAGO_CONFIRMADO,
            Self::ComidaPreparada(_) => events::COMIDA_PREPARADA,
            Self::Despachado(_) => events::DESPACHADO,
            Self::Entregado(_) => events::ENTREGADO,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            Self::PagoConfirmado(e) => &e.order_id,
            Self::ComidaPreparada(e) => &e.order_id,
            Self::Despachado(e) => &e.order_id,
            Self::Entregado(e) => &e.order_id,
        }
    }

    pub fn validate(&self) -> DeliveryResult<()> {
        require(self.detail_type(), "orderId", self.order_id())?;
        match self {
            Self::PagoConfirmado(e) => {
                require(self.detail_type(), "restaurantId", &e.restaurant_id)?;
                if e.items.is_empty() {
                    return Err(DeliveryError::InvalidEvent(format!(
                        "{}: items must not be empty",
                        self.detail_type()
                    )));
                }
                Ok(())
            }
            Self::ComidaPreparada(e) => require(self.detail_type(), "taskToken", &e.task_token),
            Self::Despachado(e) => require(self.detail_type(), "taskToken", &e.task_token),
            Self::Entregado(e) => {
                require(self.detail_type(), "taskToken", &e.task_token)?;
                require(self.detail_type(), "confirmationCode", &e.confirmation_code)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(detail_type: &str, detail: Value) -> DeliveryResult<T> {
    serde_json::from_value(detail)
        .map_err(|e| DeliveryError::InvalidEvent(format!("{detail_type}: {e}")))
}

fn require(detail_type: &str, field: &str, value: &str) -> DeliveryResult<()> {
    if value.trim().is_empty() {
        return Err(DeliveryError::InvalidEvent(format!(
            "{detail_type}: {field} is required"
        )));
    }
    Ok(())
}
