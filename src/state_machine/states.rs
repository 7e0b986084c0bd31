use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an order moving through kitchen, dispatch and courier.
///
/// Serialized with the wire names used by the rest of the platform. English names are
/// accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Payment confirmed, record created
    #[serde(rename = "RECIBIDO", alias = "RECEIVED")]
    Received,
    /// A cook is preparing the food
    #[serde(rename = "EN_PREPARACION", alias = "PREPARING")]
    Preparing,
    /// A dispatcher is packing the order
    #[serde(rename = "EN_DESPACHO", alias = "DISPATCHING")]
    Dispatching,
    /// A courier is on the way
    #[serde(rename = "EN_CAMINO", alias = "EN_ROUTE")]
    EnRoute,
    /// Handed to the customer
    #[serde(rename = "ENTREGADO", alias = "DELIVERED")]
    Delivered,
    /// Cancelled before delivery
    #[serde(rename = "CANCELADO", alias = "CANCELLED")]
    Cancelled,
    /// Abandoned after an unrecoverable error
    #[serde(rename = "FALLIDO", alias = "FAILED")]
    Failed,
}

impl OrderStatus {
    /// Happy-path order, used by property tests and diagnostics.
    pub const HAPPY_PATH: [OrderStatus; 5] = [
        Self::Received,
        Self::Preparing,
        Self::Dispatching,
        Self::EnRoute,
        Self::Delivered,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Failed)
    }

    /// Next status on the happy path, if any.
    pub fn successor(&self) -> Option<OrderStatus> {
        match self {
            Self::Received => Some(Self::Preparing),
            Self::Preparing => Some(Self::Dispatching),
            Self::Dispatching => Some(Self::EnRoute),
            Self::EnRoute => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled | Self::Failed => None,
        }
    }

    /// The linear successor, or `CANCELLED`/`FAILED` from any non-terminal status.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(target, Self::Cancelled | Self::Failed) || self.successor() == Some(target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECIBIDO",
            Self::Preparing => "EN_PREPARACION",
            Self::Dispatching => "EN_DESPACHO",
            Self::EnRoute => "EN_CAMINO",
            Self::Delivered => "ENTREGADO",
            Self::Cancelled => "CANCELADO",
            Self::Failed => "FALLIDO",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECIBIDO" | "RECEIVED" => Ok(Self::Received),
            "EN_PREPARACION" | "PREPARING" => Ok(Self::Preparing),
            "EN_DESPACHO" | "DISPATCHING" => Ok(Self::Dispatching),
            "EN_CAMINO" | "EN_ROUTE" => Ok(Self::EnRoute),
            "ENTREGADO" | "DELIVERED" => Ok(Self::Delivered),
            "CANCELADO" | "CANCELLED" => Ok(Self::Cancelled),
            "FALLIDO" | "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid order status: {s}")),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Received
    }
}

/// Actor roles that can be assigned to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cook,
    Dispatcher,
    Courier,
}

impl Role {
    /// Status the order moves to when this role is assigned.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            Self::Cook => OrderStatus::Preparing,
            Self::Dispatcher => OrderStatus::Dispatching,
            Self::Courier => OrderStatus::EnRoute,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cook => write!(f, "cook"),
            Self::Dispatcher => write!(f, "dispatcher"),
            Self::Courier => write!(f, "courier"),
        }
    }
}
