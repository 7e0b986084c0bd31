//! # Delivery Configuration System
//!
//! Layered configuration for the delivery core, built on the `config` crate.
//!
//! ## Sources (later wins)
//!
//! 1. Compiled-in defaults ([`DeliveryConfig::default`])
//! 2. `<config_dir>/delivery.toml` (optional)
//! 3. `<config_dir>/<environment>.toml` (optional)
//! 4. Environment variables prefixed `DELIVERY__`, nested with `__`
//!    (e.g. `DELIVERY__ORCHESTRATION__MAX_CONFLICT_RETRIES=5`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use delivery_orchestrator::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let retries = manager.config().orchestration.max_conflict_retries;
//! let timeout = manager.config().orchestration.signal_timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{sources, system};
use crate::models::ActorProfile;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{ConfigManager, BASE_CONFIG_FILE, ENV_PREFIX};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub service: ServiceConfig,
    pub orchestration: OrchestrationConfig,
    pub notifications: NotificationConfig,
    pub event_bus: EventBusConfig,
    pub logging: LoggingConfig,
    pub roster: RosterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    /// `source` stamped on every outbound event
    pub event_source: String,
    pub event_bus_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "delivery-orchestrator".to_string(),
            event_source: sources::DELIVERY.to_string(),
            event_bus_name: system::EVENT_BUS_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Total attempts for a read/transition/write cycle that keeps losing races
    pub max_conflict_retries: u32,
    /// Upper bound on a single workflow-engine signal call
    pub signal_timeout_ms: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: system::DEFAULT_MAX_CONFLICT_RETRIES,
            signal_timeout_ms: system::DEFAULT_SIGNAL_TIMEOUT_MS,
        }
    }
}

impl OrchestrationConfig {
    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Upper bound on a single subscriber send
    pub send_timeout_ms: u64,
    pub message_type: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: system::DEFAULT_SEND_TIMEOUT_MS,
            message_type: system::ORDER_STATUS_UPDATE.to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    pub buffer_size: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            buffer_size: system::DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Static staff rosters used by the placeholder assignment policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub cooks: Vec<ActorProfile>,
    pub dispatchers: Vec<ActorProfile>,
    pub couriers: Vec<ActorProfile>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            cooks: vec![
                ActorProfile::new("COC-001", "Juan Pérez"),
                ActorProfile::new("COC-002", "María García"),
                ActorProfile::new("COC-003", "Pedro López"),
            ],
            dispatchers: vec![
                ActorProfile::new("DES-001", "Carlos Ruiz"),
                ActorProfile::new("DES-002", "Ana Martínez"),
            ],
            couriers: vec![
                ActorProfile::courier("REP-001", "Luis Torres", "Moto", 30),
                ActorProfile::courier("REP-002", "Sofia Mendez", "Bicicleta", 25),
            ],
        }
    }
}

impl DeliveryConfig {
    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        if self.service.event_source.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "event_source",
                "service",
            ));
        }

        if self.orchestration.max_conflict_retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.max_conflict_retries",
                "0",
                "at least one attempt is required",
            ));
        }

        if self.orchestration.signal_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.signal_timeout_ms",
                "0",
                "signal timeout must be positive",
            ));
        }

        if self.notifications.send_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "notifications.send_timeout_ms",
                "0",
                "send timeout must be positive",
            ));
        }

        if self.event_bus.buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "event_bus.buffer_size",
                "0",
                "buffer size must be positive",
            ));
        }

        for (field, roster) in [
            ("roster.cooks", &self.roster.cooks),
            ("roster.dispatchers", &self.roster.dispatchers),
            ("roster.couriers", &self.roster.couriers),
        ] {
            if roster.is_empty() {
                return Err(ConfigurationError::invalid_value(
                    field,
                    "[]",
                    "roster must not be empty",
                ));
            }
        }

        if let Some(courier) = self.roster.couriers.iter().find(|c| c.vehicle.is_none()) {
            return Err(ConfigurationError::missing_required_field(
                "vehicle",
                format!("roster.couriers entry {}", courier.id),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeliveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestration.max_conflict_retries, 3);
        assert_eq!(config.service.event_bus_name, "delivery-event-bus");
        assert_eq!(config.roster.cooks.len(), 3);
        assert_eq!(config.roster.couriers[1].vehicle.as_deref(), Some("Bicicleta"));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = DeliveryConfig::default();
        config.orchestration.signal_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));

        let mut config = DeliveryConfig::default();
        config.roster.dispatchers.clear();
        assert!(config.validate().is_err());

        let mut config = DeliveryConfig::default();
        config.roster.couriers.push(ActorProfile::new("REP-9", "Sin Vehiculo"));
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));
    }
}
