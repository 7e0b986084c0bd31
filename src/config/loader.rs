//! Configuration Loader
//!
//! Environment-aware configuration loading: environment detection, file discovery and
//! layered merging through the `config` crate.

use super::error::{ConfigResult, ConfigurationError};
use super::DeliveryConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base file name looked up in the configuration directory
pub const BASE_CONFIG_FILE: &str = "delivery.toml";

/// Prefix for environment variable overrides (`DELIVERY__SECTION__KEY`)
pub const ENV_PREFIX: &str = "DELIVERY";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: DeliveryConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            environment = environment,
            max_conflict_retries = config.orchestration.max_conflict_retries,
            signal_timeout_ms = config.orchestration.signal_timeout_ms,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: DeliveryConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON, for diagnostics output
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    /// Detect current environment: DELIVERY_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("DELIVERY_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `DELIVERY_CONFIG_DIR` if set, otherwise `./config`
    fn default_config_directory() -> PathBuf {
        env::var("DELIVERY_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    /// Merge files and environment overrides on top of the compiled-in defaults.
    /// Missing files are skipped; every struct carries `#[serde(default)]`.
    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<DeliveryConfig> {
        let base_file = config_directory.join(BASE_CONFIG_FILE);
        let env_file = config_directory.join(format!("{environment}.toml"));
        debug!(
            base = %base_file.display(),
            overrides = %env_file.display(),
            "Resolving configuration sources"
        );

        let merged = Config::builder()
            .add_source(File::from(base_file).format(FileFormat::Toml).required(false))
            .add_source(File::from(env_file).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        let config: DeliveryConfig = merged
            .try_deserialize()
            .map_err(ConfigurationError::deserialization_error)?;
        Ok(config)
    }
}
