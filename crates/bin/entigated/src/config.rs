//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `entigate.toml` in the working directory, or at the path in
//! `ENTIGATE_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::path::PathBuf;

use serde::Deserialize;

/// Default config file name.
pub const DEFAULT_PATH: &str = "entigate.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Envelope bus settings.
    pub bus: BusConfig,
    /// Snapshot persistence settings.
    pub storage: StorageConfig,
    /// JSON-RPC endpoint settings.
    pub rpc: RpcConfig,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Envelope bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Envelopes buffered per subscriber before it starts lagging.
    pub capacity: usize,
}

/// Storage configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot loaded on start and written on shutdown. Nothing is
    /// written to disk when unset.
    pub snapshot: Option<PathBuf>,
}

/// JSON-RPC endpoint configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Serve line-delimited JSON-RPC on stdin/stdout.
    pub stdio: bool,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Enable the virtual plugin.
    pub virtual_enabled: bool,
    /// Plugin id the virtual plugin registers under.
    pub virtual_plugin_id: String,
    /// Send a demo command to the virtual light after start-up.
    pub demo: bool,
}

impl Config {
    /// Load configuration from `entigate.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ENTIGATE_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ENTIGATE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("ENTIGATE_BUS_CAPACITY")
            && let Ok(capacity) = val.parse()
        {
            self.bus.capacity = capacity;
        }
        if let Ok(val) = std::env::var("ENTIGATE_PLUGIN_ID") {
            self.integrations.virtual_plugin_id = val;
        }
        if let Ok(val) = std::env::var("ENTIGATE_SNAPSHOT") {
            self.storage.snapshot = Some(PathBuf::from(val));
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.capacity == 0 {
            return Err(ConfigError::Validation(
                "bus capacity must be non-zero".to_string(),
            ));
        }
        if self.integrations.virtual_enabled && self.integrations.virtual_plugin_id.is_empty() {
            return Err(ConfigError::Validation(
                "virtual plugin id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "entigated=info,entigate_app=info,entigate_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
            virtual_plugin_id: entigate_adapter_virtual::DEFAULT_PLUGIN_ID.to_string(),
            demo: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
