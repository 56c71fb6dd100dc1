use crate::trajectory::TrajectorySampling;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration for the log index service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Log file configuration
    pub database: DatabaseConfig,
    /// Scenario enumeration configuration
    #[serde(default)]
    pub scenarios: ScenarioConfig,
    /// Future trajectory sampling
    #[serde(default)]
    pub trajectory: TrajectoryConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus exporter port, disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Log file (SQLite) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the log file
    pub log_path: String,
    /// Maximum number of concurrent reader connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of idle reader connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

/// Scenario enumeration configuration.
///
/// Unset filters impose no restriction.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    /// Allowed seed frame tokens (hex)
    #[serde(default)]
    pub tokens: Option<Vec<String>>,
    /// Allowed scenario types
    #[serde(default)]
    pub types: Option<Vec<String>>,
    /// Allowed map names
    #[serde(default)]
    pub map_names: Option<Vec<String>>,
    /// Keep seeds whose scene has no resolvable mission goal
    #[serde(default = "default_true")]
    pub include_invalid_mission_goals: bool,
    /// Per scenario type extraction settings
    #[serde(default)]
    pub extraction: HashMap<String, ExtractionSettings>,
}

/// How to cut a scenario window around its seed frame
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExtractionSettings {
    /// Window length in seconds
    pub duration_s: f64,
    /// Window start relative to the seed, in seconds
    #[serde(default)]
    pub offset_s: f64,
    /// Fraction of frames kept, in (0, 1]
    #[serde(default = "default_subsample_ratio")]
    pub subsample_ratio: f64,
}

/// Future trajectory sampling; any two of the three values are enough
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrajectoryConfig {
    #[serde(default)]
    pub num_poses: Option<usize>,
    #[serde(default)]
    pub time_horizon_s: Option<f64>,
    #[serde(default)]
    pub interval_s: Option<f64>,
}

// Default value functions
fn default_service_name() -> String {
    "log-index".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_subsample_ratio() -> f64 {
    1.0
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "log-index")?
            .set_default("service.log_level", "info")?
            // Add config file if present
            .add_source(config::File::with_name("config/log_index").required(false))
            .add_source(config::File::with_name("/etc/log_index/config").required(false))
            // Override with environment variables
            // LOG_INDEX__DATABASE__LOG_PATH -> database.log_path
            .add_source(
                config::Environment::with_prefix("LOG_INDEX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialization alone cannot catch
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.log_path.trim().is_empty() {
            return Err(ConfigValidationError::MissingField(
                "database.log_path".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "database.max_connections".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue {
                field: "database.min_connections".to_string(),
                message: format!(
                    "{} exceeds max_connections {}",
                    self.database.min_connections, self.database.max_connections
                ),
            });
        }

        for (name, settings) in &self.scenarios.extraction {
            if !(settings.duration_s > 0.0) {
                return Err(ConfigValidationError::InvalidValue {
                    field: format!("scenarios.extraction.{name}.duration_s"),
                    message: format!("must be positive, got {}", settings.duration_s),
                });
            }
            if !(settings.subsample_ratio > 0.0 && settings.subsample_ratio <= 1.0) {
                return Err(ConfigValidationError::InvalidValue {
                    field: format!("scenarios.extraction.{name}.subsample_ratio"),
                    message: format!("must be in (0, 1], got {}", settings.subsample_ratio),
                });
            }
        }

        if self.trajectory.is_set() {
            TrajectorySampling::try_from(&self.trajectory).map_err(|e| {
                ConfigValidationError::InvalidValue {
                    field: "trajectory".to_string(),
                    message: e.to_string(),
                }
            })?;
        }

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            tokens: None,
            types: None,
            map_names: None,
            include_invalid_mission_goals: true,
            extraction: HashMap::new(),
        }
    }
}

impl TrajectoryConfig {
    /// Whether any sampling value was configured
    pub fn is_set(&self) -> bool {
        self.num_poses.is_some() || self.time_horizon_s.is_some() || self.interval_s.is_some()
    }
}

impl DatabaseConfig {
    /// Reader pool settings for a local log file
    pub fn for_path(log_path: impl Into<String>) -> Self {
        Self {
            log_path: log_path.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }

    /// Get connection acquire timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get idle connection timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
