use std::env;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const RATE_DIVISOR_ENV_VAR: &str = "UNCAP_RATE_DIVISOR";
pub const CONFIG_PATH_ENV_VAR: &str = "UNCAP_CONFIG";

pub const DEFAULT_LOGIC_HZ: u32 = 60;
pub const DEFAULT_RUNAWAY_CEILING_TICKS: f64 = 4.0;
pub const DEFAULT_SETTLE_TICKS: i32 = 2;
/// Fewer settle ticks would let an entry interpolate before it holds two
/// captured snapshots.
pub const MIN_SETTLE_TICKS: i32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rate divisor must be at least 1 and fit in 32 bits, got {value}")]
    InvalidRateDivisor { value: i64 },
    #[error("logic rate must be non-zero")]
    InvalidLogicRate,
    #[error("runaway ceiling must be a finite tick count above 1.0, got {value}")]
    InvalidRunawayCeiling { value: f64 },
    #[error("settle ticks must be at least 2, got {value}")]
    InvalidSettleTicks { value: i32 },
    #[error("metrics log interval must be non-zero")]
    InvalidMetricsInterval,
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path} at {field_path}: {message}")]
    Parse {
        path: String,
        field_path: String,
        message: String,
    },
}

/// Number of render callbacks per full-speed logic tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct RateDivisor(NonZeroU32);

impl RateDivisor {
    pub const NATIVE: Self = Self(NonZeroU32::MIN);

    pub fn new(value: i64) -> Result<Self, ConfigError> {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(ConfigError::InvalidRateDivisor { value })
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for RateDivisor {
    fn default() -> Self {
        Self::NATIVE
    }
}

impl TryFrom<i64> for RateDivisor {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RateDivisor> for u32 {
    fn from(value: RateDivisor) -> Self {
        value.get()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UncapConfig {
    pub logic_hz: u32,
    pub rate_divisor: RateDivisor,
    pub runaway_ceiling_ticks: f64,
    pub settle_ticks: i32,
    pub metrics_log_interval_ms: u64,
    pub restore_native_rate_after_events: bool,
}

impl Default for UncapConfig {
    fn default() -> Self {
        Self {
            logic_hz: DEFAULT_LOGIC_HZ,
            rate_divisor: RateDivisor::NATIVE,
            runaway_ceiling_ticks: DEFAULT_RUNAWAY_CEILING_TICKS,
            settle_ticks: DEFAULT_SETTLE_TICKS,
            metrics_log_interval_ms: 1000,
            restore_native_rate_after_events: true,
        }
    }
}

impl UncapConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(raw, "<inline>")
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    /// Loads the file named by `UNCAP_CONFIG` when set, defaults otherwise,
    /// then applies the `UNCAP_RATE_DIVISOR` override and validates.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var_os(CONFIG_PATH_ENV_VAR) {
            Some(path) => Self::load_from_path(Path::new(&path))?,
            None => Self::default(),
        };
        config.rate_divisor = resolve_rate_divisor(config.rate_divisor);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logic_hz == 0 {
            return Err(ConfigError::InvalidLogicRate);
        }
        if !self.runaway_ceiling_ticks.is_finite() || self.runaway_ceiling_ticks <= 1.0 {
            return Err(ConfigError::InvalidRunawayCeiling {
                value: self.runaway_ceiling_ticks,
            });
        }
        if self.settle_ticks < MIN_SETTLE_TICKS {
            return Err(ConfigError::InvalidSettleTicks {
                value: self.settle_ticks,
            });
        }
        if self.metrics_log_interval_ms == 0 {
            return Err(ConfigError::InvalidMetricsInterval);
        }
        Ok(())
    }

    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_log_interval_ms)
    }

    fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: Self =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
                let field_path = error.path().to_string();
                ConfigError::Parse {
                    path: origin.to_string(),
                    field_path,
                    message: error.into_inner().to_string(),
                }
            })?;
        config.validate()?;
        Ok(config)
    }
}

fn resolve_rate_divisor(config_value: RateDivisor) -> RateDivisor {
    rate_divisor_from_env_value(env::var(RATE_DIVISOR_ENV_VAR), config_value)
}

fn rate_divisor_from_env_value(
    value: Result<String, env::VarError>,
    config_value: RateDivisor,
) -> RateDivisor {
    match value {
        Ok(value) => match value.trim().parse::<i64>().map(RateDivisor::new) {
            Ok(Ok(divisor)) => divisor,
            _ => {
                warn!(
                    env_var = RATE_DIVISOR_ENV_VAR,
                    value = value.as_str(),
                    "invalid rate divisor env var value; falling back to config"
                );
                config_value
            }
        },
        Err(env::VarError::NotPresent) => config_value,
        Err(err) => {
            warn!(
                env_var = RATE_DIVISOR_ENV_VAR,
                error = %err,
                "unable to read rate divisor env var; falling back to config"
            );
            config_value
        }
    }
}
