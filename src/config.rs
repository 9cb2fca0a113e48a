//! Service configuration
//!
//! Loaded from YAML (every field optional) and then overridden by
//! environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BOY_OR_GIRL_BIND_ADDR` | `server.bind_addr` |
//! | `BOY_OR_GIRL_SESSION_TTL_SECS` | `server.session_ttl_secs` |
//! | `BOY_OR_GIRL_MODEL_DIR` | `model.artifact_dir` |
//! | `BOY_OR_GIRL_MODEL_VERSION` | `model.version` |
//! | `BOY_OR_GIRL_PREDICTOR_TIMEOUT_MS` | `predictor.timeout_ms` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Config file used when none is given explicitly
pub const DEFAULT_CONFIG_PATH: &str = "config/boy_or_girl.yaml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub predictor: PredictorConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Idle time after which a session is dropped
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8050".to_string(),
            session_ttl_secs: 30 * 60,
        }
    }
}

impl ServerConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// How often idle sessions are swept: the TTL, at most once a minute
    pub fn session_sweep_interval(&self) -> Duration {
        self.session_ttl().min(Duration::from_secs(60))
    }
}

/// Location of the versioned model artifact
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub artifact_dir: PathBuf,
    pub version: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            version: "1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub timeout_ms: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl PredictorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Parse a YAML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw, path)
    }

    fn from_yaml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config: an explicit path must exist; the default path is optional
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => {
                tracing::debug!("No config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BOY_OR_GIRL_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("BOY_OR_GIRL_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(secs) = lookup("BOY_OR_GIRL_SESSION_TTL_SECS") {
            self.server.session_ttl_secs = secs.parse().map_err(|_| ConfigError::Invalid {
                key: "BOY_OR_GIRL_SESSION_TTL_SECS".to_string(),
                reason: format!("'{}' is not a number of seconds", secs),
            })?;
        }
        if let Some(dir) = lookup("BOY_OR_GIRL_MODEL_DIR") {
            self.model.artifact_dir = PathBuf::from(dir);
        }
        if let Some(version) = lookup("BOY_OR_GIRL_MODEL_VERSION") {
            self.model.version = version;
        }
        if let Some(ms) = lookup("BOY_OR_GIRL_PREDICTOR_TIMEOUT_MS") {
            self.predictor.timeout_ms = ms.parse().map_err(|_| ConfigError::Invalid {
                key: "BOY_OR_GIRL_PREDICTOR_TIMEOUT_MS".to_string(),
                reason: format!("'{}' is not a number of milliseconds", ms),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.predictor.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "predictor.timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.server.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "server.session_ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.model.version.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "model.version".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.server.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "server.bind_addr".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
