//! Configuration module for faultline.
//!
//! Two sources feed a run:
//!
//! - [`EngineConfig`]: where templates live, how to reach the cluster, session
//!   limits and logging. Loaded from YAML or TOML, every field has a default.
//! - [`ClusterConfig`]: the flat `sys.*` cluster properties describing the
//!   topology and the fault campaign (see [`properties`]).

pub mod properties;

pub use properties::{ClusterConfig, RemoteHost, PROPERTY_PREFIX};

use crate::error::{FaultlineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Template and output locations.
    pub paths: PathsConfig,
    /// SSH transport configuration.
    pub ssh: SshConfig,
    /// Apply/recover lifecycle configuration.
    pub lifecycle: LifecycleConfig,
    /// Injection endpoint configuration.
    pub endpoint: EndpointConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML or TOML file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FaultlineError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = if path
            .extension()
            .map_or(false, |e| e == "yaml" || e == "yml")
        {
            serde_yaml::from_str(&content)
                .map_err(|e| FaultlineError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            toml::from_str(&content)
                .map_err(|e| FaultlineError::Config(format!("Failed to parse config: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.lifecycle.max_sessions == 0 {
            return Err(FaultlineError::InvalidConfig {
                field: "lifecycle.max_sessions".to_string(),
                reason: "At least one session slot is required".to_string(),
            });
        }

        if self.lifecycle.apply_command.trim().is_empty()
            || self.lifecycle.delete_command.trim().is_empty()
        {
            return Err(FaultlineError::InvalidConfig {
                field: "lifecycle".to_string(),
                reason: "Apply and delete commands must be non-empty".to_string(),
            });
        }

        if self.endpoint.port == 0 {
            return Err(FaultlineError::InvalidConfig {
                field: "endpoint.port".to_string(),
                reason: "Port must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("FAULTLINE_TEMPLATE_DIR") {
            self.paths.template_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("FAULTLINE_FAULT_DIR") {
            self.paths.fault_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("FAULTLINE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }
}

/// Template and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding fault descriptions.
    pub template_dir: PathBuf,
    /// Sub-directory of `template_dir` holding manifest templates.
    pub manifest_subdir: String,
    /// Directory rendered manifests are written to.
    pub fault_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("./FaultTemplates"),
            manifest_subdir: "template".to_string(),
            fault_dir: PathBuf::from("./faults"),
        }
    }
}

impl PathsConfig {
    /// Directory holding manifest templates.
    pub fn manifest_dir(&self) -> PathBuf {
        self.template_dir.join(&self.manifest_subdir)
    }
}

/// SSH transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Private key passed to `ssh -i` / `scp -i`.
    pub identity_file: Option<PathBuf>,
    /// Extra `-o` options.
    pub options: Vec<String>,
    /// Remote directory manifests are uploaded to.
    pub remote_dir: String,
    /// Connection timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            identity_file: None,
            options: vec!["StrictHostKeyChecking=no".to_string()],
            remote_dir: "/tmp/faultline".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Apply/recover lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Maximum concurrently open remote sessions.
    pub max_sessions: usize,
    /// Command prefix applying a manifest; the remote path is appended.
    pub apply_command: String,
    /// Command prefix deleting a manifest; the remote path is appended.
    pub delete_command: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_sessions: 6,
            apply_command: "kubectl apply -f".to_string(),
            delete_command: "kubectl delete -f".to_string(),
        }
    }
}

/// Injection endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Port the injection agent listens on.
    pub port: u16,
    /// Request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            port: 9526,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using the fault duration format (`500ms`, `10s`, `5m`).
pub mod humantime_serde {
    use crate::chaos::duration::parse_duration_ms;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let ms = parse_duration_ms(&s).map_err(serde::de::Error::custom)?;
        u64::try_from(ms)
            .map(Duration::from_millis)
            .map_err(|_| serde::de::Error::custom(format!("negative duration: {}", s)))
    }
}
