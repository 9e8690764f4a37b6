//! Error types for the faultline engine.
//!
//! This module provides a unified error type [`FaultlineError`] for all faultline
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Configuration**: missing or malformed cluster properties and engine settings
//! - **Scope**: a scope expression could not be resolved against the topology
//! - **Template**: a fault description or manifest template is missing or incomplete
//! - **Duration**: a human-readable duration could not be parsed
//! - **Transport**: connect, upload, remote command or HTTP failures
//!
//! # Example
//!
//! ```rust
//! use faultline::error::{FaultlineError, Result};
//!
//! fn pick_role(role: &str) -> Result<&str> {
//!     match role {
//!         "storage" | "compute" | "test" => Ok(role),
//!         other => Err(FaultlineError::UnknownRole(other.to_string())),
//!     }
//! }
//!
//! let err = pick_role("proxy").unwrap_err();
//! assert!(err.is_scope_error());
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for faultline operations.
#[derive(Error, Debug)]
pub enum FaultlineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing cluster property: {0}")]
    MissingProperty(String),

    // Scope errors
    #[error("Scope references the leader zone but no leader zone is configured")]
    LeaderZoneNotSet,

    #[error("Scope references zones but no zones are configured")]
    ZonesNotConfigured,

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Role has no configured pods: {0}")]
    RoleNotConfigured(String),

    #[error("Scope resolved to no pods: {0}")]
    EmptyScope(String),

    #[error("Invalid count constraint: {0}")]
    InvalidCount(String),

    #[error("Invalid scope expression: {0}")]
    InvalidScope(String),

    #[error("Zone index {index} out of range ({available} zones available)")]
    ZoneIndexOutOfRange { index: usize, available: usize },

    // Template errors
    #[error("Template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("Fault description is missing field: {0}")]
    MissingField(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    // Duration errors
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    // Transport errors
    #[error("Failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("Failed to upload {path}: {reason}")]
    Upload { path: String, reason: String },

    #[error("Remote command `{command}` exited with {exit_code:?}")]
    Exec {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Injection rejected (code {code}): {error}")]
    Injection { code: i64, error: String },

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FaultlineError {
    /// Check if the error came from scope resolution.
    pub fn is_scope_error(&self) -> bool {
        matches!(
            self,
            FaultlineError::LeaderZoneNotSet
                | FaultlineError::ZonesNotConfigured
                | FaultlineError::UnknownRole(_)
                | FaultlineError::RoleNotConfigured(_)
                | FaultlineError::EmptyScope(_)
                | FaultlineError::InvalidCount(_)
                | FaultlineError::InvalidScope(_)
                | FaultlineError::ZoneIndexOutOfRange { .. }
        )
    }

    /// Check if the error came from the remote transport or injection endpoint.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            FaultlineError::Connect { .. }
                | FaultlineError::Upload { .. }
                | FaultlineError::Exec { .. }
                | FaultlineError::Http(_)
                | FaultlineError::Json(_)
                | FaultlineError::Injection { .. }
        )
    }
}

impl From<reqwest::Error> for FaultlineError {
    fn from(e: reqwest::Error) -> Self {
        FaultlineError::Http(e.to_string())
    }
}

/// Result type alias for faultline operations.
pub type Result<T> = std::result::Result<T, FaultlineError>;
