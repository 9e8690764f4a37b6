//! Core type definitions shared across faultline.
//!
//! - [`PodId`] = `String`: a pod identifier as it appears in cluster properties
//! - [`ZoneName`] = `String`: an availability zone name
//! - [`Role`]: the pod roles a scope expression can filter on

use crate::error::{FaultlineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a pod in the target cluster.
pub type PodId = String;

/// Name of an availability zone.
pub type ZoneName = String;

/// Role a pod plays in the benchmarked cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Storage nodes.
    Storage,
    /// Compute (SQL) nodes.
    Compute,
    /// Test or auxiliary nodes.
    Test,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Storage, Role::Compute, Role::Test];

    /// Lower-case name, as used in scope expressions and property keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Storage => "storage",
            Role::Compute => "compute",
            Role::Test => "test",
        }
    }

    /// Cluster property key (without the `sys.` prefix) holding this role's pods.
    pub fn property_key(&self) -> String {
        format!("{}.pods", self.as_str())
    }
}

impl FromStr for Role {
    type Err = FaultlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "storage" => Ok(Role::Storage),
            "compute" => Ok(Role::Compute),
            "test" => Ok(Role::Test),
            other => Err(FaultlineError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a comma-separated property value into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
