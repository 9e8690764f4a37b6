//! Cluster properties.
//!
//! The benchmark driver describes the target cluster with flat properties. Only
//! keys under the `sys.` namespace matter here:
//!
//! ```text
//! sys.k8scli = root@10.0.0.5
//! sys.zones = zone1, zone2, zone3
//! sys.leaderzone = zone1
//! sys.zone1.pods = p1, p2
//! sys.storage.pods = p1, p2, p3, p4, p5, p6
//! sys.faults = leader_fail.yaml
//! sys.namespace = oceanbase
//! ```
//!
//! Every `sys.*` key is also kept, prefix stripped, for `$KEY` substitution.

use crate::chaos::duration::{parse_duration_ms_or, DurationUnit};
use crate::error::{FaultlineError, Result};
use crate::types::{split_list, PodId, Role, ZoneName};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Namespace of the properties read by faultline.
pub const PROPERTY_PREFIX: &str = "sys.";

/// `user@host` the manifests are deployed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub user: Option<String>,
    pub host: String,
}

impl FromStr for RemoteHost {
    type Err = FaultlineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (user, host) = match s.split_once('@') {
            Some((user, host)) => (Some(user.to_string()), host.to_string()),
            None => (None, s.to_string()),
        };

        if host.is_empty() || user.as_deref() == Some("") {
            return Err(FaultlineError::InvalidConfig {
                field: "sys.k8scli".to_string(),
                reason: format!("expected user@host, got {:?}", s),
            });
        }

        Ok(Self { user, host })
    }
}

impl fmt::Display for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(f, "{}@{}", user, self.host),
            None => f.write_str(&self.host),
        }
    }
}

/// Cluster shape and campaign settings read from `sys.*` properties.
#[derive(Debug, Clone, Default)]
pub struct ClusterConfig {
    /// Host the manifests are deployed through (`sys.k8scli`).
    pub remote_host: Option<RemoteHost>,
    /// All pods (`sys.pods`, defaults to every zone's pods in zone order).
    pub pods: Vec<PodId>,
    /// Zones in configured order (`sys.zones`).
    pub zones: Vec<ZoneName>,
    /// Leader zone (`sys.leaderzone`).
    pub leader_zone: Option<ZoneName>,
    /// Pods per zone (`sys.<zone>.pods`).
    pub zone_pods: HashMap<ZoneName, Vec<PodId>>,
    /// Pods per role (`sys.<role>.pods`).
    pub role_pods: HashMap<Role, Vec<PodId>>,
    /// Fault description names of the campaign (`sys.faults`).
    pub faults: Vec<String>,
    /// Delay before the campaign injects, in milliseconds (`sys.faulttime`).
    /// A bare integer is read as minutes.
    pub fault_delay_ms: Option<i64>,
    /// Every `sys.*` property, prefix stripped.
    pub properties: BTreeMap<String, String>,
}

impl ClusterConfig {
    /// Load cluster properties from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FaultlineError::Config(format!("Failed to read properties {:?}: {}", path, e))
        })?;
        Self::from_properties(parse_properties(&content))
    }

    /// Build the cluster configuration from raw properties.
    ///
    /// Keys outside the `sys.` namespace are ignored.
    pub fn from_properties<I, K, V>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let properties: BTreeMap<String, String> = raw
            .into_iter()
            .filter_map(|(k, v)| {
                k.as_ref()
                    .strip_prefix(PROPERTY_PREFIX)
                    .map(|key| (key.to_string(), v.as_ref().trim().to_string()))
            })
            .collect();

        for (key, value) in &properties {
            debug!("system config, {}{}={}", PROPERTY_PREFIX, key, value);
        }

        let list = |key: &str| properties.get(key).map(|v| split_list(v));

        let remote_host = properties
            .get("k8scli")
            .map(|v| v.parse::<RemoteHost>())
            .transpose()?;

        let zones = list("zones").unwrap_or_default();
        let leader_zone = properties
            .get("leaderzone")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let mut zone_pods = HashMap::new();
        for zone in &zones {
            let key = format!("{}.pods", zone);
            let pods = list(&key).ok_or_else(|| {
                FaultlineError::MissingProperty(format!("{}{}", PROPERTY_PREFIX, key))
            })?;
            zone_pods.insert(zone.clone(), pods);
        }

        let pods = match list("pods") {
            Some(pods) => pods,
            None => zones
                .iter()
                .flat_map(|zone| zone_pods[zone].iter().cloned())
                .collect(),
        };

        let role_pods = Role::ALL
            .iter()
            .filter_map(|role| list(&role.property_key()).map(|pods| (*role, pods)))
            .collect();

        let faults = list("faults").unwrap_or_default();

        let fault_delay_ms = properties
            .get("faulttime")
            .map(|v| parse_duration_ms_or(v, DurationUnit::Minutes))
            .transpose()?;

        let config = Self {
            remote_host,
            pods,
            zones,
            leader_zone,
            zone_pods,
            role_pods,
            faults,
            fault_delay_ms,
            properties,
        };

        config.validate()?;

        info!(
            pods = config.pods.len(),
            zones = config.zones.len(),
            leader_zone = ?config.leader_zone,
            faults = config.faults.len(),
            "Loaded cluster properties"
        );

        Ok(config)
    }

    /// Validate the cluster shape.
    pub fn validate(&self) -> Result<()> {
        if let Some(leader) = &self.leader_zone {
            if !self.zones.contains(leader) {
                return Err(FaultlineError::InvalidConfig {
                    field: "sys.leaderzone".to_string(),
                    reason: format!("leader zone {} is not listed in sys.zones", leader),
                });
            }
        }

        for zone in &self.zones {
            if !self.zone_pods.contains_key(zone) {
                return Err(FaultlineError::MissingProperty(format!(
                    "{}{}.pods",
                    PROPERTY_PREFIX, zone
                )));
            }
        }

        Ok(())
    }

    /// Pods configured for `role`, if any.
    pub fn role_pods(&self, role: Role) -> Option<&[PodId]> {
        self.role_pods.get(&role).map(Vec::as_slice)
    }

}

/// Parse a flat properties file.
///
/// Lines are `key=value` or `key: value`; `#` and `!` start comments. Matching
/// surrounding double quotes around a value are removed.
pub fn parse_properties(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let idx = line.find(|c: char| c == '=' || c == ':')?;
            let key = line[..idx].trim();
            let mut value = line[idx + 1..].trim();
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                value = &value[1..value.len() - 1];
            }
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}
