//! Resolved cluster shape.
//!
//! A [`Topology`] is built once per run from the cluster properties and is then
//! immutable, except for the scope cache. The cache memoizes the first
//! (possibly shuffled) zone ordering computed for a `kind.subkind` key such as
//! `zone.follower`, so every fault of a run sees the same ordering.

use crate::config::ClusterConfig;
use crate::error::{FaultlineError, Result};
use crate::types::{PodId, Role, ZoneName};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Cluster shape used for scope resolution.
#[derive(Debug)]
pub struct Topology {
    pods: Vec<PodId>,
    zones: Vec<ZoneName>,
    leader_zone: Option<ZoneName>,
    zone_pods: HashMap<ZoneName, Vec<PodId>>,
    role_pods: HashMap<Role, Vec<PodId>>,
    properties: BTreeMap<String, String>,
    scope_cache: Mutex<HashMap<String, Vec<ZoneName>>>,
}

impl Topology {
    /// Build the topology from validated cluster properties.
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            pods: config.pods.clone(),
            zones: config.zones.clone(),
            leader_zone: config.leader_zone.clone(),
            zone_pods: config.zone_pods.clone(),
            role_pods: config.role_pods.clone(),
            properties: config.properties.clone(),
            scope_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Start building a topology by hand.
    pub fn builder() -> TopologyBuilder {
        TopologyBuilder::default()
    }

    pub fn pods(&self) -> &[PodId] {
        &self.pods
    }

    pub fn zones(&self) -> &[ZoneName] {
        &self.zones
    }

    pub fn leader_zone(&self) -> Option<&str> {
        self.leader_zone.as_deref()
    }

    /// Pods of `zone`, in configured order.
    pub fn zone_pods(&self, zone: &str) -> Result<&[PodId]> {
        self.zone_pods
            .get(zone)
            .map(Vec::as_slice)
            .ok_or_else(|| FaultlineError::MissingProperty(format!("sys.{}.pods", zone)))
    }

    /// Pods configured for `role`.
    pub fn role_pods(&self, role: Role) -> Result<&[PodId]> {
        self.role_pods
            .get(&role)
            .map(Vec::as_slice)
            .ok_or_else(|| FaultlineError::RoleNotConfigured(role.to_string()))
    }

    /// Cluster properties, `sys.` prefix stripped.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Return the cached zone ordering for `key`, computing it on first use.
    ///
    /// The lock is held while `compute` runs, so concurrent first resolutions
    /// of the same key agree on one ordering.
    pub fn cached_zones<F>(&self, key: &str, compute: F) -> Result<Vec<ZoneName>>
    where
        F: FnOnce(&Self) -> Result<Vec<ZoneName>>,
    {
        let mut cache = self.scope_cache.lock();
        if let Some(zones) = cache.get(key) {
            return Ok(zones.clone());
        }

        let zones = compute(self)?;
        cache.insert(key.to_string(), zones.clone());
        Ok(zones)
    }

    /// Cached ordering for `key`, if resolved already.
    pub fn cached(&self, key: &str) -> Option<Vec<ZoneName>> {
        self.scope_cache.lock().get(key).cloned()
    }
}

/// Builder for [`Topology`], mostly useful in tests and embedding code.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    config: ClusterConfig,
}

impl TopologyBuilder {
    /// Add a zone with its pods. Pods are also appended to the global pod list.
    pub fn zone(mut self, zone: impl Into<String>, pods: &[&str]) -> Self {
        let zone = zone.into();
        let pods: Vec<PodId> = pods.iter().map(|p| p.to_string()).collect();
        self.config.pods.extend(pods.iter().cloned());
        self.config.zones.push(zone.clone());
        self.config.zone_pods.insert(zone, pods);
        self
    }

    pub fn leader(mut self, zone: impl Into<String>) -> Self {
        self.config.leader_zone = Some(zone.into());
        self
    }

    pub fn role(mut self, role: Role, pods: &[&str]) -> Self {
        self.config
            .role_pods
            .insert(role, pods.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Add an unzoned pod.
    pub fn pod(mut self, pod: impl Into<String>) -> Self {
        self.config.pods.push(pod.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Topology> {
        Topology::from_config(&self.config)
    }
}
