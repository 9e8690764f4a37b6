//! Scope expressions.
//!
//! A scope expression names the pods a fault targets:
//!
//! ```text
//! $[zone-constraint-]role-count
//!
//! $zone.leader-storage-0      every storage pod of the leader zone
//! $zone.follower.2-storage-1  one storage pod of the second follower zone
//! $zone.random-compute-2      two compute pods of a random zone
//! $storage-1                  one storage pod anywhere
//! ```
//!
//! Follower and random zone orderings are shuffled once per [`Topology`] and
//! cached under `zone.follower` / `zone.random`, so `zone.follower.1` and
//! `zone.follower.2` always name different zones within a run. Only the zone
//! ordering is cached; the count constraint re-samples pods on every call.
//!
//! `$RANDOMPOD` is the role-less shorthand for a single pod from anywhere.

use super::topology::Topology;
use crate::error::{FaultlineError, Result};
use crate::types::{PodId, Role, ZoneName};
use rand::seq::SliceRandom;
use tracing::debug;

/// Zone part of a scope expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSelector {
    /// The leader zone.
    Leader,
    /// The K-th (1-based) follower zone of the cached ordering.
    Follower(usize),
    /// The K-th (1-based) zone of the cached random ordering.
    Random(usize),
}

impl ZoneSelector {
    /// Parse a `zone.<kind>[.K]` token.
    pub fn parse(token: &str) -> Result<Self> {
        let invalid = || FaultlineError::InvalidScope(format!("bad zone constraint {:?}", token));

        let mut parts = token.split('.');
        if parts.next() != Some("zone") {
            return Err(invalid());
        }
        let kind = parts.next().ok_or_else(invalid)?;
        let index = match parts.next() {
            Some(k) => {
                let k: usize = k.parse().map_err(|_| invalid())?;
                if k == 0 {
                    return Err(invalid());
                }
                Some(k)
            }
            None => None,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        match (kind, index) {
            ("leader", None) => Ok(ZoneSelector::Leader),
            ("follower", k) => Ok(ZoneSelector::Follower(k.unwrap_or(1))),
            ("random", k) => Ok(ZoneSelector::Random(k.unwrap_or(1))),
            _ => Err(invalid()),
        }
    }

    /// Key of the cached zone ordering; shared by every K.
    pub fn cache_key(&self) -> &'static str {
        match self {
            ZoneSelector::Leader => "zone.leader",
            ZoneSelector::Follower(_) => "zone.follower",
            ZoneSelector::Random(_) => "zone.random",
        }
    }

    fn index(&self) -> usize {
        match self {
            ZoneSelector::Leader => 1,
            ZoneSelector::Follower(k) | ZoneSelector::Random(k) => *k,
        }
    }

    fn zone_ordering(&self, topology: &Topology) -> Result<Vec<ZoneName>> {
        match self {
            ZoneSelector::Leader => topology
                .leader_zone()
                .map(|leader| vec![leader.to_string()])
                .ok_or(FaultlineError::LeaderZoneNotSet),
            ZoneSelector::Follower(_) => {
                if topology.zones().is_empty() {
                    return Err(FaultlineError::ZonesNotConfigured);
                }
                let leader = topology.leader_zone().ok_or(FaultlineError::LeaderZoneNotSet)?;
                let mut zones: Vec<ZoneName> = topology
                    .zones()
                    .iter()
                    .filter(|zone| zone.as_str() != leader)
                    .cloned()
                    .collect();
                zones.shuffle(&mut rand::thread_rng());
                Ok(zones)
            }
            ZoneSelector::Random(_) => {
                if topology.zones().is_empty() {
                    return Err(FaultlineError::ZonesNotConfigured);
                }
                let mut zones = topology.zones().to_vec();
                zones.shuffle(&mut rand::thread_rng());
                Ok(zones)
            }
        }
    }

    /// Pick the zone this selector names, memoizing the ordering.
    pub fn select(&self, topology: &Topology) -> Result<ZoneName> {
        let zones = topology.cached_zones(self.cache_key(), |t| self.zone_ordering(t))?;
        let index = self.index();
        zones
            .get(index - 1)
            .cloned()
            .ok_or(FaultlineError::ZoneIndexOutOfRange {
                index,
                available: zones.len(),
            })
    }
}

/// Placeholder naming one pod drawn from every pod of the cluster.
pub const RANDOM_POD: &str = "$RANDOMPOD";

/// Pick one pod from the whole cluster, regardless of zone or role.
pub fn random_pod(topology: &Topology) -> Result<PodId> {
    topology
        .pods()
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| FaultlineError::EmptyScope(RANDOM_POD.to_string()))
}

/// Whether a placeholder token is a scope expression rather than a plain key.
pub fn is_scope_expression(token: &str) -> bool {
    token.starts_with('$') && token.contains('-')
}

fn is_zone_token(token: &str) -> bool {
    token == "zone" || token.starts_with("zone.")
}

/// Resolve a scope expression to an ordered list of pods.
pub fn resolve(topology: &Topology, expression: &str) -> Result<Vec<PodId>> {
    let body = expression.strip_prefix('$').unwrap_or(expression);

    // A trailing `--N` is a negative count, not an empty role.
    if let Some((head, count)) = body.rsplit_once("--") {
        if !head.is_empty() && !count.is_empty() && !count.contains('-') {
            return Err(FaultlineError::InvalidCount(format!("-{}", count)));
        }
    }

    let tokens: Vec<&str> = body.split('-').collect();
    if tokens.len() < 2 || tokens.iter().any(|t| t.is_empty()) {
        return Err(FaultlineError::InvalidScope(expression.to_string()));
    }

    let role_token = tokens[tokens.len() - 2];
    let count_token = tokens[tokens.len() - 1];

    let (zone, mut candidates): (Option<ZoneName>, Vec<PodId>) =
        if tokens.len() > 2 && is_zone_token(tokens[0]) {
            let zone = ZoneSelector::parse(tokens[0])?.select(topology)?;
            let pods = topology.zone_pods(&zone)?.to_vec();
            (Some(zone), pods)
        } else {
            (None, topology.pods().to_vec())
        };

    let role: Role = role_token.parse()?;
    let role_pods = topology.role_pods(role)?;
    candidates.retain(|pod| role_pods.contains(pod));

    if candidates.is_empty() {
        return Err(FaultlineError::EmptyScope(expression.to_string()));
    }

    let count: usize = count_token
        .parse()
        .map_err(|_| FaultlineError::InvalidCount(count_token.to_string()))?;

    if count > 0 {
        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(count);
    }

    debug!(
        scope = expression,
        zone = ?zone,
        role = %role,
        pods = ?candidates,
        "Resolved scope"
    );

    Ok(candidates)
}
