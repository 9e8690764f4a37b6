//! Fault campaigns.
//!
//! A campaign applies every fault listed in `sys.faults`, in order. All faults
//! are compiled before the first one is applied, so a broken description never
//! leaves the cluster half-injected.

use super::compiler::{CompiledFault, FaultCompiler};
use super::lifecycle::{LifecycleDriver, RecoveryHandle, RecoveryOutcome};
use crate::config::ClusterConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A fault that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultFailure {
    pub fault: String,
    pub error: String,
}

/// Result of a campaign run.
#[derive(Debug)]
pub struct CampaignReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Faults applied, in order.
    pub applied: Vec<String>,
    pub failures: Vec<FaultFailure>,
    handles: Vec<RecoveryHandle>,
}

impl CampaignReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            applied: Vec::new(),
            failures: Vec::new(),
            handles: Vec::new(),
        }
    }

    /// Whether every fault was applied.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn handles(&self) -> &[RecoveryHandle] {
        &self.handles
    }

    /// Recoveries not finished yet.
    pub fn pending_recoveries(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Fire every outstanding recovery now.
    pub fn recover_all_now(&mut self) {
        for handle in &mut self.handles {
            handle.recover_now();
        }
    }

    /// Wait for every scheduled recovery; returns each fault with its outcome.
    ///
    /// Cancel-safe; call again after [`recover_all_now`](Self::recover_all_now)
    /// to collect the rest.
    pub async fn wait_recoveries(&mut self) -> Vec<(String, RecoveryOutcome)> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for handle in &mut self.handles {
            let fault = handle.fault().name().to_string();
            let outcome = handle.wait().await;
            info!(fault = %fault, outcome = %outcome, "Recovery finished");
            outcomes.push((fault, outcome));
        }
        outcomes
    }
}

/// Compiles and applies the faults of one cluster configuration.
pub struct FaultCampaign {
    compiler: FaultCompiler,
    driver: LifecycleDriver,
    faults: Vec<String>,
    warmup: Option<Duration>,
}

impl FaultCampaign {
    pub fn new(compiler: FaultCompiler, driver: LifecycleDriver, cluster: &ClusterConfig) -> Self {
        let warmup = cluster
            .fault_delay_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Self {
            compiler,
            driver,
            faults: cluster.faults.clone(),
            warmup,
        }
    }

    /// Compile every fault, stopping at the first error.
    pub fn compile_all(&self) -> Result<Vec<CompiledFault>> {
        self.faults
            .iter()
            .map(|name| self.compiler.compile(name))
            .collect()
    }

    /// Compile and apply every fault.
    pub async fn run(&self) -> Result<CampaignReport> {
        let mut report = CampaignReport::new();
        info!(
            run_id = %report.run_id,
            faults = self.faults.len(),
            "Starting fault campaign"
        );

        let compiled = self.compile_all()?;
        if compiled.is_empty() {
            warn!(run_id = %report.run_id, "No faults configured");
            return Ok(report);
        }

        if let Some(warmup) = self.warmup {
            info!(delay_ms = warmup.as_millis() as u64, "Waiting before injecting faults");
            tokio::time::sleep(warmup).await;
        }

        for fault in compiled {
            let name = fault.name().to_string();
            match self.driver.apply(fault).await {
                Ok(handle) => {
                    report.applied.push(name);
                    report.handles.extend(handle);
                }
                Err(e) => {
                    error!(fault = %name, error = %e, "Failed to apply fault");
                    report.failures.push(FaultFailure {
                        fault: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            run_id = %report.run_id,
            applied = report.applied.len(),
            failed = report.failures.len(),
            "Fault campaign applied"
        );
        Ok(report)
    }
}
