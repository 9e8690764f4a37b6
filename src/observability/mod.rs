//! Observability for faultline.
//!
//! Structured logging through `tracing`, and fault counters through `metrics`.
//! No exporter is installed here; counters are recorded by whatever recorder
//! the embedding process installs.

use crate::chaos::RecoveryOutcome;
use crate::config::ObservabilityConfig;
use crate::error::{FaultlineError, Result};
use metrics::counter;
use ::tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging and register the fault counters.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| FaultlineError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| FaultlineError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    register_metrics();
    info!("Observability initialized");
    Ok(())
}

fn register_metrics() {
    counter!("faultline_faults_compiled_total").absolute(0);
    counter!("faultline_faults_applied_total").absolute(0);
    counter!("faultline_faults_recovered_total").absolute(0);
    counter!("faultline_recovery_failures_total").absolute(0);
}

/// Record a compiled fault.
pub fn record_fault_compiled() {
    counter!("faultline_faults_compiled_total").increment(1);
}

/// Record an applied fault; `kind` is `manifest` or `command`.
pub fn record_fault_applied(kind: &'static str) {
    counter!("faultline_faults_applied_total", "kind" => kind).increment(1);
}

/// Record the end of a recovery.
pub fn record_recovery(outcome: &RecoveryOutcome) {
    match outcome {
        RecoveryOutcome::Recovered => counter!("faultline_faults_recovered_total").increment(1),
        RecoveryOutcome::Failed(_) => counter!("faultline_recovery_failures_total").increment(1),
        RecoveryOutcome::Cancelled => {}
    }
}
