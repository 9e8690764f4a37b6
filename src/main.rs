//! faultline CLI - Main entry point.

use faultline::chaos::{
    format_duration_ms, scope, CampaignReport, CompiledFault, DurationUnit, FaultCampaign,
    FaultCompiler, HttpChaosEndpoint, LifecycleDriver, SshTransport, Topology,
};
use faultline::cli::{Cli, Commands};
use faultline::config::{ClusterConfig, EngineConfig};
use faultline::observability;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Resolve {
            properties,
            expression,
        } => {
            setup(cli.config.as_deref(), cli.log_level.as_deref(), cli.json_logs)?;
            let cluster = ClusterConfig::load(&properties)?;
            let topology = Topology::from_config(&cluster)?;
            for pod in scope::resolve(&topology, &expression)? {
                println!("{}", pod);
            }
        }

        Commands::Compile { properties, fault } => {
            let config = setup(cli.config.as_deref(), cli.log_level.as_deref(), cli.json_logs)?;
            let (cluster, compiler) = build_compiler(&properties, &config)?;
            let names = if fault.is_empty() {
                cluster.faults.clone()
            } else {
                fault
            };

            for name in &names {
                print_compiled(&compiler.compile(name)?);
            }
        }

        Commands::Inject {
            properties,
            no_wait,
        } => {
            let config = setup(cli.config.as_deref(), cli.log_level.as_deref(), cli.json_logs)?;
            let (cluster, compiler) = build_compiler(&properties, &config)?;
            let driver = LifecycleDriver::new(
                Arc::new(SshTransport::new(config.ssh.clone())),
                Arc::new(HttpChaosEndpoint::new(&config.endpoint)?),
                &config,
            );
            let campaign = FaultCampaign::new(compiler, driver, &cluster);

            let mut report = campaign.run().await?;
            print_report(&report);

            if no_wait {
                warn!(
                    pending = report.pending_recoveries(),
                    "Exiting without recovering; faults stay active"
                );
            } else {
                wait_for_recoveries(&mut report).await;
            }

            if !report.is_clean() {
                anyhow::bail!("{} fault(s) failed to apply", report.failures.len());
            }
        }

        Commands::Version => {
            println!("faultline v{}", env!("CARGO_PKG_VERSION"));
            println!("Fault resolution and lifecycle engine for chaos testing");
        }
    }

    Ok(())
}

/// Load the engine configuration, apply CLI overrides and start logging.
fn setup(
    config_path: Option<&Path>,
    log_level: Option<&str>,
    json_logs: bool,
) -> anyhow::Result<EngineConfig> {
    let mut config = EngineConfig::load(config_path)?;
    if let Some(level) = log_level {
        config.observability.log_level = level.to_string();
    }
    if json_logs {
        config.observability.json_logs = true;
    }
    observability::init(&config.observability)?;
    Ok(config)
}

fn build_compiler(
    properties: &Path,
    config: &EngineConfig,
) -> anyhow::Result<(ClusterConfig, FaultCompiler)> {
    let cluster = ClusterConfig::load(properties)?;
    let topology = Arc::new(Topology::from_config(&cluster)?);
    let compiler = FaultCompiler::new(topology, &cluster, config);
    Ok((cluster, compiler))
}

/// Wait for every recovery; Ctrl-C fires the outstanding ones immediately.
async fn wait_for_recoveries(report: &mut CampaignReport) {
    let pending = report.pending_recoveries();
    if pending == 0 {
        return;
    }
    info!(pending, "Waiting for recoveries (Ctrl-C to recover now)");

    let outcomes = tokio::select! {
        outcomes = report.wait_recoveries() => outcomes,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, recovering all faults now");
            report.recover_all_now();
            report.wait_recoveries().await
        }
    };

    for (fault, outcome) in outcomes {
        println!("{:<32} {}", fault, outcome);
    }
}

fn print_compiled(fault: &CompiledFault) {
    let duration = format_duration_ms(fault.duration_ms(), DurationUnit::Seconds);
    match fault {
        CompiledFault::Manifest(m) => println!(
            "{:<32} manifest  {}  via {}  for {}",
            m.name,
            m.manifest_path.display(),
            m.remote_host,
            duration
        ),
        CompiledFault::Command(c) => println!(
            "{:<32} command   {}:{} `{}`  for {}",
            c.name, c.endpoint_host, c.endpoint_port, c.command, duration
        ),
    }
}

fn print_report(report: &CampaignReport) {
    println!(
        "Campaign {} started {}",
        report.run_id,
        report.started_at.to_rfc3339()
    );
    for fault in &report.applied {
        println!("  applied  {}", fault);
    }
    for failure in &report.failures {
        println!("  FAILED   {}: {}", failure.fault, failure.error);
    }
}
