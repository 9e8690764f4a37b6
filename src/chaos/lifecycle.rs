//! Fault lifecycle: apply now, recover later.
//!
//! Applying a fault returns a [`RecoveryHandle`] when a recovery is scheduled.
//! The recovery runs on its own task after the fault's duration; the handle can
//! fire it early, cancel it, or wait for it. Dropping the handle detaches the
//! task, which still recovers on schedule.
//!
//! Manifest faults keep their session (and its slot in the session pool) until
//! the recovery has run.

use super::compiler::{CommandFault, CompiledFault, ManifestFault};
use super::transport::{ChaosEndpoint, RemoteSession, RemoteTransport};
use crate::config::EngineConfig;
use crate::error::{FaultlineError, Result};
use crate::observability;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How a scheduled recovery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The inverse operation ran successfully.
    Recovered,
    /// The inverse operation failed; the fault may still be active.
    Failed(String),
    /// Cancelled before running; the fault is left active.
    Cancelled,
}

impl fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryOutcome::Recovered => write!(f, "recovered"),
            RecoveryOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            RecoveryOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

enum Trigger {
    Now,
    Cancel,
}

/// Handle to a scheduled recovery.
pub struct RecoveryHandle {
    fault: CompiledFault,
    trigger: Option<oneshot::Sender<Trigger>>,
    task: JoinHandle<RecoveryOutcome>,
    outcome: Option<RecoveryOutcome>,
}

impl RecoveryHandle {
    fn spawn(fault: CompiledFault, delay: Duration, recovery: Recovery) -> Self {
        let (tx, rx) = oneshot::channel();
        let name = fault.name().to_string();
        let task = tokio::spawn(run_recovery(name, delay, rx, recovery));
        Self {
            fault,
            trigger: Some(tx),
            task,
            outcome: None,
        }
    }

    pub fn fault(&self) -> &CompiledFault {
        &self.fault
    }

    /// Run the recovery immediately instead of waiting for the duration.
    pub fn recover_now(&mut self) {
        self.fire(Trigger::Now);
    }

    /// Abort the recovery without running it.
    pub fn cancel(&mut self) {
        self.fire(Trigger::Cancel);
    }

    fn fire(&mut self, trigger: Trigger) {
        if let Some(tx) = self.trigger.take() {
            // The task may already be past its timer.
            let _ = tx.send(trigger);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some() || self.task.is_finished()
    }

    /// Wait for the recovery to finish.
    ///
    /// Cancel-safe: dropping the future keeps the recovery scheduled, and
    /// waiting again after completion returns the same outcome.
    pub async fn wait(&mut self) -> RecoveryOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let outcome = match (&mut self.task).await {
            Ok(outcome) => outcome,
            Err(e) => RecoveryOutcome::Failed(e.to_string()),
        };
        self.outcome = Some(outcome.clone());
        outcome
    }
}

impl fmt::Debug for RecoveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryHandle")
            .field("fault", &self.fault.name())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// The inverse operation of an applied fault, with whatever it must hold on to.
enum Recovery {
    Manifest {
        session: Box<dyn RemoteSession>,
        command: String,
        _permit: OwnedSemaphorePermit,
    },
    Command {
        endpoint: Arc<dyn ChaosEndpoint>,
        host: String,
        port: u16,
        handle: String,
    },
}

impl Recovery {
    async fn run(self) -> Result<()> {
        match self {
            Recovery::Manifest {
                mut session,
                command,
                _permit,
            } => {
                let result = match session.exec(&command).await {
                    Ok(output) if output.success() => Ok(()),
                    Ok(output) => Err(FaultlineError::Exec {
                        command,
                        exit_code: output.exit_code,
                    }),
                    Err(e) => Err(e),
                };
                close_session(session.as_mut()).await;
                result
            }
            Recovery::Command {
                endpoint,
                host,
                port,
                handle,
            } => {
                endpoint
                    .send(&host, port, &format!("destroy {}", handle))
                    .await?
                    .into_result()?;
                Ok(())
            }
        }
    }

    async fn release(self) {
        if let Recovery::Manifest { mut session, .. } = self {
            close_session(session.as_mut()).await;
        }
    }
}

async fn run_recovery(
    fault: String,
    delay: Duration,
    mut trigger: oneshot::Receiver<Trigger>,
    recovery: Recovery,
) -> RecoveryOutcome {
    debug!(fault = %fault, delay_ms = delay.as_millis() as u64, "Recovery scheduled");

    let fire = tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        Ok(t) = &mut trigger => matches!(t, Trigger::Now),
    };

    if !fire {
        warn!(fault = %fault, "Recovery cancelled, fault left active");
        recovery.release().await;
        return RecoveryOutcome::Cancelled;
    }

    info!(fault = %fault, "Recovering fault");
    let outcome = match recovery.run().await {
        Ok(()) => {
            info!(fault = %fault, "Fault recovered");
            RecoveryOutcome::Recovered
        }
        Err(e) => {
            error!(fault = %fault, error = %e, "Recovery failed");
            RecoveryOutcome::Failed(e.to_string())
        }
    };
    observability::record_recovery(&outcome);
    outcome
}

async fn close_session(session: &mut dyn RemoteSession) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close session");
    }
}

/// Applies compiled faults and schedules their recovery.
pub struct LifecycleDriver {
    transport: Arc<dyn RemoteTransport>,
    endpoint: Arc<dyn ChaosEndpoint>,
    sessions: Arc<Semaphore>,
    remote_dir: String,
    apply_command: String,
    delete_command: String,
}

impl LifecycleDriver {
    pub fn new(
        transport: Arc<dyn RemoteTransport>,
        endpoint: Arc<dyn ChaosEndpoint>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            transport,
            endpoint,
            sessions: Arc::new(Semaphore::new(config.lifecycle.max_sessions)),
            remote_dir: config.ssh.remote_dir.trim_end_matches('/').to_string(),
            apply_command: config.lifecycle.apply_command.clone(),
            delete_command: config.lifecycle.delete_command.clone(),
        }
    }

    /// Session slots currently free.
    pub fn available_sessions(&self) -> usize {
        self.sessions.available_permits()
    }

    /// Apply `fault`. Returns the recovery handle if a recovery was scheduled.
    pub async fn apply(&self, fault: CompiledFault) -> Result<Option<RecoveryHandle>> {
        let recovery = match &fault {
            CompiledFault::Manifest(manifest) => Some(self.apply_manifest(manifest).await?),
            CompiledFault::Command(command) => self.apply_command(command).await?,
        };
        observability::record_fault_applied(fault.kind());

        let delay = fault.recovery_delay();
        match (delay, recovery) {
            (Some(delay), Some(recovery)) => {
                info!(
                    fault = %fault.name(),
                    duration_ms = fault.duration_ms(),
                    "Fault applied, recovery scheduled"
                );
                Ok(Some(RecoveryHandle::spawn(fault, delay, recovery)))
            }
            (_, recovery) => {
                info!(fault = %fault.name(), "Fault applied, no recovery scheduled");
                if let Some(recovery) = recovery {
                    recovery.release().await;
                }
                Ok(None)
            }
        }
    }

    async fn apply_manifest(&self, fault: &ManifestFault) -> Result<Recovery> {
        let permit = self
            .sessions
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FaultlineError::Internal("session pool closed".to_string()))?;

        let mut session = self.transport.connect(&fault.remote_host).await?;
        let remote_path = format!("{}/{}", self.remote_dir, fault.name);

        if let Err(e) = self.upload_and_apply(session.as_mut(), fault, &remote_path).await {
            close_session(session.as_mut()).await;
            return Err(e);
        }

        Ok(Recovery::Manifest {
            session,
            command: format!("{} {}", self.delete_command, remote_path),
            _permit: permit,
        })
    }

    async fn upload_and_apply(
        &self,
        session: &mut dyn RemoteSession,
        fault: &ManifestFault,
        remote_path: &str,
    ) -> Result<()> {
        session.put_file(&fault.manifest_path, remote_path).await?;

        let command = format!("{} {}", self.apply_command, remote_path);
        let output = session.exec(&command).await?;
        if !output.success() {
            return Err(FaultlineError::Exec {
                command,
                exit_code: output.exit_code,
            });
        }
        Ok(())
    }

    async fn apply_command(&self, fault: &CommandFault) -> Result<Option<Recovery>> {
        let response = self
            .endpoint
            .send(&fault.endpoint_host, fault.endpoint_port, &fault.command)
            .await?
            .into_result()?;

        match response.handle() {
            Some(handle) => Ok(Some(Recovery::Command {
                endpoint: self.endpoint.clone(),
                host: fault.endpoint_host.clone(),
                port: fault.endpoint_port,
                handle,
            })),
            None => {
                warn!(fault = %fault.name, "Endpoint returned no fault handle, cannot recover");
                Ok(None)
            }
        }
    }
}
