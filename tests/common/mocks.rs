// Recording transport and endpoint doubles

use faultline::chaos::{ChaosEndpoint, ChaosResponse, ExecOutput, RemoteSession, RemoteTransport};
use faultline::config::RemoteHost;
use faultline::{FaultlineError, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shell transport that records every call and never leaves the process.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    events: Arc<Mutex<Vec<String>>>,
    fail_commands: Arc<Mutex<Vec<String>>>,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands starting with `prefix` exit with status 1.
    pub fn fail_on(&self, prefix: &str) {
        self.fail_commands.lock().push(prefix.to_string());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Number of recorded events starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.events.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak_sessions(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteTransport for RecordingTransport {
    async fn connect(&self, target: &RemoteHost) -> Result<Box<dyn RemoteSession>> {
        self.events.lock().push(format!("connect {}", target));
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            transport: self.clone(),
            closed: false,
        }))
    }
}

struct RecordingSession {
    transport: RecordingTransport,
    closed: bool,
}

#[async_trait::async_trait]
impl RemoteSession for RecordingSession {
    async fn put_file(&mut self, local: &Path, remote_path: &str) -> Result<()> {
        if !local.is_file() {
            return Err(FaultlineError::Upload {
                path: local.display().to_string(),
                reason: "no such file".to_string(),
            });
        }
        self.transport
            .events
            .lock()
            .push(format!("put {}", remote_path));
        Ok(())
    }

    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        self.transport.events.lock().push(command.to_string());
        let failed = self
            .transport
            .fail_commands
            .lock()
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()));
        Ok(ExecOutput {
            stdout: vec![format!("ran {}", command)],
            stderr: vec![],
            exit_code: Some(if failed { 1 } else { 0 }),
        })
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.transport.open.fetch_sub(1, Ordering::SeqCst);
            self.transport.events.lock().push("close".to_string());
        }
        Ok(())
    }
}

/// Injection endpoint that records commands and hands out sequential handles.
#[derive(Clone, Default)]
pub struct RecordingEndpoint {
    commands: Arc<Mutex<Vec<(String, u16, String)>>>,
    reject: Arc<Mutex<Option<String>>>,
}

impl RecordingEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with a failed response.
    pub fn reject(&self, prefix: &str) {
        *self.reject.lock() = Some(prefix.to_string());
    }

    /// Commands received, as `host command`.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .map(|(host, _, command)| format!("{} {}", host, command))
            .collect()
    }

    pub fn ports(&self) -> Vec<u16> {
        self.commands.lock().iter().map(|(_, port, _)| *port).collect()
    }
}

#[async_trait::async_trait]
impl ChaosEndpoint for RecordingEndpoint {
    async fn send(&self, host: &str, port: u16, command: &str) -> Result<ChaosResponse> {
        let mut commands = self.commands.lock();
        commands.push((host.to_string(), port, command.to_string()));

        let rejected = matches!(&*self.reject.lock(), Some(p) if command.starts_with(p.as_str()));
        if rejected {
            return Ok(ChaosResponse {
                code: 406,
                success: false,
                result: None,
                error: Some("rejected".to_string()),
            });
        }

        Ok(ChaosResponse {
            code: 200,
            success: true,
            result: Some(serde_json::Value::String(format!("handle-{}", commands.len()))),
            error: None,
        })
    }
}
