//! Remote transports.
//!
//! Two ways of reaching the cluster:
//!
//! - [`RemoteTransport`]: a shell session on the cluster CLI host. Manifests are
//!   copied over and applied with the cluster CLI. [`SshTransport`] drives the
//!   system `ssh`/`scp` binaries over a multiplexed control connection.
//! - [`ChaosEndpoint`]: an injection agent answering
//!   `GET /chaosblade?cmd=<command>`. [`HttpChaosEndpoint`] uses `reqwest`.

use crate::config::{EndpointConfig, RemoteHost, SshConfig};
use crate::error::{FaultlineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

// ============================================================================
// Shell sessions
// ============================================================================

/// Output of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Stdout, line by line.
    pub stdout: Vec<String>,
    /// Stderr, line by line.
    pub stderr: Vec<String>,
    /// Exit code; `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Opens sessions on remote hosts.
#[async_trait::async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Open a session on `target`.
    async fn connect(&self, target: &RemoteHost) -> Result<Box<dyn RemoteSession>>;
}

/// An open session on a remote host.
#[async_trait::async_trait]
pub trait RemoteSession: Send {
    /// Copy a local file to `remote_path`, creating its directory.
    async fn put_file(&mut self, local: &Path, remote_path: &str) -> Result<()>;

    /// Run `command`, draining and logging its output until it exits.
    async fn exec(&mut self, command: &str) -> Result<ExecOutput>;

    /// Close the session.
    async fn close(&mut self) -> Result<()>;
}

/// Transport over the system OpenSSH client.
pub struct SshTransport {
    config: SshConfig,
}

impl SshTransport {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl RemoteTransport for SshTransport {
    async fn connect(&self, target: &RemoteHost) -> Result<Box<dyn RemoteSession>> {
        let control_path = std::env::temp_dir().join(format!(
            "faultline-{}",
            &uuid::Uuid::new_v4().simple().to_string()[..12]
        ));
        let session = SshSession {
            target: target.clone(),
            config: self.config.clone(),
            control_path,
        };

        debug!(host = %target, "Opening SSH control connection");
        let status = session
            .command("ssh")
            .args(["-o", "ControlMaster=yes", "-o", "ControlPersist=yes", "-f", "-N"])
            .args(session.login_args())
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| FaultlineError::Connect {
                host: target.to_string(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(FaultlineError::Connect {
                host: target.to_string(),
                reason: format!("ssh exited with {}", status),
            });
        }

        info!(host = %target, "Connected");
        Ok(Box::new(session))
    }
}

/// One multiplexed SSH connection.
struct SshSession {
    target: RemoteHost,
    config: SshConfig,
    control_path: PathBuf,
}

impl SshSession {
    fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.kill_on_drop(true);
        if let Some(identity) = &self.config.identity_file {
            cmd.arg("-i").arg(identity);
        }
        for option in &self.config.options {
            cmd.arg("-o").arg(option);
        }
        cmd.arg("-o").arg("BatchMode=yes");
        cmd.arg("-o").arg(format!(
            "ConnectTimeout={}",
            self.config.connect_timeout.as_secs().max(1)
        ));
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()));
        cmd
    }

    fn login_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(user) = &self.target.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        args.push(self.target.host.clone());
        args
    }

    fn scp_destination(&self, remote_path: &str) -> String {
        format!("{}:{}", self.target, remote_path)
    }
}

#[async_trait::async_trait]
impl RemoteSession for SshSession {
    async fn put_file(&mut self, local: &Path, remote_path: &str) -> Result<()> {
        if let Some(parent) = Path::new(remote_path).parent() {
            let mkdir = format!("mkdir -p {}", parent.display());
            let output = self.exec(&mkdir).await?;
            if !output.success() {
                return Err(FaultlineError::Exec {
                    command: mkdir,
                    exit_code: output.exit_code,
                });
            }
        }

        debug!(host = %self.target, local = %local.display(), remote_path, "Uploading file");
        let status = self
            .command("scp")
            .arg("-q")
            .arg(local)
            .arg(self.scp_destination(remote_path))
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| FaultlineError::Upload {
                path: local.display().to_string(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(FaultlineError::Upload {
                path: local.display().to_string(),
                reason: format!("scp exited with {}", status),
            });
        }
        Ok(())
    }

    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        info!(host = %self.target, command, "Executing remote command");

        let io_error = |e: std::io::Error| FaultlineError::Connect {
            host: self.target.to_string(),
            reason: e.to_string(),
        };

        let mut child = self
            .command("ssh")
            .args(self.login_args())
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_error)?;

        let (stdout, stderr) = tokio::join!(
            drain_lines(child.stdout.take(), &self.target, OutputStream::Stdout),
            drain_lines(child.stderr.take(), &self.target, OutputStream::Stderr),
        );
        let status = child.wait().await.map_err(io_error)?;
        debug!(host = %self.target, command, status = %status, "Remote command finished");

        Ok(ExecOutput {
            stdout: stdout.map_err(io_error)?,
            stderr: stderr.map_err(io_error)?,
            exit_code: status.code(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        let status = self
            .command("ssh")
            .args(["-O", "exit"])
            .args(self.login_args())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            warn!(host = %self.target, "SSH control connection did not exit cleanly");
        }
        debug!(host = %self.target, "Session closed");
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Read `pipe` to the end, logging each line. Invalid UTF-8 is replaced, not
/// rejected; a command that already ran must not fail on its output.
async fn drain_lines<R>(
    pipe: Option<R>,
    host: &RemoteHost,
    stream: OutputStream,
) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    let Some(pipe) = pipe else {
        return Ok(lines);
    };

    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(|c: char| c == '\n' || c == '\r')
            .to_string();
        match stream {
            OutputStream::Stdout => info!(host = %host, "{}", line),
            OutputStream::Stderr => warn!(host = %host, "{}", line),
        }
        lines.push(line);
    }
    Ok(lines)
}

// ============================================================================
// Injection endpoint
// ============================================================================

/// Response of the injection agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosResponse {
    pub code: i64,
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChaosResponse {
    /// Fault handle carried in `result`, used by `destroy <handle>`.
    pub fn handle(&self) -> Option<String> {
        match self.result.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Turn an unsuccessful response into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(FaultlineError::Injection {
                code: self.code,
                error: self.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}

/// Decode an agent reply. The JSON body wins over the HTTP status, which is
/// only reported when the body cannot be decoded.
fn parse_response(status: reqwest::StatusCode, body: &str) -> Result<ChaosResponse> {
    match serde_json::from_str::<ChaosResponse>(body) {
        Ok(response) => Ok(response),
        Err(e) if status.is_success() => Err(e.into()),
        Err(_) => Err(FaultlineError::Http(format!("agent replied {}", status))),
    }
}

/// Sends commands to an injection agent.
#[async_trait::async_trait]
pub trait ChaosEndpoint: Send + Sync {
    async fn send(&self, host: &str, port: u16, command: &str) -> Result<ChaosResponse>;
}

/// Injection agent client over HTTP.
pub struct HttpChaosEndpoint {
    client: reqwest::Client,
}

impl HttpChaosEndpoint {
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ChaosEndpoint for HttpChaosEndpoint {
    async fn send(&self, host: &str, port: u16, command: &str) -> Result<ChaosResponse> {
        let url = format!("http://{}:{}/chaosblade", host, port);
        debug!(url = %url, command, "Sending injection command");

        let response = self
            .client
            .get(&url)
            .query(&[("cmd", command)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let response = parse_response(status, &body)?;

        info!(
            host,
            command,
            code = response.code,
            success = response.success,
            "Injection endpoint responded"
        );
        Ok(response)
    }
}
