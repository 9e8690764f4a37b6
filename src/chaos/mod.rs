//! Fault resolution and lifecycle engine.
//!
//! Turns declarative fault descriptions into concrete faults against a live
//! cluster, applies them, and recovers them after their duration.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Fault Campaign                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Fault Compiler          │  Lifecycle Driver                │
//! │  load → duration → scope │  apply → schedule → recover      │
//! │  → substitute → render   │                                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Topology │ Scope │ Placeholders │ Documents │ Transports   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use faultline::chaos::{FaultCompiler, LifecycleDriver, Topology};
//!
//! let topology = Arc::new(Topology::from_config(&cluster)?);
//! let compiler = FaultCompiler::new(topology, &cluster, &config);
//! let driver = LifecycleDriver::new(transport, endpoint, &config);
//!
//! let fault = compiler.compile("pod-kill.yaml")?;
//! if let Some(mut handle) = driver.apply(fault).await? {
//!     handle.wait().await;
//! }
//! ```

pub mod duration;
pub mod placeholder;
pub mod scope;
pub mod store;
pub mod topology;

mod campaign;
mod compiler;
mod lifecycle;
mod transport;

pub use campaign::{CampaignReport, FaultCampaign, FaultFailure};
pub use compiler::{CommandFault, CompiledFault, FaultCompiler, ManifestFault};
pub use duration::{format_duration_ms, parse_duration_ms, parse_duration_ms_or, DurationUnit};
pub use lifecycle::{LifecycleDriver, RecoveryHandle, RecoveryOutcome};
pub use placeholder::{Replacement, ReplacementTable};
pub use store::DocumentStore;
pub use topology::{Topology, TopologyBuilder};
pub use transport::{
    ChaosEndpoint, ChaosResponse, ExecOutput, HttpChaosEndpoint, RemoteSession, RemoteTransport,
    SshTransport,
};
