//! faultline - fault resolution and lifecycle engine for chaos testing.
//!
//! faultline turns declarative fault descriptions into concrete faults against
//! a live, zone-partitioned cluster, applies them, and recovers them after their
//! configured duration.
//!
//! # Features
//!
//! - **Scope expressions**: `$zone.leader-storage-0` and friends select pods by
//!   zone, role and count.
//! - **Template substitution**: `$TOKEN` placeholders in YAML documents are
//!   replaced by scalars, pod lists, or fields of the fault description.
//! - **Two delivery paths**: manifests applied through the cluster CLI host over
//!   SSH, or commands sent to an injection agent over HTTP.
//! - **Timed recovery**: every fault with a duration is recovered on its own
//!   task; recoveries can be fired early or cancelled.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         faultline                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI: resolve | compile | inject                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Campaign: compile all → warm-up → apply each               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Compiler: scope | placeholders | documents                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Lifecycle: SSH sessions | injection endpoint | recovery    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use faultline::chaos::{FaultCompiler, Topology};
//! use faultline::config::{ClusterConfig, EngineConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! fn main() -> faultline::Result<()> {
//!     let config = EngineConfig::load(None)?;
//!     let cluster = ClusterConfig::load(Path::new("cluster.properties"))?;
//!     let topology = Arc::new(Topology::from_config(&cluster)?);
//!
//!     let compiler = FaultCompiler::new(topology, &cluster, &config);
//!     for fault in &cluster.faults {
//!         println!("{:?}", compiler.compile(fault)?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod chaos;
pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{FaultlineError, Result};
