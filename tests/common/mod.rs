//! Common test utilities for integration tests.

pub mod fixtures;
pub mod mocks;

use faultline::chaos::{FaultCompiler, LifecycleDriver, Topology};
use faultline::config::{ClusterConfig, EngineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub use fixtures::*;
pub use mocks::*;

/// Test environment with template, manifest and output directories.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config: EngineConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let mut config = EngineConfig::default();
        config.paths.template_dir = temp_dir.path().join("FaultTemplates");
        config.paths.fault_dir = temp_dir.path().join("faults");

        std::fs::create_dir_all(config.paths.manifest_dir())
            .expect("Failed to create manifest dir");

        Self { temp_dir, config }
    }

    pub fn fault_dir(&self) -> &PathBuf {
        &self.config.paths.fault_dir
    }

    /// Write a fault description into the template directory.
    pub fn write_fault(&self, name: &str, body: &str) {
        std::fs::write(self.config.paths.template_dir.join(name), body)
            .expect("Failed to write fault description");
    }

    /// Write a manifest template.
    pub fn write_manifest(&self, name: &str, body: &str) {
        std::fs::write(self.config.paths.manifest_dir().join(name), body)
            .expect("Failed to write manifest template");
    }

    /// Write a cluster properties file and return its path.
    pub fn write_properties(&self, body: &str) -> PathBuf {
        let path = self.temp_dir.path().join("cluster.properties");
        std::fs::write(&path, body).expect("Failed to write properties");
        path
    }

    /// Load cluster properties and build a compiler over them.
    pub fn compiler(&self, properties: &str) -> (ClusterConfig, FaultCompiler) {
        let path = self.write_properties(properties);
        let cluster = ClusterConfig::load(&path).expect("Failed to load properties");
        let topology = Arc::new(Topology::from_config(&cluster).expect("Invalid topology"));
        let compiler = FaultCompiler::new(topology, &cluster, &self.config);
        (cluster, compiler)
    }

    /// A driver over recording mocks.
    pub fn driver(&self, transport: &RecordingTransport, endpoint: &RecordingEndpoint) -> LifecycleDriver {
        LifecycleDriver::new(
            Arc::new(transport.clone()),
            Arc::new(endpoint.clone()),
            &self.config,
        )
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Let spawned tasks run without advancing paused time.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_creation() {
        let env = TestEnv::new();
        assert!(env.config.paths.manifest_dir().exists());
        assert!(!env.fault_dir().exists());
    }
}
