//! Fault compilation.
//!
//! Turns a named fault description into a [`CompiledFault`]:
//!
//! 1. load the fault description from the template directory
//! 2. parse its `duration`
//! 3. resolve scope placeholders and collect cluster properties
//! 4. substitute them into the fault description
//! 5. render the manifest template it names (or, for endpoint faults, read
//!    the `command` and `host`) and persist the result
//!
//! The manifest is substituted twice: first with the fault description's own
//! fields (so `$action` picks up `action:`), then with the scope/property
//! table for whatever the description does not set.

use super::duration::parse_duration_ms;
use super::placeholder::{discover, substitute, Replacement, ReplacementTable};
use super::scope::{self, is_scope_expression};
use super::store::DocumentStore;
use super::topology::Topology;
use crate::config::{ClusterConfig, EngineConfig, RemoteHost};
use crate::error::{FaultlineError, Result};
use crate::observability;
use serde_yaml::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A manifest rendered to disk, deployed through the cluster CLI host.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFault {
    pub name: String,
    pub remote_host: RemoteHost,
    pub manifest_path: PathBuf,
    pub duration_ms: i64,
}

/// A command sent to an injection agent over HTTP.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFault {
    pub name: String,
    pub endpoint_host: String,
    pub endpoint_port: u16,
    pub command: String,
    pub duration_ms: i64,
}

/// A fault ready to be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledFault {
    Manifest(ManifestFault),
    Command(CommandFault),
}

impl CompiledFault {
    pub fn name(&self) -> &str {
        match self {
            CompiledFault::Manifest(f) => &f.name,
            CompiledFault::Command(f) => &f.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CompiledFault::Manifest(_) => "manifest",
            CompiledFault::Command(_) => "command",
        }
    }

    pub fn duration_ms(&self) -> i64 {
        match self {
            CompiledFault::Manifest(f) => f.duration_ms,
            CompiledFault::Command(f) => f.duration_ms,
        }
    }

    /// Delay before recovery, or `None` when no recovery is scheduled.
    pub fn recovery_delay(&self) -> Option<Duration> {
        u64::try_from(self.duration_ms())
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Compiles fault descriptions against a topology.
pub struct FaultCompiler {
    topology: Arc<Topology>,
    remote_host: Option<RemoteHost>,
    endpoint_port: u16,
    templates: DocumentStore,
    manifests: DocumentStore,
    output: DocumentStore,
}

impl FaultCompiler {
    pub fn new(topology: Arc<Topology>, cluster: &ClusterConfig, config: &EngineConfig) -> Self {
        Self {
            topology,
            remote_host: cluster.remote_host.clone(),
            endpoint_port: config.endpoint.port,
            templates: DocumentStore::new(&config.paths.template_dir),
            manifests: DocumentStore::new(config.paths.manifest_dir()),
            output: DocumentStore::new(&config.paths.fault_dir),
        }
    }

    /// Compile the fault description called `fault_name`.
    pub fn compile(&self, fault_name: &str) -> Result<CompiledFault> {
        info!(fault = %fault_name, "Compiling fault");

        let description = self.templates.load(fault_name)?;
        if !description.is_mapping() {
            return Err(FaultlineError::InvalidTemplate(format!(
                "fault description {} is not a mapping",
                fault_name
            )));
        }

        let duration_ms = match description.get("duration") {
            Some(Value::String(s)) => parse_duration_ms(s)?,
            Some(other) => {
                return Err(FaultlineError::InvalidDuration(format!("{:?}", other)));
            }
            None => return Err(FaultlineError::MissingField("duration".to_string())),
        };
        debug!(fault = %fault_name, duration_ms, "Parsed fault duration");

        let table = self.replacement_table(fault_name, &description)?;
        let fault = substitute(&description, &table);

        let compiled = if let Some(template) = fault.get("template") {
            let template = template.as_str().ok_or_else(|| {
                FaultlineError::InvalidTemplate("`template` must be a file name".to_string())
            })?;
            let manifest_path = self.render_manifest(fault_name, template, &fault, &table)?;
            let remote_host = self
                .remote_host
                .clone()
                .ok_or_else(|| FaultlineError::MissingProperty("sys.k8scli".to_string()))?;

            CompiledFault::Manifest(ManifestFault {
                name: fault_name.to_string(),
                remote_host,
                manifest_path,
                duration_ms,
            })
        } else if let Some(command) = fault.get("command") {
            let command = command.as_str().ok_or_else(|| {
                FaultlineError::InvalidTemplate("`command` must be a string".to_string())
            })?;
            let endpoint_host = single_target(fault.get("host"))?;

            CompiledFault::Command(CommandFault {
                name: fault_name.to_string(),
                endpoint_host,
                endpoint_port: self.endpoint_port,
                command: command.to_string(),
                duration_ms,
            })
        } else {
            return Err(FaultlineError::MissingField("template".to_string()));
        };

        observability::record_fault_compiled();
        info!(fault = %fault_name, duration_ms, "Compiled fault");
        Ok(compiled)
    }

    /// Scope resolutions for every scope placeholder of `document` (and one
    /// pod for `$RANDOMPOD`), plus every cluster property as `$UPPERCASED_KEY`.
    pub fn replacement_table(&self, fault_name: &str, document: &Value) -> Result<ReplacementTable> {
        let mut table = ReplacementTable::new();

        for token in discover(document) {
            if table.contains(&token) {
                continue;
            }
            if token == scope::RANDOM_POD {
                let pod = scope::random_pod(&self.topology)?;
                info!(fault = %fault_name, pod = %pod, "Picked random pod");
                table.insert(token, Replacement::Scalar(pod));
            } else if is_scope_expression(&token) {
                let pods = scope::resolve(&self.topology, &token)?;
                info!(fault = %fault_name, scope = %token, pods = ?pods, "Resolved scope");
                table.insert(token, Replacement::PodList(pods));
            }
        }

        for (key, value) in self.topology.properties() {
            table.insert(
                format!("${}", key.to_uppercase()),
                Replacement::from_property(value),
            );
        }

        Ok(table)
    }

    fn render_manifest(
        &self,
        fault_name: &str,
        template: &str,
        fault: &Value,
        table: &ReplacementTable,
    ) -> Result<PathBuf> {
        debug!(fault = %fault_name, template, "Rendering manifest");

        let manifest = self.manifests.load(template)?;
        let manifest = substitute(&manifest, &ReplacementTable::from_document(fault));
        let manifest = substitute(&manifest, table);

        let leftover = discover(&manifest);
        if !leftover.is_empty() {
            warn!(fault = %fault_name, placeholders = ?leftover, "Manifest has unresolved placeholders");
        }

        let path = self.output.save(fault_name, &manifest)?;
        info!(fault = %fault_name, path = %path.display(), "Wrote manifest");
        Ok(path)
    }
}

fn single_target(host: Option<&Value>) -> Result<String> {
    match host {
        Some(Value::String(host)) => Ok(host.clone()),
        Some(Value::Sequence(hosts)) if hosts.len() == 1 => hosts[0]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FaultlineError::InvalidTemplate("`host` must be a string".to_string())),
        Some(other) => Err(FaultlineError::InvalidTemplate(format!(
            "`host` must resolve to exactly one target, got {:?}",
            other
        ))),
        None => Err(FaultlineError::MissingField("host".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: EngineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = EngineConfig::default();
            config.paths.template_dir = dir.path().join("FaultTemplates");
            config.paths.fault_dir = dir.path().join("faults");
            fs::create_dir_all(config.paths.manifest_dir()).unwrap();
            Self { _dir: dir, config }
        }

        fn fault(&self, name: &str, body: &str) {
            fs::write(self.config.paths.template_dir.join(name), body).unwrap();
        }

        fn manifest(&self, name: &str, body: &str) {
            fs::write(self.config.paths.manifest_dir().join(name), body).unwrap();
        }

        fn compiler(&self) -> FaultCompiler {
            let topology = Topology::builder()
                .zone("zone1", &["p1", "p2"])
                .zone("zone2", &["p3", "p4"])
                .leader("zone1")
                .role(Role::Storage, &["p1", "p2", "p3", "p4"])
                .property("namespace", "oceanbase")
                .build()
                .unwrap();
            let cluster = ClusterConfig {
                remote_host: Some("root@k8s".parse().unwrap()),
                ..Default::default()
            };
            FaultCompiler::new(Arc::new(topology), &cluster, &self.config)
        }
    }

    #[test]
    fn test_compile_manifest() {
        let fx = Fixture::new();
        fx.fault(
            "kill.yaml",
            "duration: 30s\ntemplate: pod.yaml\naction: pod-kill\npods: $zone.leader-storage-0\n",
        );
        fx.manifest(
            "pod.yaml",
            "kind: PodChaos\nmetadata:\n  namespace: $NAMESPACE\nspec:\n  action: $action\n  duration: $duration\n  selector:\n    pods: $pods\n",
        );

        let compiled = fx.compiler().compile("kill.yaml").unwrap();
        let CompiledFault::Manifest(fault) = compiled else {
            panic!("expected manifest fault");
        };
        assert_eq!(fault.duration_ms, 30_000);
        assert_eq!(fault.remote_host.to_string(), "root@k8s");

        let rendered: Value =
            serde_yaml::from_str(&fs::read_to_string(&fault.manifest_path).unwrap()).unwrap();
        let expected: Value = serde_yaml::from_str(
            "kind: PodChaos\nmetadata:\n  namespace: oceanbase\nspec:\n  action: pod-kill\n  duration: 30s\n  selector:\n    pods: [p1, p2]\n",
        )
        .unwrap();
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_compile_command() {
        let fx = Fixture::new();
        fx.fault(
            "delay.yaml",
            "duration: 10s\ncommand: create network delay --time 3000\nhost: $zone.follower-storage-1\n",
        );

        let compiled = fx.compiler().compile("delay.yaml").unwrap();
        let CompiledFault::Command(fault) = compiled else {
            panic!("expected command fault");
        };
        assert_eq!(fault.endpoint_port, 9526);
        assert_eq!(fault.command, "create network delay --time 3000");
        assert!(fault.endpoint_host == "p3" || fault.endpoint_host == "p4");
    }

    #[test]
    fn test_random_pod_host() {
        let fx = Fixture::new();
        fx.fault(
            "loss.yaml",
            "duration: 5s\ncommand: create network loss --percent 50\nhost: $RANDOMPOD\n",
        );

        let CompiledFault::Command(fault) = fx.compiler().compile("loss.yaml").unwrap() else {
            panic!("expected command fault");
        };
        assert!(["p1", "p2", "p3", "p4"].contains(&fault.endpoint_host.as_str()));
    }

    #[test]
    fn test_missing_duration() {
        let fx = Fixture::new();
        fx.fault("bad.yaml", "template: pod.yaml\n");
        assert!(matches!(
            fx.compiler().compile("bad.yaml"),
            Err(FaultlineError::MissingField(f)) if f == "duration"
        ));
    }

    #[test]
    fn test_missing_template_field() {
        let fx = Fixture::new();
        fx.fault("bad.yaml", "duration: 1s\n");
        assert!(matches!(
            fx.compiler().compile("bad.yaml"),
            Err(FaultlineError::MissingField(f)) if f == "template"
        ));
    }

    #[test]
    fn test_missing_manifest_template() {
        let fx = Fixture::new();
        fx.fault("kill.yaml", "duration: 1s\ntemplate: absent.yaml\n");
        assert!(matches!(
            fx.compiler().compile("kill.yaml"),
            Err(FaultlineError::TemplateNotFound(_))
        ));
        assert!(!fx.config.paths.fault_dir.join("kill.yaml").exists());
    }

    #[test]
    fn test_scope_error_aborts() {
        let fx = Fixture::new();
        fx.fault("kill.yaml", "duration: 1s\ntemplate: pod.yaml\npods: $zone.leader-test-0\n");
        fx.manifest("pod.yaml", "pods: $pods\n");
        assert!(matches!(
            fx.compiler().compile("kill.yaml"),
            Err(FaultlineError::RoleNotConfigured(_))
        ));
    }

    #[test]
    fn test_multi_host_command_rejected() {
        let fx = Fixture::new();
        fx.fault(
            "delay.yaml",
            "duration: 10s\ncommand: create cpu load\nhost: $zone.leader-storage-0\n",
        );
        assert!(matches!(
            fx.compiler().compile("delay.yaml"),
            Err(FaultlineError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_recovery_delay() {
        let fault = CompiledFault::Command(CommandFault {
            name: "x".into(),
            endpoint_host: "h".into(),
            endpoint_port: 1,
            command: "c".into(),
            duration_ms: 0,
        });
        assert_eq!(fault.recovery_delay(), None);
    }
}
