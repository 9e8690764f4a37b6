//! Fault compilation integration tests.
//!
//! Properties file → topology → fault description → rendered manifest.

#[allow(dead_code)]
mod common;

use common::*;
use faultline::chaos::{scope, CompiledFault, Topology};
use faultline::config::ClusterConfig;
use faultline::FaultlineError;
use serde_yaml::Value;
use std::collections::HashSet;

fn rendered(fault: &CompiledFault) -> Value {
    let CompiledFault::Manifest(manifest) = fault else {
        panic!("expected a manifest fault, got {:?}", fault);
    };
    let text = std::fs::read_to_string(&manifest.manifest_path).unwrap();
    serde_yaml::from_str(&text).unwrap()
}

// =============================================================================
// Scope Resolution
// =============================================================================

#[test]
fn test_resolve_from_properties_file() {
    let env = TestEnv::new();
    let path = env.write_properties(CLUSTER_PROPERTIES);
    let cluster = ClusterConfig::load(&path).unwrap();
    let topology = Topology::from_config(&cluster).unwrap();

    assert_eq!(
        scope::resolve(&topology, "$zone.leader-storage-0").unwrap(),
        vec!["p1", "p2"]
    );
    assert_eq!(
        scope::resolve(&topology, "$compute-0").unwrap(),
        vec!["p2", "p4", "p6"]
    );

    let follower = scope::resolve(&topology, "$zone.follower.1-storage-1").unwrap();
    assert_eq!(follower.len(), 1);
    assert!(!["p1", "p2"].contains(&follower[0].as_str()));
}

#[test]
fn test_unconfigured_role() {
    let env = TestEnv::new();
    let path = env.write_properties(CLUSTER_PROPERTIES);
    let topology = Topology::from_config(&ClusterConfig::load(&path).unwrap()).unwrap();

    let err = scope::resolve(&topology, "$zone.leader-test-1").unwrap_err();
    assert!(err.is_scope_error());
    assert!(matches!(err, FaultlineError::RoleNotConfigured(_)));
}

// =============================================================================
// Manifest Faults
// =============================================================================

#[test]
fn test_leader_kill_end_to_end() {
    let env = TestEnv::new();
    env.write_fault("leader_kill.yaml", LEADER_KILL);
    env.write_manifest("pod_chaos.yaml", POD_CHAOS);
    let (_, compiler) = env.compiler(CLUSTER_PROPERTIES);

    let fault = compiler.compile("leader_kill.yaml").unwrap();
    assert_eq!(fault.name(), "leader_kill.yaml");
    assert_eq!(fault.duration_ms(), 30_000);

    let expected: Value = serde_yaml::from_str(
        "\
apiVersion: chaos-mesh.org/v1alpha1
kind: PodChaos
metadata:
  name: faultline-pod-chaos
  namespace: oceanbase
spec:
  action: pod-kill
  mode: all
  duration: 30s
  labelSelectors:
    app: observer
  selector:
    pods:
      oceanbase: [p1, p2]
",
    )
    .unwrap();
    assert_eq!(rendered(&fault), expected);
}

#[test]
fn test_manifest_written_per_fault_name() {
    let env = TestEnv::new();
    env.write_fault("leader_kill.yaml", LEADER_KILL);
    env.write_manifest("pod_chaos.yaml", POD_CHAOS);
    let (cluster, compiler) = env.compiler(CLUSTER_PROPERTIES);

    let CompiledFault::Manifest(manifest) = compiler.compile("leader_kill.yaml").unwrap() else {
        panic!("expected a manifest fault");
    };
    assert_eq!(manifest.manifest_path, env.fault_dir().join("leader_kill.yaml"));
    assert_eq!(Some(&manifest.remote_host), cluster.remote_host.as_ref());

    // Recompiling overwrites the same file.
    compiler.compile("leader_kill.yaml").unwrap();
    assert_eq!(std::fs::read_dir(env.fault_dir()).unwrap().count(), 1);
}

#[test]
fn test_follower_zone_stable_across_faults() {
    let env = TestEnv::new();
    env.write_manifest("pod_chaos.yaml", POD_CHAOS);
    for name in ["a.yaml", "b.yaml"] {
        env.write_fault(
            name,
            "duration: 1m\ntemplate: pod_chaos.yaml\naction: pod-failure\npods: $zone.follower-storage-0\n",
        );
    }
    let (_, compiler) = env.compiler(CLUSTER_PROPERTIES);

    let pods = |fault: &CompiledFault| -> HashSet<String> {
        rendered(fault)["spec"]["selector"]["pods"]["oceanbase"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|p| p.as_str().unwrap().to_string())
            .collect()
    };

    let first = pods(&compiler.compile("a.yaml").unwrap());
    let second = pods(&compiler.compile("b.yaml").unwrap());
    assert_eq!(first, second);
    assert!(first == HashSet::from(["p3".to_string(), "p4".to_string()])
        || first == HashSet::from(["p5".to_string(), "p6".to_string()]));
}

#[test]
fn test_unresolved_placeholder_kept() {
    let env = TestEnv::new();
    env.write_fault("kill.yaml", LEADER_KILL.replace("pod_chaos", "custom").as_str());
    env.write_manifest("custom.yaml", "spec:\n  pods: $pods\n  owner: $OWNER\n");
    let (_, compiler) = env.compiler(CLUSTER_PROPERTIES);

    let doc = rendered(&compiler.compile("kill.yaml").unwrap());
    assert_eq!(doc["spec"]["owner"], Value::String("$OWNER".to_string()));
}

// =============================================================================
// Endpoint Faults
// =============================================================================

#[test]
fn test_follower_delay_command() {
    let env = TestEnv::new();
    env.write_fault("follower_delay.yaml", FOLLOWER_DELAY);
    let (_, compiler) = env.compiler(CLUSTER_PROPERTIES);

    let CompiledFault::Command(command) = compiler.compile("follower_delay.yaml").unwrap() else {
        panic!("expected a command fault");
    };
    assert_eq!(command.duration_ms, 10_000);
    assert_eq!(command.endpoint_port, env.config.endpoint.port);
    assert_eq!(command.command, "create network delay --time 3000 --interface eth0");
    assert!(["p3", "p4", "p5", "p6"].contains(&command.endpoint_host.as_str()));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_unknown_duration_unit() {
    let env = TestEnv::new();
    env.write_fault("kill.yaml", &LEADER_KILL.replace("30s", "30h"));
    env.write_manifest("pod_chaos.yaml", POD_CHAOS);
    let (_, compiler) = env.compiler(CLUSTER_PROPERTIES);

    assert!(matches!(
        compiler.compile("kill.yaml"),
        Err(FaultlineError::InvalidDuration(_))
    ));
}

#[test]
fn test_missing_fault_description() {
    let env = TestEnv::new();
    let (_, compiler) = env.compiler(CLUSTER_PROPERTIES);

    assert!(matches!(
        compiler.compile("absent.yaml"),
        Err(FaultlineError::TemplateNotFound(_))
    ));
}

#[test]
fn test_manifest_fault_needs_remote_host() {
    let env = TestEnv::new();
    env.write_fault("leader_kill.yaml", LEADER_KILL);
    env.write_manifest("pod_chaos.yaml", POD_CHAOS);
    let properties = CLUSTER_PROPERTIES.replace("sys.k8scli = root@k8s-master\n", "");
    let (_, compiler) = env.compiler(&properties);

    assert!(matches!(
        compiler.compile("leader_kill.yaml"),
        Err(FaultlineError::MissingProperty(key)) if key == "sys.k8scli"
    ));
}
