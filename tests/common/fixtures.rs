// Cluster properties and fault templates shared by the integration tests

/// Three zones, zone1 leads, six storage pods.
pub const CLUSTER_PROPERTIES: &str = "\
# three-zone cluster
sys.k8scli = root@k8s-master
sys.namespace = oceanbase
sys.zones = zone1, zone2, zone3
sys.leaderzone = zone1
sys.zone1.pods = p1, p2
sys.zone2.pods = p3, p4
sys.zone3.pods = p5, p6
sys.storage.pods = p1, p2, p3, p4, p5, p6
sys.compute.pods = p2, p4, p6
sys.selector = app=observer
sys.faults = leader_kill.yaml, follower_delay.yaml
db.url = jdbc:mysql://127.0.0.1:2881/test
";

/// Kill every storage pod of the leader zone for 30 seconds.
pub const LEADER_KILL: &str = "\
duration: 30s
template: pod_chaos.yaml
action: pod-kill
pods: $zone.leader-storage-0
";

/// Delay the network of one follower storage pod.
pub const FOLLOWER_DELAY: &str = "\
duration: 10s
command: create network delay --time 3000 --interface eth0
host: $zone.follower-storage-1
";

/// PodChaos manifest with fault fields and cluster properties as placeholders.
pub const POD_CHAOS: &str = "\
apiVersion: chaos-mesh.org/v1alpha1
kind: PodChaos
metadata:
  name: faultline-pod-chaos
  namespace: $NAMESPACE
spec:
  action: $action
  mode: all
  duration: $duration
  labelSelectors: $SELECTOR
  selector:
    pods:
      $NAMESPACE: $pods
";

/// Properties with `extra` lines appended.
pub fn properties_with(extra: &str) -> String {
    format!("{}{}\n", CLUSTER_PROPERTIES, extra)
}
