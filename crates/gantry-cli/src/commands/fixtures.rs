//! Cluster objects shared by command tests

use std::path::PathBuf;

use gantry_common::memory::MemoryStore;
use serde_json::{json, Value};

/// Manifests shipped with the repository
pub fn shipped_manifests() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../manifests")
}

pub fn infrastructure() -> Value {
    json!({
        "apiVersion": "config.openshift.io/v1",
        "kind": "Infrastructure",
        "metadata": {"name": "cluster"},
        "status": {
            "infrastructureName": "demo-x7k2p",
            "platformStatus": {"type": "AWS", "aws": {"region": "us-east-2"}}
        }
    })
}

pub fn worker_machineset(name: &str, zone: &str) -> Value {
    json!({
        "apiVersion": "machine.openshift.io/v1beta1",
        "kind": "MachineSet",
        "metadata": {"name": name, "namespace": "openshift-machine-api"},
        "spec": {
            "replicas": 2,
            "template": {"spec": {"providerSpec": {"value": {
                "placement": {"region": "us-east-2", "availabilityZone": zone},
                "ami": {"id": "ami-0abc"},
                "subnet": {"filters": [{"name": "tag:Name", "values": ["demo-subnet"]}]},
                "iamInstanceProfile": {"id": "demo-worker-profile"},
                "securityGroups": [{"filters": [{"name": "tag:Name", "values": ["demo-sg"]}]}]
            }}}}
        },
        "status": {"replicas": 2, "readyReplicas": 2, "availableReplicas": 2}
    })
}

pub fn node(name: &str, roles: &[&str], ready: bool) -> Value {
    let labels: serde_json::Map<String, Value> = roles
        .iter()
        .map(|r| (format!("node-role.kubernetes.io/{}", r), json!("")))
        .collect();
    let status = if ready { "True" } else { "False" };
    json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": {"name": name, "labels": labels},
        "status": {"conditions": [{"type": "Ready", "status": status}]}
    })
}

pub fn application(name: &str, sync: &str, health: &str) -> Value {
    json!({
        "apiVersion": "argoproj.io/v1alpha1",
        "kind": "Application",
        "metadata": {"name": name, "namespace": "openshift-gitops"},
        "spec": {"project": "default"},
        "status": {"sync": {"status": sync}, "health": {"status": health}}
    })
}

/// An AWS cluster with three masters that still take workloads and one
/// installer-created worker pool
pub fn aws_cluster() -> MemoryStore {
    let store = MemoryStore::new();
    store.seed([
        infrastructure(),
        worker_machineset("demo-x7k2p-worker-us-east-2a", "us-east-2a"),
        node("master-0", &["master", "worker"], true),
        node("master-1", &["master", "worker"], true),
        node("master-2", &["master", "worker"], true),
    ]);
    store
}
