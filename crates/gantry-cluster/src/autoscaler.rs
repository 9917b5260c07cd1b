//! Cluster and per-pool autoscalers

use gantry_common::{
    Kind, ObjectStore, Result, LABEL_MANAGED_BY, LABEL_MANAGED_BY_GANTRY, MACHINE_API_NAMESPACE,
};
use serde_json::{json, Value};
use tracing::info;

/// Name of the ClusterAutoscaler singleton
pub const CLUSTER_AUTOSCALER_NAME: &str = "default";

/// Create the ClusterAutoscaler singleton if it does not exist.
///
/// Returns whether it was created. An existing one is left untouched so
/// operator-tuned settings survive.
pub async fn ensure_cluster_autoscaler(store: &dyn ObjectStore) -> Result<bool> {
    if store
        .get(&Kind::CLUSTER_AUTOSCALER, None, CLUSTER_AUTOSCALER_NAME)
        .await?
        .is_some()
    {
        return Ok(false);
    }

    store.apply(&cluster_autoscaler()).await?;
    info!("created ClusterAutoscaler {}", CLUSTER_AUTOSCALER_NAME);
    Ok(true)
}

fn cluster_autoscaler() -> Value {
    json!({
        "apiVersion": Kind::CLUSTER_AUTOSCALER.api_version,
        "kind": Kind::CLUSTER_AUTOSCALER.kind,
        "metadata": {
            "name": CLUSTER_AUTOSCALER_NAME,
            "labels": {LABEL_MANAGED_BY: LABEL_MANAGED_BY_GANTRY}
        },
        "spec": {
            "podPriorityThreshold": -10,
            "scaleDown": {
                "enabled": true,
                "delayAfterAdd": "10m",
                "unneededTime": "5m"
            }
        }
    })
}

/// MachineAutoscaler bound 1:1 to a MachineSet of the same name
pub fn machine_autoscaler(pool: &str, min: u32, max: u32) -> Value {
    json!({
        "apiVersion": Kind::MACHINE_AUTOSCALER.api_version,
        "kind": Kind::MACHINE_AUTOSCALER.kind,
        "metadata": {
            "name": pool,
            "namespace": MACHINE_API_NAMESPACE,
            "labels": {LABEL_MANAGED_BY: LABEL_MANAGED_BY_GANTRY}
        },
        "spec": {
            "minReplicas": min,
            "maxReplicas": max,
            "scaleTargetRef": {
                "apiVersion": Kind::MACHINE_SET.api_version,
                "kind": Kind::MACHINE_SET.kind,
                "name": pool
            }
        }
    })
}

/// Create or update the MachineAutoscaler for a pool
pub async fn apply_machine_autoscaler(
    store: &dyn ObjectStore,
    pool: &str,
    min: u32,
    max: u32,
) -> Result<()> {
    store.apply(&machine_autoscaler(pool, min, max)).await?;
    info!(pool, min, max, "MachineAutoscaler applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_common::memory::{MemoryStore, Verb};

    #[tokio::test]
    async fn cluster_autoscaler_created_only_when_absent() {
        let store = MemoryStore::new();

        assert!(ensure_cluster_autoscaler(&store).await.unwrap());
        assert!(!ensure_cluster_autoscaler(&store).await.unwrap());

        assert_eq!(store.count(&Kind::CLUSTER_AUTOSCALER), 1);
        assert_eq!(
            store.targets(Verb::Apply, &Kind::CLUSTER_AUTOSCALER),
            vec!["default"]
        );
    }

    #[tokio::test]
    async fn existing_cluster_autoscaler_is_not_touched() {
        let store = MemoryStore::new();
        store.seed([json!({
            "apiVersion": "autoscaling.openshift.io/v1",
            "kind": "ClusterAutoscaler",
            "metadata": {"name": "default"},
            "spec": {"podPriorityThreshold": 0}
        })]);

        assert!(!ensure_cluster_autoscaler(&store).await.unwrap());
        let existing = store.peek(&Kind::CLUSTER_AUTOSCALER, None, "default").unwrap();
        assert_eq!(existing["spec"]["podPriorityThreshold"], 0);
    }

    #[tokio::test]
    async fn machine_autoscaler_updates_in_place() {
        let store = MemoryStore::new();
        apply_machine_autoscaler(&store, "demo-gpu-us-east-2a", 1, 3)
            .await
            .unwrap();
        apply_machine_autoscaler(&store, "demo-gpu-us-east-2a", 2, 5)
            .await
            .unwrap();

        assert_eq!(store.count(&Kind::MACHINE_AUTOSCALER), 1);
        let ma = store
            .peek(
                &Kind::MACHINE_AUTOSCALER,
                Some(MACHINE_API_NAMESPACE),
                "demo-gpu-us-east-2a",
            )
            .unwrap();
        assert_eq!(ma["spec"]["minReplicas"], 2);
        assert_eq!(ma["spec"]["maxReplicas"], 5);
        assert_eq!(ma["spec"]["scaleTargetRef"]["name"], "demo-gpu-us-east-2a");
    }
}
