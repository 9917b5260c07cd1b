//! Node queries and master dedication

use std::time::Duration;

use gantry_common::conditions::node_ready;
use gantry_common::poll::{poll_until, Readiness};
use gantry_common::store::{labels_of, name_of};
use gantry_common::{Error, Kind, ObjectStore, Result};
use serde_json::{json, Value};
use tracing::info;

use crate::{NODE_ROLE_LABEL_PREFIX, WORKER_ROLE_LABEL};

/// Selects nodes that are workers and not masters
pub const DEDICATED_WORKER_SELECTOR: &str =
    "node-role.kubernetes.io/worker,!node-role.kubernetes.io/master";

/// Selects masters that still carry the worker role
pub const SCHEDULABLE_MASTER_SELECTOR: &str =
    "node-role.kubernetes.io/master,node-role.kubernetes.io/worker";

/// Name, roles and readiness of one node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSummary {
    /// Node name
    pub name: String,
    /// Roles from `node-role.kubernetes.io/*` labels, sorted
    pub roles: Vec<String>,
    /// Whether the Ready condition is True
    pub ready: bool,
}

impl NodeSummary {
    /// Summarize a Node object
    pub fn from_node(node: &Value) -> Self {
        let roles = labels_of(node)
            .keys()
            .filter_map(|k| k.strip_prefix(NODE_ROLE_LABEL_PREFIX))
            .map(str::to_string)
            .collect();
        Self {
            name: name_of(node).unwrap_or_default().to_string(),
            roles,
            ready: node_ready(node),
        }
    }
}

/// Every node, summarized
pub async fn list_nodes(store: &dyn ObjectStore) -> Result<Vec<NodeSummary>> {
    Ok(store
        .list(&Kind::NODE, None, None)
        .await?
        .iter()
        .map(NodeSummary::from_node)
        .collect())
}

/// Count Ready nodes matching a label selector
pub async fn count_ready(store: &dyn ObjectStore, selector: &str) -> Result<usize> {
    Ok(store
        .list(&Kind::NODE, None, Some(selector))
        .await?
        .iter()
        .filter(|n| node_ready(n))
        .count())
}

/// Block until at least one node carrying `node-role.kubernetes.io/<role>`
/// is Ready
pub async fn wait_for_role_ready(
    store: &dyn ObjectStore,
    role: &str,
    timeout: Duration,
    interval: Duration,
) -> Readiness {
    let selector = format!("{}{}", NODE_ROLE_LABEL_PREFIX, role);
    let description = format!("{} node Ready", role);
    poll_until(&description, interval, timeout, || async {
        Ok(count_ready(store, &selector).await? > 0)
    })
    .await
}

/// Remove the worker role from masters once dedicated workers exist.
///
/// Refuses, without touching any node, when no dedicated worker is Ready.
/// Returns the resulting node list.
pub async fn dedicate_masters(store: &dyn ObjectStore) -> Result<Vec<NodeSummary>> {
    let ready_workers = count_ready(store, DEDICATED_WORKER_SELECTOR).await?;
    if ready_workers == 0 {
        return Err(Error::NoReadyWorkers);
    }
    info!(ready_workers, "dedicated workers are Ready, removing worker role from masters");

    let masters = store
        .list(&Kind::NODE, None, Some(SCHEDULABLE_MASTER_SELECTOR))
        .await?;
    let patch = json!({"metadata": {"labels": {WORKER_ROLE_LABEL: null}}});
    for master in &masters {
        if let Some(name) = name_of(master) {
            store.patch(&Kind::NODE, None, name, &patch).await?;
            info!(node = %name, "removed {}", WORKER_ROLE_LABEL);
        }
    }
    if masters.is_empty() {
        info!("no master carries {}, nothing to do", WORKER_ROLE_LABEL);
    }

    list_nodes(store).await
}

/// Whether a node summary is a master
pub fn is_master(node: &NodeSummary) -> bool {
    node.roles.iter().any(|r| r == "master")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Map, Value};

    /// A node with the given roles and readiness
    pub fn node(name: &str, roles: &[&str], ready: bool) -> Value {
        let labels: Map<String, Value> = roles
            .iter()
            .map(|r| (format!("node-role.kubernetes.io/{}", r), json!("")))
            .collect();
        let status = if ready { "True" } else { "False" };
        json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"name": name, "labels": labels},
            "status": {"conditions": [
                {"type": "Ready", "status": status}
            ]}
        })
    }
}
