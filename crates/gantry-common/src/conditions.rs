//! Status condition helpers over untyped objects

use serde_json::Value;

/// Condition status value meaning the condition holds
pub const STATUS_TRUE: &str = "True";

/// Check if a condition of the given type has status "True"
///
/// Works on anything using the standard `status.conditions` list (nodes,
/// pods, deployments).
pub fn has_condition(obj: &Value, condition_type: &str) -> bool {
    obj.pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(|conds| {
            conds.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some(condition_type)
                    && c.get("status").and_then(Value::as_str) == Some(STATUS_TRUE)
            })
        })
        .unwrap_or(false)
}

/// Node has `Ready=True`
pub fn node_ready(node: &Value) -> bool {
    has_condition(node, "Ready")
}

/// Pod has `Ready=True`
pub fn pod_ready(pod: &Value) -> bool {
    has_condition(pod, "Ready")
}

/// Deployment has `Available=True`
pub fn deployment_available(deployment: &Value) -> bool {
    has_condition(deployment, "Available")
}
