//! Compute pool management for gantry
//!
//! This crate provides:
//! - Platform discovery (infra id, cloud platform) and access checks
//! - The pool provisioner: derive a MachineSet from an existing reference
//!   pool, apply it, register autoscaling, and block until a node is Ready
//! - Master dedication, replica scaling, and teardown of managed pools
//! - Registry configuration (pull secret merge, image mirror policies) and the
//!   catalog image refresh trigger

#![deny(missing_docs)]

pub mod autoscaler;
pub mod catalog;
pub mod machineset;
pub mod nodes;
pub mod platform;
pub mod provision;
pub mod registry;
pub mod scale;
pub mod teardown;

pub use machineset::{pool_name, ReferenceAttributes, EXCLUDED_REFERENCE_PATTERNS};
pub use nodes::{dedicate_masters, NodeSummary};
pub use platform::{ClusterInfo, SUPPORTED_PLATFORM};
pub use provision::{PoolRole, ProvisionReport, ProvisionRequest, Provisioner};
pub use scale::{scale_pool, ReplicaChange};

/// Label prefix for node roles (`node-role.kubernetes.io/<role>`)
pub const NODE_ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";

/// Node role label carried by control plane nodes
pub const MASTER_ROLE_LABEL: &str = "node-role.kubernetes.io/master";

/// Node role label carried by schedulable workers
pub const WORKER_ROLE_LABEL: &str = "node-role.kubernetes.io/worker";
