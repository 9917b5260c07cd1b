//! Common types for gantry: the object store contract, errors, and utilities

#![deny(missing_docs)]

pub mod conditions;
pub mod error;
pub mod kube_store;
#[cfg(any(test, feature = "testkit"))]
pub mod memory;
pub mod pipeline;
pub mod poll;
pub mod retry;
pub mod store;
pub mod telemetry;
pub mod template;
pub mod yaml;

pub use error::Error;
pub use store::{Kind, LabelSelector, ObjectStore, Selector};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "gantry";

/// Label key marking objects rendered and owned by gantry
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Label value for [`LABEL_MANAGED_BY`]
pub const LABEL_MANAGED_BY_GANTRY: &str = "gantry";

/// Label selector matching every object gantry manages
pub const MANAGED_SELECTOR: &str = "app.kubernetes.io/managed-by=gantry";

/// Namespace holding MachineSets, Machines and MachineAutoscalers
pub const MACHINE_API_NAMESPACE: &str = "openshift-machine-api";
