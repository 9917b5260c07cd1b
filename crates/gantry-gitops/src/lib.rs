//! Argo CD control plane and application rollout for gantry
//!
//! This crate provides:
//! - The control plane installer (bootstrap manifest, operator and server
//!   readiness)
//! - The root deployer (root Application plus its expected children)
//! - The staged sync orchestrator, walking a fixed order one application at a
//!   time and never failing on individual timeouts
//! - The sync policy toggler and repository configuration

#![deny(missing_docs)]

pub mod application;
pub mod installer;
pub mod policy;
pub mod repo;
pub mod root;
pub mod stages;
pub mod sync;

pub use application::{AppStatus, HealthStatus, SyncStatus};
pub use installer::{ControlPlaneInstaller, InstallReport, InstallerConfig};
pub use policy::{set_sync_policy_all, AutomationFlag, ToggleReport};
pub use repo::{configure_repo, RepoConfig, RepoReport};
pub use root::{RootDeployer, RootDeployerConfig};
pub use stages::{EXPECTED_CHILDREN, SYNC_ORDER};
pub use sync::{StagedSync, SyncOutcome, SyncReport};

/// Default namespace of Argo CD and its Applications
pub const DEFAULT_GITOPS_NAMESPACE: &str = "openshift-gitops";

/// Default namespace the GitOps operator is installed into
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "openshift-gitops-operator";

/// Deployment serving the Argo CD API
pub const SERVER_DEPLOYMENT: &str = "openshift-gitops-server";

/// Name of the root Application every other Application hangs off
pub const ROOT_APPLICATION: &str = "root";

/// Bootstrap manifest file name
pub const BOOTSTRAP_FILE: &str = "gitops-bootstrap.yaml";

/// Root Application manifest file name
pub const ROOT_APPLICATION_FILE: &str = "root-application.yaml";
