//! CLI commands

use std::fmt::Display;
use std::path::PathBuf;

use gantry_common::ObjectStore;

use crate::{Error, Result};

pub mod check;
pub mod clean;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod format;
pub mod gitops;
pub mod masters;
pub mod pipelines;
pub mod pool;
pub mod refresh;
pub mod registry;
pub mod repo;
pub mod scale;
pub mod status;
pub mod validate;

/// Extension trait to convert errors with Display to CLI Error::CommandFailed.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}

/// Everything a command needs to reach the cluster
pub struct Context<'a> {
    /// Cluster access
    pub store: &'a dyn ObjectStore,
    /// Directory holding the manifest templates
    pub manifests_dir: PathBuf,
    /// Namespace of Argo CD and its Applications
    pub gitops_namespace: String,
    /// Namespace the GitOps operator is installed into
    pub operator_namespace: String,
}

#[cfg(test)]
impl<'a> Context<'a> {
    pub(crate) fn for_tests(store: &'a dyn ObjectStore, manifests_dir: &std::path::Path) -> Self {
        Self {
            store,
            manifests_dir: manifests_dir.to_path_buf(),
            gitops_namespace: gantry_gitops::DEFAULT_GITOPS_NAMESPACE.to_string(),
            operator_namespace: gantry_gitops::DEFAULT_OPERATOR_NAMESPACE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_err_keeps_the_message() {
        let failed: std::result::Result<(), &str> = Err("boom");
        let err = failed.cmd_err().unwrap_err();
        assert!(matches!(err, Error::CommandFailed { ref message } if message == "boom"));
    }
}
