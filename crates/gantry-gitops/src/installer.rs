//! Control plane installer
//!
//! Installs the GitOps operator from the bootstrap manifest and waits for it,
//! in five independently timed steps:
//!
//! 1. Apply every bootstrap document, retrying the whole set every 10s with
//!    no overall deadline until the API server accepts all of them. Documents
//!    for CRDs the operator has not registered yet are rejected until it has.
//! 2. Poll (60 attempts) for the operator's ClusterServiceVersion to succeed
//! 3. Poll (30 attempts) for the gitops namespace to exist
//! 4. Poll (300s) for the Argo CD server Deployment to be Available
//! 5. Re-apply the bootstrap documents once
//!
//! Steps 2 to 4 are soft: a miss is logged and the install carries on, since
//! the root deployer checks server availability itself before using it.

use std::path::PathBuf;
use std::time::Duration;

use gantry_common::conditions::deployment_available;
use gantry_common::poll::{poll_attempts, poll_until, Probe, Settled};
use gantry_common::retry::{retry, RetryPolicy};
use gantry_common::store::{name_of, str_at};
use gantry_common::template::render_file;
use gantry_common::{Kind, ObjectStore, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    BOOTSTRAP_FILE, DEFAULT_GITOPS_NAMESPACE, DEFAULT_OPERATOR_NAMESPACE, SERVER_DEPLOYMENT,
};

/// Timing and naming for the install
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallerConfig {
    /// Namespace the operator is installed into
    pub operator_namespace: String,
    /// Namespace the operator creates for Argo CD
    pub gitops_namespace: String,
    /// Prefix of the operator's ClusterServiceVersion name
    pub csv_prefix: String,
    /// Argo CD server Deployment
    pub server_deployment: String,
    /// Interval between bootstrap apply attempts
    pub apply_retry_interval: Duration,
    /// Operator CSV checks
    pub csv_attempts: u32,
    /// Interval between CSV checks
    pub csv_interval: Duration,
    /// Namespace existence checks
    pub namespace_attempts: u32,
    /// Interval between namespace checks
    pub namespace_interval: Duration,
    /// Budget for server availability
    pub server_timeout: Duration,
    /// Interval between server checks
    pub server_interval: Duration,
    /// `${VAR}` values for the bootstrap manifest
    pub vars: Vec<(String, String)>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            gitops_namespace: DEFAULT_GITOPS_NAMESPACE.to_string(),
            csv_prefix: "openshift-gitops-operator".to_string(),
            server_deployment: SERVER_DEPLOYMENT.to_string(),
            apply_retry_interval: Duration::from_secs(10),
            csv_attempts: 60,
            csv_interval: Duration::from_secs(10),
            namespace_attempts: 30,
            namespace_interval: Duration::from_secs(5),
            server_timeout: Duration::from_secs(300),
            server_interval: Duration::from_secs(10),
            vars: Vec::new(),
        }
    }
}

/// Which soft checks passed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Bootstrap documents applied per pass
    pub documents: usize,
    /// Apply passes until every document was accepted
    pub apply_attempts: u32,
    /// Operator CSV reached Succeeded
    pub operator_succeeded: bool,
    /// Gitops namespace exists
    pub namespace_ready: bool,
    /// Argo CD server is Available
    pub server_available: bool,
}

/// Installs the Argo CD control plane
pub struct ControlPlaneInstaller<'a> {
    store: &'a dyn ObjectStore,
    manifests_dir: PathBuf,
    config: InstallerConfig,
}

impl<'a> ControlPlaneInstaller<'a> {
    /// Create an installer reading the bootstrap manifest from `manifests_dir`
    pub fn new(
        store: &'a dyn ObjectStore,
        manifests_dir: impl Into<PathBuf>,
        config: InstallerConfig,
    ) -> Self {
        Self {
            store,
            manifests_dir: manifests_dir.into(),
            config,
        }
    }

    async fn apply_all(&self, docs: &[Value]) -> Result<()> {
        for doc in docs {
            self.store.apply(doc).await?;
        }
        Ok(())
    }

    async fn operator_probe(&self) -> Result<Probe> {
        let csvs = self
            .store
            .list(
                &Kind::CLUSTER_SERVICE_VERSION,
                Some(&self.config.operator_namespace),
                None,
            )
            .await?;
        let phase = csvs
            .iter()
            .find(|csv| name_of(csv).is_some_and(|n| n.starts_with(&self.config.csv_prefix)))
            .and_then(|csv| str_at(csv, "/status/phase"));
        Ok(match phase {
            Some("Succeeded") => Probe::Ready,
            Some("Failed") => Probe::Terminal("operator ClusterServiceVersion phase Failed".into()),
            _ => Probe::Pending,
        })
    }

    /// Run the install
    pub async fn install(&self) -> Result<InstallReport> {
        let docs = render_file(&self.manifests_dir.join(BOOTSTRAP_FILE), &self.config.vars)?;
        let mut report = InstallReport {
            documents: docs.len(),
            ..Default::default()
        };

        info!("[Phase 1] Applying bootstrap manifest ({} documents)", docs.len());
        report.apply_attempts = retry(
            RetryPolicy::unbounded(self.config.apply_retry_interval),
            "apply bootstrap manifest",
            || self.apply_all(&docs),
        )
        .await?
        .attempts;

        info!("[Phase 2] Waiting for the GitOps operator to install");
        match poll_attempts(
            "operator ClusterServiceVersion",
            self.config.csv_attempts,
            self.config.csv_interval,
            || self.operator_probe(),
        )
        .await
        {
            Settled::Ready(_) => report.operator_succeeded = true,
            Settled::Exhausted => warn!(
                attempts = self.config.csv_attempts,
                "operator did not report Succeeded, continuing"
            ),
            Settled::Terminal(reason) => {
                warn!(reason = %reason, "operator install failed, continuing")
            }
        }

        info!("[Phase 3] Waiting for namespace {}", self.config.gitops_namespace);
        let namespace = self.config.gitops_namespace.as_str();
        report.namespace_ready = poll_attempts(
            "gitops namespace",
            self.config.namespace_attempts,
            self.config.namespace_interval,
            || async move {
                let ns = self.store.get(&Kind::NAMESPACE, None, namespace).await?;
                Ok(Probe::from(ns.is_some()))
            },
        )
        .await
        .is_ready();
        if !report.namespace_ready {
            warn!(namespace, "namespace did not appear, continuing");
        }

        info!("[Phase 4] Waiting for {} to be Available", self.config.server_deployment);
        let deployment = self.config.server_deployment.as_str();
        report.server_available = poll_until(
            "Argo CD server Available",
            self.config.server_interval,
            self.config.server_timeout,
            || async move {
                let deploy = self
                    .store
                    .get(&Kind::DEPLOYMENT, Some(namespace), deployment)
                    .await?;
                Ok(deploy.as_ref().is_some_and(deployment_available))
            },
        )
        .await
        .is_ready();
        if !report.server_available {
            warn!(
                deployment,
                timeout_secs = self.config.server_timeout.as_secs(),
                "server not Available yet, continuing"
            );
        }

        info!("[Phase 5] Re-applying bootstrap manifest");
        self.apply_all(&docs).await?;

        info!(
            operator = report.operator_succeeded,
            namespace = report.namespace_ready,
            server = report.server_available,
            "control plane install finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_common::memory::{MemoryStore, Verb};
    use gantry_common::Error;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    const BOOTSTRAP: &str = r#"apiVersion: v1
kind: Namespace
metadata:
  name: openshift-gitops-operator
---
apiVersion: operators.coreos.com/v1alpha1
kind: Subscription
metadata:
  name: openshift-gitops-operator
  namespace: openshift-gitops-operator
spec:
  channel: latest
  name: openshift-gitops-operator
---
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: root
  namespace: ${GITOPS_NAMESPACE:=openshift-gitops}
spec:
  project: default
"#;

    fn manifests() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BOOTSTRAP_FILE), BOOTSTRAP).unwrap();
        dir
    }

    fn healthy_control_plane() -> Vec<Value> {
        vec![
            json!({
                "apiVersion": "operators.coreos.com/v1alpha1",
                "kind": "ClusterServiceVersion",
                "metadata": {"name": "openshift-gitops-operator.v1.14.0", "namespace": "openshift-gitops-operator"},
                "status": {"phase": "Succeeded"}
            }),
            json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "openshift-gitops"}}),
            json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "openshift-gitops-server", "namespace": "openshift-gitops"},
                "status": {"conditions": [{"type": "Available", "status": "True"}]}
            }),
        ]
    }

    #[tokio::test]
    async fn installs_and_reapplies() {
        let dir = manifests();
        let store = MemoryStore::new();
        store.seed(healthy_control_plane());

        let report = ControlPlaneInstaller::new(&store, dir.path(), InstallerConfig::default())
            .install()
            .await
            .unwrap();

        assert_eq!(
            report,
            InstallReport {
                documents: 3,
                apply_attempts: 1,
                operator_succeeded: true,
                namespace_ready: true,
                server_available: true,
            }
        );
        // applied once in phase 1 and again in phase 5
        assert_eq!(store.targets(Verb::Apply, &Kind::APPLICATION), vec!["root", "root"]);
    }

    /// Wraps the memory store and starts accepting Applications after a
    /// number of rejected applies, like a CRD registering late
    struct LateCrd {
        inner: MemoryStore,
        rejections_left: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ObjectStore for LateCrd {
        async fn get(&self, kind: &Kind, ns: Option<&str>, name: &str) -> Result<Option<Value>> {
            self.inner.get(kind, ns, name).await
        }

        async fn apply(&self, manifest: &Value) -> Result<Value> {
            if manifest["kind"] == "Application" {
                let left = self.rejections_left.load(Ordering::SeqCst);
                if left > 0 {
                    self.rejections_left.store(left - 1, Ordering::SeqCst);
                    return Err(Error::store("apply", "no matches for kind \"Application\""));
                }
            }
            self.inner.apply(manifest).await
        }

        async fn patch(
            &self,
            kind: &Kind,
            ns: Option<&str>,
            name: &str,
            patch: &Value,
        ) -> Result<Value> {
            self.inner.patch(kind, ns, name, patch).await
        }

        async fn delete(
            &self,
            kind: &Kind,
            ns: Option<&str>,
            selector: gantry_common::Selector<'_>,
        ) -> Result<usize> {
            self.inner.delete(kind, ns, selector).await
        }

        async fn list(
            &self,
            kind: &Kind,
            ns: Option<&str>,
            selector: Option<&str>,
        ) -> Result<Vec<Value>> {
            self.inner.list(kind, ns, selector).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_apply_retries_without_a_deadline() {
        let dir = manifests();
        let inner = MemoryStore::new();
        inner.seed(healthy_control_plane());
        // 500 rejections at 10s each is far beyond any other budget
        let store = LateCrd {
            inner,
            rejections_left: AtomicU32::new(500),
        };
        let start = Instant::now();

        let report = ControlPlaneInstaller::new(&store, dir.path(), InstallerConfig::default())
            .install()
            .await
            .unwrap();

        assert_eq!(report.apply_attempts, 501);
        assert!(start.elapsed() >= Duration::from_secs(5000));
        assert!(store
            .inner
            .peek(&Kind::APPLICATION, Some("openshift-gitops"), "root")
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_misses_are_soft() {
        let dir = manifests();
        let store = MemoryStore::new();
        let start = Instant::now();

        let report = ControlPlaneInstaller::new(&store, dir.path(), InstallerConfig::default())
            .install()
            .await
            .unwrap();

        assert!(!report.operator_succeeded);
        assert!(!report.namespace_ready);
        assert!(!report.server_available);
        // 59 x 10s + 29 x 5s + 300s
        assert_eq!(start.elapsed(), Duration::from_secs(590 + 145 + 300));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_operator_ends_the_csv_poll_early() {
        let dir = manifests();
        let store = MemoryStore::new();
        let mut control_plane = healthy_control_plane();
        control_plane[0]["status"]["phase"] = json!("Failed");
        store.seed(control_plane);
        let start = Instant::now();

        let report = ControlPlaneInstaller::new(&store, dir.path(), InstallerConfig::default())
            .install()
            .await
            .unwrap();

        assert!(!report.operator_succeeded);
        assert!(report.server_available);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn missing_bootstrap_manifest_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();

        let err = ControlPlaneInstaller::new(&store, dir.path(), InstallerConfig::default())
            .install()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingTemplate { .. }));
    }
}
