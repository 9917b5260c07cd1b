//! Root Application deployer

use std::path::PathBuf;
use std::time::Duration;

use gantry_common::conditions::deployment_available;
use gantry_common::poll::{poll_until, poll_until_deadline, Deadline};
use gantry_common::store::ObjectRef;
use gantry_common::template::render_file;
use gantry_common::{Error, Kind, ObjectStore, Result};
use tracing::{info, warn};

use crate::stages::EXPECTED_CHILDREN;
use crate::{DEFAULT_GITOPS_NAMESPACE, ROOT_APPLICATION_FILE, SERVER_DEPLOYMENT};

/// Naming and timing for the root deploy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootDeployerConfig {
    /// Namespace of Argo CD and its Applications
    pub gitops_namespace: String,
    /// Argo CD server Deployment that must be Available first
    pub server_deployment: String,
    /// Children the root Application must create
    pub expected: Vec<String>,
    /// Budget for the server precondition
    pub server_timeout: Duration,
    /// One budget shared by all expected children
    pub children_timeout: Duration,
    /// Interval between checks
    pub interval: Duration,
    /// `${VAR}` values for the root manifest
    pub vars: Vec<(String, String)>,
}

impl Default for RootDeployerConfig {
    fn default() -> Self {
        Self {
            gitops_namespace: DEFAULT_GITOPS_NAMESPACE.to_string(),
            server_deployment: SERVER_DEPLOYMENT.to_string(),
            expected: EXPECTED_CHILDREN.iter().map(|s| s.to_string()).collect(),
            server_timeout: Duration::from_secs(300),
            children_timeout: Duration::from_secs(600),
            interval: Duration::from_secs(10),
            vars: Vec::new(),
        }
    }
}

/// Applies the root Application and waits for its children
pub struct RootDeployer<'a> {
    store: &'a dyn ObjectStore,
    manifests_dir: PathBuf,
    config: RootDeployerConfig,
}

impl<'a> RootDeployer<'a> {
    /// Create a deployer reading the root manifest from `manifests_dir`
    pub fn new(
        store: &'a dyn ObjectStore,
        manifests_dir: impl Into<PathBuf>,
        config: RootDeployerConfig,
    ) -> Self {
        Self {
            store,
            manifests_dir: manifests_dir.into(),
            config,
        }
    }

    async fn application_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .store
            .get(&Kind::APPLICATION, Some(&self.config.gitops_namespace), name)
            .await?
            .is_some())
    }

    /// Deploy the root Application; returns what was applied.
    ///
    /// Fails hard when the server is not Available in time or an expected
    /// child does not appear before the shared deadline.
    pub async fn deploy(&self) -> Result<Vec<ObjectRef>> {
        let docs = render_file(
            &self.manifests_dir.join(ROOT_APPLICATION_FILE),
            &self.config.vars,
        )?;

        let namespace = self.config.gitops_namespace.as_str();
        let deployment = self.config.server_deployment.as_str();
        let server = poll_until(
            "Argo CD server Available",
            self.config.interval,
            self.config.server_timeout,
            || async move {
                let deploy = self
                    .store
                    .get(&Kind::DEPLOYMENT, Some(namespace), deployment)
                    .await?;
                Ok(deploy.as_ref().is_some_and(deployment_available))
            },
        )
        .await;
        if !server.is_ready() {
            return Err(Error::timeout(
                format!("Deployment {}/{} Available", namespace, deployment),
                self.config.server_timeout,
            ));
        }

        let mut applied = Vec::with_capacity(docs.len());
        for doc in &docs {
            let target = ObjectRef::from_manifest(doc)?;
            self.store.apply(doc).await?;
            info!(object = %target, "applied root manifest");
            applied.push(target);
        }

        // One deadline for the whole list, started before the first check.
        // A slow early child leaves later ones with whatever budget remains,
        // possibly none.
        // TODO: decide whether each child should get its own budget.
        let deadline = Deadline::start(self.config.children_timeout);
        for (i, name) in self.config.expected.iter().enumerate() {
            info!(
                app = %name,
                remaining_secs = deadline.remaining().as_secs(),
                "waiting for application ({}/{})",
                i + 1,
                self.config.expected.len()
            );
            let appeared = poll_until_deadline(
                name,
                self.config.interval,
                &deadline,
                || self.application_exists(name),
            )
            .await;
            if !appeared.is_ready() {
                warn!(app = %name, "expected application did not appear");
                return Err(Error::timeout(
                    format!("Application {}/{} to be created", namespace, name),
                    self.config.children_timeout,
                ));
            }
        }

        info!(count = self.config.expected.len(), "all expected applications exist");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fixtures::application;
    use gantry_common::memory::{MemoryStore, Verb};
    use serde_json::{json, Value};
    use tokio::time::Instant;

    const ROOT: &str = r#"apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: root
  namespace: openshift-gitops
spec:
  project: default
  source:
    repoURL: ${REPO_URL:=https://example.com/platform.git}
    path: apps
"#;

    fn manifests() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ROOT_APPLICATION_FILE), ROOT).unwrap();
        dir
    }

    fn server(available: bool) -> Value {
        let status = if available { "True" } else { "False" };
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "openshift-gitops-server", "namespace": "openshift-gitops"},
            "status": {"conditions": [{"type": "Available", "status": status}]}
        })
    }

    fn config(expected: &[&str], children_timeout: u64) -> RootDeployerConfig {
        RootDeployerConfig {
            expected: expected.iter().map(|s| s.to_string()).collect(),
            children_timeout: Duration::from_secs(children_timeout),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn applies_root_and_finds_children() {
        let dir = manifests();
        let store = MemoryStore::new();
        store.seed([
            server(true),
            application("a", "Synced", "Healthy"),
            application("b", "Unknown", "Missing"),
        ]);

        let applied = RootDeployer::new(&store, dir.path(), config(&["a", "b"], 600))
            .deploy()
            .await
            .unwrap();

        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].name, "root");
        let root = store
            .peek(&Kind::APPLICATION, Some("openshift-gitops"), "root")
            .unwrap();
        assert_eq!(
            root["spec"]["source"]["repoURL"],
            "https://example.com/platform.git"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_server_is_a_hard_failure() {
        let dir = manifests();
        let store = MemoryStore::new();
        store.seed([server(false)]);

        let err = RootDeployer::new(&store, dir.path(), config(&["a"], 600))
            .deploy()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(store.targets(Verb::Apply, &Kind::APPLICATION).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shared_deadline_fails_before_checking_later_children() {
        let dir = manifests();
        let store = MemoryStore::new();
        // b and c exist; a never appears
        store.seed([
            server(true),
            application("b", "Synced", "Healthy"),
            application("c", "Synced", "Healthy"),
        ]);
        let start = Instant::now();

        let err = RootDeployer::new(&store, dir.path(), config(&["a", "b", "c"], 60))
            .deploy()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        let checked = store.targets(Verb::Get, &Kind::APPLICATION);
        assert!(checked.iter().all(|name| name == "a"));
        assert!(!checked.is_empty());
    }

    /// Makes `a` appear 50s into the wait
    struct SlowFirstChild {
        inner: MemoryStore,
        start: Instant,
    }

    #[async_trait::async_trait]
    impl ObjectStore for SlowFirstChild {
        async fn get(&self, kind: &Kind, ns: Option<&str>, name: &str) -> Result<Option<Value>> {
            if name == "a" && self.start.elapsed() >= Duration::from_secs(50) {
                self.inner.insert(application("a", "Unknown", "Missing"));
            }
            self.inner.get(kind, ns, name).await
        }

        async fn apply(&self, manifest: &Value) -> Result<Value> {
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
    async fn later_children_only_get_the_remaining_budget() {
        let dir = manifests();
        let inner = MemoryStore::new();
        inner.seed([server(true)]);
        let store = SlowFirstChild {
            inner,
            start: Instant::now(),
        };

        // a shows up at 50s of a 60s budget; b never does and gets the last 10s
        let err = RootDeployer::new(&store, dir.path(), config(&["a", "b"], 60))
            .deploy()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Application openshift-gitops/b"));
        assert_eq!(store.start.elapsed(), Duration::from_secs(60));
    }
}
