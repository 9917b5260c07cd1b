//! Git repository configuration for Argo CD

use gantry_common::store::ObjectRef;
use gantry_common::{Error, Kind, ObjectStore, Result, LABEL_MANAGED_BY, LABEL_MANAGED_BY_GANTRY};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::ROOT_APPLICATION;

/// Label that makes Argo CD pick up a Secret as repository credentials
pub const REPOSITORY_SECRET_LABEL: &str = "argocd.argoproj.io/secret-type";

/// Name of the repository Secret gantry manages
pub const REPOSITORY_SECRET_NAME: &str = "gantry-repository";

/// Repository the root Application tracks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoConfig {
    /// Clone URL
    pub url: String,
    /// Branch, tag or commit
    pub revision: String,
    /// Basic auth user, if the repository is private
    pub username: Option<String>,
    /// Basic auth password or token
    pub token: Option<String>,
}

impl RepoConfig {
    /// Public repository at `url` tracking `main`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: "main".to_string(),
            username: None,
            token: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::validation("repository URL is empty"));
        }
        if self.revision.trim().is_empty() {
            return Err(Error::validation("repository revision is empty"));
        }
        if self.username.is_some() != self.token.is_some() {
            return Err(Error::validation(
                "repository username and token must be given together",
            ));
        }
        Ok(())
    }

    /// Repository Secret manifest
    pub fn secret(&self, namespace: &str) -> Value {
        let mut data = Map::new();
        data.insert("type".to_string(), json!("git"));
        data.insert("url".to_string(), json!(self.url));
        if let (Some(username), Some(token)) = (&self.username, &self.token) {
            data.insert("username".to_string(), json!(username));
            data.insert("password".to_string(), json!(token));
        }

        json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": REPOSITORY_SECRET_NAME,
                "namespace": namespace,
                "labels": {
                    REPOSITORY_SECRET_LABEL: "repository",
                    LABEL_MANAGED_BY: LABEL_MANAGED_BY_GANTRY,
                }
            },
            "type": "Opaque",
            "stringData": data,
        })
    }
}

/// What [`configure_repo`] changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoReport {
    /// The repository Secret
    pub secret: ObjectRef,
    /// Whether the root Application was repointed
    pub root_updated: bool,
}

/// Register the repository with Argo CD and point the root Application at it
/// when it already exists
pub async fn configure_repo(
    store: &dyn ObjectStore,
    namespace: &str,
    repo: &RepoConfig,
) -> Result<RepoReport> {
    repo.validate()?;

    let secret = repo.secret(namespace);
    let target = ObjectRef::from_manifest(&secret)?;
    store.apply(&secret).await?;
    info!(secret = %target, url = %repo.url, "repository registered");

    let root_updated = match store
        .get(&Kind::APPLICATION, Some(namespace), ROOT_APPLICATION)
        .await?
    {
        Some(_) => {
            let patch = json!({
                "spec": {"source": {"repoURL": repo.url, "targetRevision": repo.revision}}
            });
            store
                .patch(&Kind::APPLICATION, Some(namespace), ROOT_APPLICATION, &patch)
                .await?;
            info!(revision = %repo.revision, "root application repointed");
            true
        }
        None => {
            info!("root application not deployed yet, leaving it alone");
            false
        }
    };

    Ok(RepoReport {
        secret: target,
        root_updated,
    })
}
