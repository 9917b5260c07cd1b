//! Object store backed by the Kubernetes API using kube-rs
//!
//! All resources are handled as `DynamicObject`s built from [`Kind`]
//! constants, so no discovery round-trips are needed. `apply` uses
//! server-side apply with a forced field manager, which makes re-applying the
//! same manifest a no-op apart from bookkeeping.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use serde_json::Value;
use tracing::{debug, trace};

use crate::store::{name_of, Kind, ObjectRef, ObjectStore, Selector};
use crate::{Error, Result, FIELD_MANAGER};

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// [`ObjectStore`] talking to a live API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using an explicit kubeconfig, or the inferred config
    /// (`KUBECONFIG`, `~/.kube/config`, in-cluster) when `None`
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let mut config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::internal_with_context(
                        "connect",
                        format!("failed to read kubeconfig {}: {}", path.display(), e),
                    )
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        Error::internal_with_context(
                            "connect",
                            format!("failed to load kubeconfig: {}", e),
                        )
                    })?
            }
            None => Config::infer().await.map_err(|e| {
                Error::internal_with_context("connect", format!("failed to infer config: {}", e))
            })?,
        };
        config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
        config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

        let client = Client::try_from(config).map_err(|e| {
            Error::internal_with_context("connect", format!("failed to create client: {}", e))
        })?;
        Ok(Self::new(client))
    }

    fn api(&self, kind: &Kind, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource(kind.api_version, kind.kind, kind.plural);
        match namespace {
            Some(ns) if kind.namespaced => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }
}

/// Build an ApiResource without discovery
fn api_resource(api_version: &str, kind: &str, plural: &str) -> ApiResource {
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    };
    ApiResource {
        group,
        version,
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        plural: plural.to_string(),
    }
}

/// Pluralize a resource kind for kinds gantry does not know up front
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

fn map_kube_err(operation: &str, e: kube::Error) -> Error {
    match e {
        kube::Error::Api(ae) if ae.code == 401 => Error::Unauthorized {
            message: ae.message,
        },
        e => {
            trace!(operation, error = %e, "kube call failed");
            Error::from(e)
        }
    }
}

fn to_value(obj: DynamicObject) -> Result<Value> {
    serde_json::to_value(obj).map_err(Error::from)
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>> {
        let obj = self
            .api(kind, namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_kube_err("get", e))?;
        obj.map(to_value).transpose()
    }

    async fn apply(&self, manifest: &Value) -> Result<Value> {
        let target = ObjectRef::from_manifest(manifest)?;
        let ar = match Kind::lookup(&target.api_version, &target.kind) {
            Some(kind) => api_resource(kind.api_version, kind.kind, kind.plural),
            None => api_resource(
                &target.api_version,
                &target.kind,
                &pluralize_kind(&target.kind),
            ),
        };
        let api: Api<DynamicObject> = match &target.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };

        let applied = api
            .patch(
                &target.name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(manifest),
            )
            .await
            .map_err(|e| map_kube_err("apply", e))?;
        debug!(object = %target, "applied");
        to_value(applied)
    }

    async fn patch(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        let patched = self
            .api(kind, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| map_kube_err("patch", e))?;
        to_value(patched)
    }

    async fn delete(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        selector: Selector<'_>,
    ) -> Result<usize> {
        let api = self.api(kind, namespace);
        let names: Vec<String> = match selector {
            Selector::Name(name) => vec![name.to_string()],
            Selector::Labels(labels) => api
                .list(&ListParams::default().labels(labels))
                .await
                .map_err(|e| map_kube_err("delete", e))?
                .items
                .into_iter()
                .filter_map(|obj| obj.metadata.name)
                .collect(),
        };

        let mut deleted = 0;
        for name in names {
            match api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => deleted += 1,
                Err(kube::Error::Api(ae)) if ae.code == 404 => {
                    debug!(kind = kind.kind, name = %name, "already deleted");
                }
                Err(e) => return Err(map_kube_err("delete", e)),
            }
        }
        Ok(deleted)
    }

    async fn list(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let list = self
            .api(kind, namespace)
            .list(&params)
            .await
            .map_err(|e| map_kube_err("list", e))?;

        let mut objects = Vec::with_capacity(list.items.len());
        for item in list.items {
            let mut value = to_value(item)?;
            // List items come back without type information
            if value.get("kind").is_none() {
                value["apiVersion"] = Value::String(kind.api_version.to_string());
                value["kind"] = Value::String(kind.kind.to_string());
            }
            if name_of(&value).is_some() {
                objects.push(value);
            }
        }
        Ok(objects)
    }
}
