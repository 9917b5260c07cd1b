//! Object store contract
//!
//! Every component talks to the cluster through [`ObjectStore`], received
//! explicitly rather than through a global client. Objects are plain
//! `serde_json::Value`s shaped like Kubernetes resources (`apiVersion`, `kind`,
//! `metadata`, `spec`, `status`), so the same component code runs against the
//! API server ([`crate::kube_store::KubeStore`]) or an in-memory store in tests.
//!
//! Every mutation is idempotent: `apply` is an upsert keyed by
//! kind + namespace + name, `patch` is a JSON merge patch, and deleting
//! something that is already gone is not an error.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Error, Result};

/// A resource kind with enough information to address it without discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Kind {
    /// Full API version (e.g. "apps/v1", "v1")
    pub api_version: &'static str,
    /// Resource kind (e.g. "Deployment")
    pub kind: &'static str,
    /// Lowercase plural used in API paths (e.g. "deployments")
    pub plural: &'static str,
    /// Whether objects of this kind live in a namespace
    pub namespaced: bool,
}

impl Kind {
    /// Cluster-wide infrastructure description (`cluster` singleton)
    pub const INFRASTRUCTURE: Kind = Kind::cluster_scoped(
        "config.openshift.io/v1",
        "Infrastructure",
        "infrastructures",
    );
    /// Scalable compute pool
    pub const MACHINE_SET: Kind =
        Kind::namespaced("machine.openshift.io/v1beta1", "MachineSet", "machinesets");
    /// Single machine backing a node
    pub const MACHINE: Kind =
        Kind::namespaced("machine.openshift.io/v1beta1", "Machine", "machines");
    /// Cluster-level autoscaler singleton
    pub const CLUSTER_AUTOSCALER: Kind = Kind::cluster_scoped(
        "autoscaling.openshift.io/v1",
        "ClusterAutoscaler",
        "clusterautoscalers",
    );
    /// Per-pool autoscaler
    pub const MACHINE_AUTOSCALER: Kind = Kind::namespaced(
        "autoscaling.openshift.io/v1beta1",
        "MachineAutoscaler",
        "machineautoscalers",
    );
    /// Cluster node
    pub const NODE: Kind = Kind::cluster_scoped("v1", "Node", "nodes");
    /// Pod
    pub const POD: Kind = Kind::namespaced("v1", "Pod", "pods");
    /// Namespace
    pub const NAMESPACE: Kind = Kind::cluster_scoped("v1", "Namespace", "namespaces");
    /// Secret
    pub const SECRET: Kind = Kind::namespaced("v1", "Secret", "secrets");
    /// Deployment
    pub const DEPLOYMENT: Kind = Kind::namespaced("apps/v1", "Deployment", "deployments");
    /// Operator install record
    pub const CLUSTER_SERVICE_VERSION: Kind = Kind::namespaced(
        "operators.coreos.com/v1alpha1",
        "ClusterServiceVersion",
        "clusterserviceversions",
    );
    /// Argo CD application
    pub const APPLICATION: Kind =
        Kind::namespaced("argoproj.io/v1alpha1", "Application", "applications");

    /// Every kind gantry addresses by name
    pub const KNOWN: &'static [Kind] = &[
        Kind::INFRASTRUCTURE,
        Kind::MACHINE_SET,
        Kind::MACHINE,
        Kind::CLUSTER_AUTOSCALER,
        Kind::MACHINE_AUTOSCALER,
        Kind::NODE,
        Kind::POD,
        Kind::NAMESPACE,
        Kind::SECRET,
        Kind::DEPLOYMENT,
        Kind::CLUSTER_SERVICE_VERSION,
        Kind::APPLICATION,
    ];

    /// Define a namespaced kind
    pub const fn namespaced(
        api_version: &'static str,
        kind: &'static str,
        plural: &'static str,
    ) -> Self {
        Self {
            api_version,
            kind,
            plural,
            namespaced: true,
        }
    }

    /// Define a cluster-scoped kind
    pub const fn cluster_scoped(
        api_version: &'static str,
        kind: &'static str,
        plural: &'static str,
    ) -> Self {
        Self {
            api_version,
            kind,
            plural,
            namespaced: false,
        }
    }

    /// API group ("" for the core group)
    pub fn group(&self) -> &'static str {
        match self.api_version.split_once('/') {
            Some((group, _)) => group,
            None => "",
        }
    }

    /// API version without the group
    pub fn version(&self) -> &'static str {
        match self.api_version.split_once('/') {
            Some((_, version)) => version,
            None => self.api_version,
        }
    }

    /// Find a known kind by apiVersion and kind
    pub fn lookup(api_version: &str, kind: &str) -> Option<Kind> {
        Self::KNOWN
            .iter()
            .find(|k| k.api_version == api_version && k.kind == kind)
            .copied()
    }
}

/// Which objects a delete targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector<'a> {
    /// A single object by name
    Name(&'a str),
    /// Every object matching a label selector (e.g. "app=foo,!bar")
    Labels(&'a str),
}

/// Abstract object store backing every component.
///
/// `namespace` is `None` for cluster-scoped kinds; for `list` on a namespaced
/// kind it means "all namespaces".
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get an object, `Ok(None)` when it does not exist
    async fn get(&self, kind: &Kind, namespace: Option<&str>, name: &str)
        -> Result<Option<Value>>;

    /// Create or replace an object identified by its apiVersion, kind,
    /// metadata.namespace and metadata.name
    async fn apply(&self, manifest: &Value) -> Result<Value>;

    /// Apply a JSON merge patch to an existing object
    async fn patch(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value>;

    /// Delete matching objects, returning how many were deleted
    async fn delete(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        selector: Selector<'_>,
    ) -> Result<usize>;

    /// List objects, optionally filtered by a label selector
    async fn list(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>>;
}

// =============================================================================
// Object accessors
// =============================================================================

/// `metadata.name` of an object
pub fn name_of(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/name").and_then(Value::as_str)
}

/// `metadata.namespace` of an object
pub fn namespace_of(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/namespace").and_then(Value::as_str)
}

/// `metadata.labels` of an object as a map (empty when absent)
pub fn labels_of(obj: &Value) -> BTreeMap<String, String> {
    obj.pointer("/metadata/labels")
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// String value at a JSON pointer
pub fn str_at<'a>(obj: &'a Value, pointer: &str) -> Option<&'a str> {
    obj.pointer(pointer).and_then(Value::as_str)
}

/// Identity of a manifest: what `apply` upserts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    /// Full API version
    pub api_version: String,
    /// Resource kind
    pub kind: String,
    /// Namespace, `None` for cluster-scoped objects
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectRef {
    /// Extract the identity of a manifest
    pub fn from_manifest(manifest: &Value) -> Result<Self> {
        let api_version = str_at(manifest, "/apiVersion")
            .ok_or_else(|| Error::template("manifest missing apiVersion"))?;
        let kind =
            str_at(manifest, "/kind").ok_or_else(|| Error::template("manifest missing kind"))?;
        let name = name_of(manifest)
            .ok_or_else(|| Error::template(format!("{} manifest missing metadata.name", kind)))?;

        Ok(Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            namespace: namespace_of(manifest).map(str::to_string),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

// =============================================================================
// Label selectors
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
}

/// Parsed equality-based label selector (`a=b`, `a!=b`, `a`, `!a`, comma separated)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Parse a selector string; the empty string matches everything
    pub fn parse(selector: &str) -> Result<Self> {
        let mut requirements = Vec::new();
        for term in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let requirement = if let Some((key, value)) = term.split_once("!=") {
                Requirement::NotEquals(key.trim().to_string(), value.trim().to_string())
            } else if let Some((key, value)) = term.split_once("==") {
                Requirement::Equals(key.trim().to_string(), value.trim().to_string())
            } else if let Some((key, value)) = term.split_once('=') {
                Requirement::Equals(key.trim().to_string(), value.trim().to_string())
            } else if let Some(key) = term.strip_prefix('!') {
                Requirement::NotExists(key.trim().to_string())
            } else {
                Requirement::Exists(term.to_string())
            };

            let key = match &requirement {
                Requirement::Equals(k, _)
                | Requirement::NotEquals(k, _)
                | Requirement::Exists(k)
                | Requirement::NotExists(k) => k,
            };
            if key.is_empty() {
                return Err(Error::validation(format!(
                    "invalid label selector '{}'",
                    selector
                )));
            }
            requirements.push(requirement);
        }
        Ok(Self { requirements })
    }

    /// Whether a label set satisfies every requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| match req {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::NotExists(k) => !labels.contains_key(k),
        })
    }
}
