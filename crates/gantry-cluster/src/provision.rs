//! Compute pool provisioner
//!
//! Derives a new MachineSet from an existing reference pool, applies it,
//! registers autoscaling, and blocks until a node of the pool is Ready:
//!
//! 1. Discover the infra id and reference MachineSet (hard fail if none)
//! 2. Copy region, zone, image, subnet, IAM profile and security group
//! 3. Name the pool `<infraId>-<role>-<zone>`
//! 4. Render `machineset-<role>.yaml` with those values
//! 5. Stop here on dry run
//! 6. Apply the MachineSet (upsert, so re-running converges)
//! 7. Ensure the ClusterAutoscaler and apply the pool's MachineAutoscaler
//! 8. Wait for a Ready node with the pool's role label; timeout is a hard
//!    failure

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use gantry_common::store::ObjectRef;
use gantry_common::template::render_file;
use gantry_common::{
    Error, Kind, ObjectStore, Result, LABEL_MANAGED_BY, LABEL_MANAGED_BY_GANTRY,
    MACHINE_API_NAMESPACE,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::autoscaler::{apply_machine_autoscaler, ensure_cluster_autoscaler};
use crate::machineset::{find_reference, pool_name, ReferenceAttributes};
use crate::nodes::wait_for_role_ready;
use crate::platform::ClusterInfo;

/// Default time to wait for a node of a new pool to become Ready
pub const DEFAULT_NODE_READY_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Default interval between node readiness checks
pub const DEFAULT_NODE_READY_INTERVAL: Duration = Duration::from_secs(15);

/// Kind of compute pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolRole {
    /// Accelerated instances for model serving
    Gpu,
    /// General purpose instances
    Cpu,
}

impl PoolRole {
    /// Lowercase role name used in pool names and node labels
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolRole::Gpu => "gpu",
            PoolRole::Cpu => "cpu",
        }
    }

    /// Template file name for this role
    pub fn template_file(&self) -> String {
        format!("machineset-{}.yaml", self.as_str())
    }
}

impl fmt::Display for PoolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gpu" => Ok(PoolRole::Gpu),
            "cpu" => Ok(PoolRole::Cpu),
            other => Err(Error::validation(format!("unknown pool role '{}'", other))),
        }
    }
}

/// What to provision
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Pool role
    pub role: PoolRole,
    /// Cloud instance type
    pub instance_type: String,
    /// Initial replica count
    pub replicas: u32,
    /// Autoscaler lower bound
    pub min: u32,
    /// Autoscaler upper bound
    pub max: u32,
    /// Availability zone; the reference pool's zone when `None`
    pub zone: Option<String>,
    /// Root volume size in GiB
    pub volume_size: u32,
    /// Render and validate only
    pub dry_run: bool,
    /// Register autoscalers for the pool
    pub autoscale: bool,
}

impl ProvisionRequest {
    /// Built-in defaults for a role
    pub fn defaults(role: PoolRole) -> Self {
        let (instance_type, replicas, min, max, volume_size) = match role {
            PoolRole::Gpu => ("g5.2xlarge", 1, 1, 3, 200),
            PoolRole::Cpu => ("m6i.4xlarge", 1, 1, 4, 120),
        };
        Self {
            role,
            instance_type: instance_type.to_string(),
            replicas,
            min,
            max,
            zone: None,
            volume_size,
            dry_run: false,
            autoscale: true,
        }
    }

    /// Check bounds before touching the cluster
    pub fn validate(&self) -> Result<()> {
        if self.instance_type.trim().is_empty() {
            return Err(Error::validation("instance type must not be empty"));
        }
        if self.min > self.max {
            return Err(Error::validation(format!(
                "--min ({}) must not exceed --max ({})",
                self.min, self.max
            )));
        }
        if self.volume_size == 0 {
            return Err(Error::validation("volume size must be positive"));
        }
        if let Some(zone) = &self.zone {
            if zone.trim().is_empty() {
                return Err(Error::validation("--az must not be empty"));
            }
        }
        Ok(())
    }
}

/// How long to wait for the pool's first node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeWait {
    /// Overall budget
    pub timeout: Duration,
    /// Interval between checks
    pub interval: Duration,
}

impl Default for NodeWait {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_NODE_READY_TIMEOUT,
            interval: DEFAULT_NODE_READY_INTERVAL,
        }
    }
}

/// Result of a provisioning run
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionReport {
    /// Pool (MachineSet) name
    pub pool: String,
    /// Zone the pool was placed in
    pub zone: String,
    /// Reference MachineSet the attributes came from
    pub reference: String,
    /// The rendered MachineSet
    pub manifest: Value,
    /// Whether this was a dry run (nothing applied)
    pub dry_run: bool,
    /// Whether the ClusterAutoscaler singleton was created by this run
    pub cluster_autoscaler_created: bool,
}

/// Render the MachineSet for a pool from its template.
pub fn render_machineset(
    template: &Path,
    name: &str,
    infra_id: &str,
    zone: &str,
    attrs: &ReferenceAttributes,
    req: &ProvisionRequest,
) -> Result<Value> {
    let vars: Vec<(String, String)> = [
        ("NAME", name.to_string()),
        ("INFRA_ID", infra_id.to_string()),
        ("ROLE", req.role.as_str().to_string()),
        ("REGION", attrs.region.clone()),
        ("ZONE", zone.to_string()),
        ("AMI_ID", attrs.ami_id.clone()),
        ("SUBNET", attrs.subnet.clone()),
        ("IAM_PROFILE", attrs.iam_profile.clone()),
        ("SECURITY_GROUP", attrs.security_group.clone()),
        ("INSTANCE_TYPE", req.instance_type.clone()),
        ("REPLICAS", req.replicas.to_string()),
        ("VOLUME_SIZE", req.volume_size.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let mut docs = render_file(template, &vars)?;
    if docs.len() != 1 {
        return Err(Error::template(format!(
            "{} must contain exactly one document, found {}",
            template.display(),
            docs.len()
        )));
    }
    let mut manifest = docs.remove(0);

    let target = ObjectRef::from_manifest(&manifest)?;
    if target.kind != Kind::MACHINE_SET.kind {
        return Err(Error::template(format!(
            "{} renders a {}, expected {}",
            template.display(),
            target.kind,
            Kind::MACHINE_SET.kind
        )));
    }
    if target.name != name {
        return Err(Error::template(format!(
            "{} renders name {}, expected {}",
            template.display(),
            target.name,
            name
        )));
    }

    if target.namespace.is_none() {
        manifest["metadata"]["namespace"] = Value::String(MACHINE_API_NAMESPACE.to_string());
    }
    manifest["metadata"]["labels"][LABEL_MANAGED_BY] =
        Value::String(LABEL_MANAGED_BY_GANTRY.to_string());
    Ok(manifest)
}

/// Provisions compute pools against an object store
pub struct Provisioner<'a> {
    store: &'a dyn ObjectStore,
    manifests_dir: PathBuf,
    node_wait: NodeWait,
}

impl<'a> Provisioner<'a> {
    /// Create a provisioner reading templates from `manifests_dir`
    pub fn new(store: &'a dyn ObjectStore, manifests_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            manifests_dir: manifests_dir.into(),
            node_wait: NodeWait::default(),
        }
    }

    /// Override the node readiness budget
    pub fn with_node_wait(mut self, node_wait: NodeWait) -> Self {
        self.node_wait = node_wait;
        self
    }

    /// Provision one pool
    pub async fn provision(&self, req: &ProvisionRequest) -> Result<ProvisionReport> {
        req.validate()?;

        let template = self.manifests_dir.join(req.role.template_file());
        if !template.is_file() {
            return Err(Error::MissingTemplate { path: template });
        }

        let cluster = ClusterInfo::discover(self.store).await?;
        cluster.require_supported()?;

        let reference = find_reference(self.store).await?;
        let attrs = ReferenceAttributes::extract(&reference)?;

        let zone = match (&req.zone, &attrs.zone) {
            (Some(zone), _) => zone.clone(),
            (None, Some(zone)) => zone.clone(),
            (None, None) => {
                return Err(Error::validation(format!(
                    "reference MachineSet {} has no availability zone, pass --az",
                    attrs.source
                )))
            }
        };
        let name = pool_name(&cluster.infra_id, req.role.as_str(), &zone);
        info!(
            pool = %name,
            reference = %attrs.source,
            zone = %zone,
            instance_type = %req.instance_type,
            "rendering {} pool",
            req.role
        );

        let manifest = render_machineset(&template, &name, &cluster.infra_id, &zone, &attrs, req)?;

        let mut report = ProvisionReport {
            pool: name.clone(),
            zone,
            reference: attrs.source.clone(),
            manifest,
            dry_run: req.dry_run,
            cluster_autoscaler_created: false,
        };
        if req.dry_run {
            info!(pool = %name, "dry run, not applying");
            return Ok(report);
        }

        self.store.apply(&report.manifest).await?;
        info!(pool = %name, replicas = req.replicas, "MachineSet applied");

        if req.autoscale {
            report.cluster_autoscaler_created = ensure_cluster_autoscaler(self.store).await?;
            apply_machine_autoscaler(self.store, &name, req.min, req.max).await?;
        }

        info!(
            pool = %name,
            timeout_secs = self.node_wait.timeout.as_secs(),
            "waiting for a {} node to become Ready",
            req.role
        );
        let ready = wait_for_role_ready(
            self.store,
            req.role.as_str(),
            self.node_wait.timeout,
            self.node_wait.interval,
        )
        .await;
        if !ready.is_ready() {
            warn!(pool = %name, "no Ready {} node before the deadline", req.role);
            return Err(Error::timeout(
                format!("a Ready {} node in pool {}", req.role, name),
                self.node_wait.timeout,
            ));
        }

        info!(pool = %name, "{} pool is Ready", req.role);
        Ok(report)
    }
}
