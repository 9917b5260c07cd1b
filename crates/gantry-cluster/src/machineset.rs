//! Reference MachineSet discovery and attribute extraction
//!
//! A new pool copies its placement, network, IAM and image settings verbatim
//! from an existing pool so it lands in the same VPC as the rest of the
//! cluster.

use gantry_common::store::{name_of, str_at};
use gantry_common::{Error, Kind, ObjectStore, Result, MACHINE_API_NAMESPACE};
use serde_json::Value;
use tracing::debug;

/// Pools whose names contain any of these are already specialized and never
/// serve as a reference
pub const EXCLUDED_REFERENCE_PATTERNS: &[&str] = &["gpu", "cpu", "infra", "master"];

const PROVIDER_SPEC: &str = "/spec/template/spec/providerSpec/value";

/// Deterministic pool name: `<infraId>-<role>-<zone>`
pub fn pool_name(infra_id: &str, role: &str, zone: &str) -> String {
    format!("{}-{}-{}", infra_id, role, zone)
}

/// Attributes copied from the reference pool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceAttributes {
    /// Name of the reference MachineSet
    pub source: String,
    /// Cloud region
    pub region: String,
    /// Availability zone, `None` when the reference does not pin one
    pub zone: Option<String>,
    /// Machine image id
    pub ami_id: String,
    /// Subnet filter value
    pub subnet: String,
    /// IAM instance profile
    pub iam_profile: String,
    /// Security group filter value
    pub security_group: String,
}

impl ReferenceAttributes {
    /// Extract attributes from a MachineSet
    pub fn extract(machineset: &Value) -> Result<Self> {
        let source = name_of(machineset).unwrap_or_default().to_string();
        let required = |path: &str| -> Result<String> {
            str_at(machineset, &format!("{}{}", PROVIDER_SPEC, path))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::validation(format!(
                        "reference MachineSet {} has no providerSpec{}",
                        source,
                        path.replace('/', ".")
                    ))
                })
        };

        Ok(Self {
            region: required("/placement/region")?,
            zone: str_at(
                machineset,
                &format!("{}/placement/availabilityZone", PROVIDER_SPEC),
            )
            .filter(|z| !z.is_empty())
            .map(str::to_string),
            ami_id: required("/ami/id")?,
            subnet: required("/subnet/filters/0/values/0")?,
            iam_profile: required("/iamInstanceProfile/id")?,
            security_group: required("/securityGroups/0/filters/0/values/0")?,
            source,
        })
    }
}

/// Whether a MachineSet name may serve as the reference
pub fn is_reference_candidate(name: &str) -> bool {
    !EXCLUDED_REFERENCE_PATTERNS
        .iter()
        .any(|pattern| name.contains(pattern))
}

/// First MachineSet whose name matches none of the excluded patterns
pub async fn find_reference(store: &dyn ObjectStore) -> Result<Value> {
    let machinesets = store
        .list(&Kind::MACHINE_SET, Some(MACHINE_API_NAMESPACE), None)
        .await?;

    let reference = machinesets
        .into_iter()
        .find(|ms| name_of(ms).is_some_and(is_reference_candidate))
        .ok_or_else(|| Error::NoReferenceResource {
            kind: Kind::MACHINE_SET.kind.to_string(),
            excluded: EXCLUDED_REFERENCE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        })?;

    debug!(reference = name_of(&reference).unwrap_or_default(), "selected reference MachineSet");
    Ok(reference)
}


#[cfg(test)]
mod tests {
    use super::fixtures::worker_machineset;
    use super::*;
    use gantry_common::memory::MemoryStore;

    #[test]
    fn pool_name_is_deterministic() {
        assert_eq!(
            pool_name("demo-x7k2p", "gpu", "us-east-2a"),
            "demo-x7k2p-gpu-us-east-2a"
        );
    }

    #[test]
    fn extracts_reference_attributes() {
        let attrs =
            ReferenceAttributes::extract(&worker_machineset("demo-worker-us-east-2a", "us-east-2a"))
                .unwrap();
        assert_eq!(attrs.source, "demo-worker-us-east-2a");
        assert_eq!(attrs.region, "us-east-2");
        assert_eq!(attrs.zone.as_deref(), Some("us-east-2a"));
        assert_eq!(attrs.ami_id, "ami-0abc");
        assert_eq!(attrs.subnet, "demo-subnet-private");
        assert_eq!(attrs.iam_profile, "demo-worker-profile");
        assert_eq!(attrs.security_group, "demo-worker-sg");
    }

    #[test]
    fn missing_attribute_names_the_path() {
        let mut ms = worker_machineset("demo-worker", "us-east-2a");
        ms["spec"]["template"]["spec"]["providerSpec"]["value"]["ami"] = serde_json::json!({});
        let err = ReferenceAttributes::extract(&ms).unwrap_err();
        assert!(err.to_string().contains("ami.id"));
    }

    #[test]
    fn specialized_pools_are_not_candidates() {
        assert!(is_reference_candidate("demo-worker-us-east-2a"));
        assert!(!is_reference_candidate("demo-gpu-us-east-2a"));
        assert!(!is_reference_candidate("demo-infra-us-east-2a"));
        assert!(!is_reference_candidate("demo-master-0"));
    }

    #[tokio::test]
    async fn find_reference_skips_excluded_names() {
        let store = MemoryStore::new();
        store.seed([
            worker_machineset("demo-gpu-us-east-2a", "us-east-2a"),
            worker_machineset("demo-worker-us-east-2b", "us-east-2b"),
        ]);

        let reference = find_reference(&store).await.unwrap();
        assert_eq!(name_of(&reference), Some("demo-worker-us-east-2b"));
    }

    #[tokio::test]
    async fn find_reference_fails_without_candidates() {
        let store = MemoryStore::new();
        store.seed([worker_machineset("demo-cpu-us-east-2a", "us-east-2a")]);

        let err = find_reference(&store).await.unwrap_err();
        assert!(matches!(err, Error::NoReferenceResource { .. }));
    }
}
