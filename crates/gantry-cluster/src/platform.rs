//! Cluster platform discovery

use gantry_common::store::str_at;
use gantry_common::{Error, Kind, ObjectStore, Result};
use tracing::debug;

/// The only cloud platform gantry can provision on
pub const SUPPORTED_PLATFORM: &str = "AWS";

/// Name of the Infrastructure singleton
pub const INFRASTRUCTURE_NAME: &str = "cluster";

/// Identity of the cluster gantry is pointed at
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterInfo {
    /// Infrastructure id, the prefix of every machine resource name
    pub infra_id: String,
    /// Platform type (e.g. "AWS")
    pub platform: String,
    /// Cloud region when the platform reports one
    pub region: Option<String>,
}

impl ClusterInfo {
    /// Read the Infrastructure singleton.
    ///
    /// Credentials problems surface here first, as
    /// [`Error::Unauthorized`].
    pub async fn discover(store: &dyn ObjectStore) -> Result<Self> {
        let infra = store
            .get(&Kind::INFRASTRUCTURE, None, INFRASTRUCTURE_NAME)
            .await?
            .ok_or_else(|| Error::not_found(Kind::INFRASTRUCTURE.kind, INFRASTRUCTURE_NAME))?;

        let infra_id = str_at(&infra, "/status/infrastructureName")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::validation("Infrastructure has no status.infrastructureName"))?
            .to_string();

        let platform = str_at(&infra, "/status/platformStatus/type")
            .or_else(|| str_at(&infra, "/status/platform"))
            .unwrap_or("Unknown")
            .to_string();

        let region = str_at(&infra, "/status/platformStatus/aws/region").map(str::to_string);

        debug!(infra_id = %infra_id, platform = %platform, "discovered cluster");
        Ok(Self {
            infra_id,
            platform,
            region,
        })
    }

    /// Fail unless the cluster runs on [`SUPPORTED_PLATFORM`]
    pub fn require_supported(&self) -> Result<()> {
        if self.platform == SUPPORTED_PLATFORM {
            Ok(())
        } else {
            Err(Error::UnsupportedPlatform {
                platform: self.platform.clone(),
            })
        }
    }
}
