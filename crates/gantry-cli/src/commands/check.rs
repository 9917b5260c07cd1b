//! Check command - verify cluster access and platform

use gantry_cluster::ClusterInfo;
use tracing::info;

use super::Context;
use crate::Result;

/// Discover the cluster and require a supported platform
pub async fn check(ctx: &Context<'_>) -> gantry_common::Result<ClusterInfo> {
    let cluster = ClusterInfo::discover(ctx.store).await?;
    cluster.require_supported()?;
    info!(infra_id = %cluster.infra_id, platform = %cluster.platform, "cluster reachable");
    Ok(cluster)
}

pub async fn run(ctx: &Context<'_>) -> Result<()> {
    let cluster = check(ctx).await?;
    println!("Infrastructure ID: {}", cluster.infra_id);
    println!("Platform:          {}", cluster.platform);
    if let Some(region) = &cluster.region {
        println!("Region:            {}", region);
    }
    Ok(())
}
