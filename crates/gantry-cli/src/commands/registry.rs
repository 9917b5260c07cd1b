//! pull-secret and icsp commands

use std::path::{Path, PathBuf};

use clap::Args;
use gantry_cluster::registry::{apply_mirror_policies, merge_pull_secret};
use gantry_common::store::ObjectRef;

use super::Context;
use crate::Result;

#[derive(Args, Debug)]
pub struct PullSecretArgs {
    /// Docker config JSON with the registry credentials to merge
    #[arg(long = "auth-file", env = "REGISTRY_AUTH_FILE")]
    pub auth_file: PathBuf,
}

/// Merge the credentials in `auth_file` into the cluster pull secret
pub async fn pull_secret(
    ctx: &Context<'_>,
    auth_file: &Path,
) -> gantry_common::Result<Vec<String>> {
    merge_pull_secret(ctx.store, auth_file).await
}

/// Apply the mirror policies shipped in the manifests directory
pub async fn icsp(ctx: &Context<'_>) -> gantry_common::Result<Vec<ObjectRef>> {
    apply_mirror_policies(ctx.store, &ctx.manifests_dir).await
}

pub async fn run_pull_secret(ctx: &Context<'_>, args: PullSecretArgs) -> Result<()> {
    let registries = pull_secret(ctx, &args.auth_file).await?;
    println!("Pull secret updated for: {}", registries.join(", "));
    Ok(())
}

pub async fn run_icsp(ctx: &Context<'_>) -> Result<()> {
    for applied in icsp(ctx).await? {
        println!("applied {}", applied);
    }
    Ok(())
}
