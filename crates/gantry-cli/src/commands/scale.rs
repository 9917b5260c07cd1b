//! scale command

use clap::Args;
use gantry_cluster::scale::ScaleOutcome;
use gantry_cluster::{scale_pool, ReplicaChange};

use super::Context;
use crate::Result;

#[derive(Args, Debug)]
pub struct ScaleArgs {
    /// MachineSet to scale
    #[arg(long)]
    pub name: String,

    /// New replica count: N, +N or -N
    #[arg(long, allow_hyphen_values = true)]
    pub replicas: ReplicaChange,
}

/// Scale the MachineSet named in `args`
pub async fn scale(ctx: &Context<'_>, args: &ScaleArgs) -> gantry_common::Result<ScaleOutcome> {
    scale_pool(ctx.store, &args.name, args.replicas).await
}

pub async fn run(ctx: &Context<'_>, args: ScaleArgs) -> Result<()> {
    let outcome = scale(ctx, &args).await?;
    println!("{}: {} → {}", args.name, outcome.from, outcome.to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::aws_cluster;
    use gantry_common::{Error, Kind, MACHINE_API_NAMESPACE};

    const POOL: &str = "demo-x7k2p-worker-us-east-2a";

    #[tokio::test]
    async fn relative_scale_changes_replicas() {
        let store = aws_cluster();
        let dir = tempfile::tempdir().unwrap();
        let args = ScaleArgs {
            name: POOL.to_string(),
            replicas: ReplicaChange::Increase(3),
        };

        let outcome = scale(&Context::for_tests(&store, dir.path()), &args)
            .await
            .unwrap();

        assert_eq!(outcome, ScaleOutcome { from: 2, to: 5 });
        let pool = store
            .peek(&Kind::MACHINE_SET, Some(MACHINE_API_NAMESPACE), POOL)
            .unwrap();
        assert_eq!(pool["spec"]["replicas"], 5);
    }

    #[tokio::test]
    async fn unknown_pool_is_not_found() {
        let store = aws_cluster();
        let dir = tempfile::tempdir().unwrap();
        let args = ScaleArgs {
            name: "missing".to_string(),
            replicas: ReplicaChange::Absolute(1),
        };

        let err = scale(&Context::for_tests(&store, dir.path()), &args)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
