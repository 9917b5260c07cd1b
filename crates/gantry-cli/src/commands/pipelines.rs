//! setup, bootstrap and all commands
//!
//! Each is a fail-fast [`Pipeline`]: the first hard failure stops the run and
//! exits nonzero. Soft failures (control plane readiness, per-application
//! sync timeouts) are handled inside their steps.

use std::path::PathBuf;

use clap::Args;
use gantry_cluster::PoolRole;
use gantry_common::pipeline::{Pipeline, PipelineReport};
use tracing::warn;

use super::format::print_table;
use super::gitops::{self, SyncTuning};
use super::{masters, pool, registry, Context};
use crate::commands::pool::PoolArgs;
use crate::config;
use crate::Result;

#[derive(Args, Debug, Clone, Default)]
pub struct SetupArgs {
    /// Docker config JSON merged into the pull secret (step skipped when unset)
    #[arg(long = "auth-file", env = "REGISTRY_AUTH_FILE")]
    pub auth_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BootstrapArgs {
    #[command(flatten)]
    pub sync: SyncTuning,
}

#[derive(Args, Debug)]
pub struct AllArgs {
    #[command(flatten)]
    pub setup: SetupArgs,

    #[command(flatten)]
    pub sync: SyncTuning,
}

/// pull-secret, icsp, gpu, cpu, dedicate-masters
pub fn setup_pipeline<'a>(
    ctx: &'a Context<'_>,
    args: &'a SetupArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Pipeline<'a>> {
    let defaults = PoolArgs::default();
    let gpu = defaults.request(PoolRole::Gpu, &lookup)?;
    let cpu = defaults.request(PoolRole::Cpu, &lookup)?;

    Ok(Pipeline::new("setup")
        .step("pull-secret", async move {
            match &args.auth_file {
                Some(path) => registry::pull_secret(ctx, path).await.map(|_| ()),
                None => {
                    warn!("REGISTRY_AUTH_FILE not set, leaving the pull secret alone");
                    Ok(())
                }
            }
        })
        .step("icsp", async move { registry::icsp(ctx).await.map(|_| ()) })
        .step("gpu", async move { pool::provision(ctx, &gpu).await.map(|_| ()) })
        .step("cpu", async move { pool::provision(ctx, &cpu).await.map(|_| ()) })
        .step("dedicate-masters", async move {
            masters::dedicate(ctx).await.map(|_| ())
        }))
}

/// Control plane install, root deploy, staged sync
pub fn bootstrap_pipeline<'a>(ctx: &'a Context<'_>, tuning: &'a SyncTuning) -> Pipeline<'a> {
    Pipeline::new("bootstrap")
        .step("install control plane", async move {
            gitops::install(ctx).await.map(|_| ())
        })
        .step("deploy root application", gitops::deploy(ctx))
        .step("staged sync", async move {
            gitops::sync(ctx, &tuning.order(), tuning.timeout()).await;
            Ok(())
        })
}

fn print_summary(report: &PipelineReport) {
    let rows: Vec<Vec<String>> = report
        .steps
        .iter()
        .map(|s| vec![s.name.clone(), format!("{}s", s.elapsed.as_secs())])
        .collect();
    println!();
    print_table(&["STEP", "ELAPSED"], &rows);
}

pub async fn run_setup(ctx: &Context<'_>, args: SetupArgs) -> Result<()> {
    let report = setup_pipeline(ctx, &args, config::env_lookup)?.run().await?;
    print_summary(&report);
    Ok(())
}

pub async fn run_bootstrap(ctx: &Context<'_>, args: BootstrapArgs) -> Result<()> {
    let report = bootstrap_pipeline(ctx, &args.sync).run().await?;
    print_summary(&report);
    Ok(())
}

pub async fn run_all(ctx: &Context<'_>, args: AllArgs) -> Result<()> {
    let report = setup_pipeline(ctx, &args.setup, config::env_lookup)?
        .extend(bootstrap_pipeline(ctx, &args.sync))
        .run()
        .await?;
    print_summary(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{aws_cluster, node, shipped_manifests};
    use gantry_common::memory::Verb;
    use gantry_common::{Error, Kind};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[tokio::test(start_paused = true)]
    async fn setup_runs_every_step_in_order() {
        let store = aws_cluster();
        store.seed([
            node("gpu-0", &["gpu", "worker"], true),
            node("cpu-0", &["cpu", "worker"], true),
        ]);
        let manifests = shipped_manifests();
        let ctx = Context::for_tests(&store, &manifests);
        let args = SetupArgs::default();

        let report = setup_pipeline(&ctx, &args, no_env)
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(
            report.step_names(),
            vec!["pull-secret", "icsp", "gpu", "cpu", "dedicate-masters"]
        );
        assert_eq!(
            store.targets(Verb::Apply, &Kind::MACHINE_SET),
            vec!["demo-x7k2p-gpu-us-east-2a", "demo-x7k2p-cpu-us-east-2a"]
        );
        assert_eq!(store.targets(Verb::Patch, &Kind::NODE).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gpu_readiness_timeout_aborts_before_later_steps() {
        let store = aws_cluster();
        let manifests = shipped_manifests();
        let ctx = Context::for_tests(&store, &manifests);
        let args = SetupArgs::default();

        let err = setup_pipeline(&ctx, &args, no_env)
            .unwrap()
            .run()
            .await
            .unwrap_err();

        let Error::Step { step, source } = err else {
            panic!("expected a step failure");
        };
        assert_eq!(step, "gpu");
        assert!(matches!(*source, Error::Timeout { .. }));
        // cpu and dedicate-masters never ran
        assert_eq!(
            store.targets(Verb::Apply, &Kind::MACHINE_SET),
            vec!["demo-x7k2p-gpu-us-east-2a"]
        );
        assert!(store.targets(Verb::Patch, &Kind::NODE).is_empty());
    }

    #[test]
    fn bad_pool_environment_fails_before_anything_runs() {
        let store = aws_cluster();
        let manifests = shipped_manifests();
        let ctx = Context::for_tests(&store, &manifests);
        let args = SetupArgs::default();

        let result = setup_pipeline(&ctx, &args, |key| {
            (key == "CPU_MAX").then(|| "lots".to_string())
        });

        assert!(result.is_err());
        assert!(store.ops().is_empty());
    }

    #[test]
    fn all_is_setup_followed_by_bootstrap() {
        let store = aws_cluster();
        let manifests = shipped_manifests();
        let ctx = Context::for_tests(&store, &manifests);
        let setup = SetupArgs::default();
        let tuning = SyncTuning {
            timeout_secs: 300,
            order: None,
        };

        let all = setup_pipeline(&ctx, &setup, no_env)
            .unwrap()
            .extend(bootstrap_pipeline(&ctx, &tuning));
        assert_eq!(all.len(), 8);
    }
}
