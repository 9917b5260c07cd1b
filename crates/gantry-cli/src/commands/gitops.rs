//! deploy, sync, sync-enable and sync-disable commands

use std::time::Duration;

use clap::Args;
use gantry_gitops::stages::{default_order, parse_order};
use gantry_gitops::{
    set_sync_policy_all, AppStatus, AutomationFlag, ControlPlaneInstaller, InstallReport,
    InstallerConfig, RootDeployer, RootDeployerConfig, StagedSync, SyncReport,
};
use tracing::warn;

use super::format::{print_table, yes_no};
use super::Context;
use crate::config;
use crate::Result;

/// Timing and order of the staged sync
#[derive(Args, Debug, Clone)]
pub struct SyncTuning {
    /// Seconds to wait for each Application to become Synced and Healthy
    #[arg(long = "timeout", env = "SYNC_TIMEOUT", default_value_t = 300)]
    pub timeout_secs: u64,

    /// Comma separated sync order overriding the built-in one
    #[arg(long = "order", env = "SYNC_ORDER")]
    pub order: Option<String>,
}

impl SyncTuning {
    /// Per-Application timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured order, or the built-in one
    pub fn order(&self) -> Vec<String> {
        self.order
            .as_deref()
            .map(parse_order)
            .filter(|order| !order.is_empty())
            .unwrap_or_else(default_order)
    }
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub tuning: SyncTuning,

    /// Applications to sync, in order (default: the configured order)
    pub names: Vec<String>,
}

impl SyncArgs {
    /// Explicit names win over the configured order
    pub fn order(&self) -> Vec<String> {
        if self.names.is_empty() {
            self.tuning.order()
        } else {
            self.names.clone()
        }
    }
}

/// `${VAR}` values for the bootstrap and root manifests
pub fn manifest_vars(ctx: &Context<'_>) -> Vec<(String, String)> {
    let mut vars = vec![
        ("GITOPS_NAMESPACE".to_string(), ctx.gitops_namespace.clone()),
        (
            "GITOPS_OPERATOR_NAMESPACE".to_string(),
            ctx.operator_namespace.clone(),
        ),
    ];
    vars.extend(config::template_vars(config::env_lookup));
    vars
}

/// Install the GitOps operator and wait for Argo CD
pub async fn install(ctx: &Context<'_>) -> gantry_common::Result<InstallReport> {
    let config = InstallerConfig {
        operator_namespace: ctx.operator_namespace.clone(),
        gitops_namespace: ctx.gitops_namespace.clone(),
        vars: manifest_vars(ctx),
        ..Default::default()
    };
    let report = ControlPlaneInstaller::new(ctx.store, &ctx.manifests_dir, config)
        .install()
        .await?;
    println!(
        "Control plane: operator {}, namespace {}, server {}",
        ready_word(report.operator_succeeded),
        ready_word(report.namespace_ready),
        ready_word(report.server_available)
    );
    Ok(report)
}

fn ready_word(ready: bool) -> &'static str {
    if ready {
        "ready"
    } else {
        "NOT ready"
    }
}

/// Apply the root Application and wait for its children
pub async fn deploy(ctx: &Context<'_>) -> gantry_common::Result<()> {
    let config = RootDeployerConfig {
        gitops_namespace: ctx.gitops_namespace.clone(),
        vars: manifest_vars(ctx),
        ..Default::default()
    };
    let applied = RootDeployer::new(ctx.store, &ctx.manifests_dir, config)
        .deploy()
        .await?;
    for object in &applied {
        println!("applied {}", object);
    }
    Ok(())
}

/// Run the staged sync and print its summary. Never fails.
pub async fn sync(ctx: &Context<'_>, order: &[String], timeout: Duration) -> SyncReport {
    let report = StagedSync::new(ctx.store, ctx.gitops_namespace.as_str())
        .with_timeout(timeout)
        .run(order)
        .await;
    print_sync_report(&report);
    report
}

fn status_rows(statuses: &[AppStatus]) -> Vec<Vec<String>> {
    statuses
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.sync.to_string(),
                s.health.to_string(),
                yes_no(s.automated),
            ]
        })
        .collect()
}

/// Applications table: name, sync, health, automated
pub fn print_applications(statuses: &[AppStatus]) {
    print_table(&["NAME", "SYNC", "HEALTH", "AUTO"], &status_rows(statuses));
}

fn print_sync_report(report: &SyncReport) {
    println!();
    let outcomes: Vec<Vec<String>> = report
        .outcomes
        .iter()
        .map(|(name, outcome)| vec![name.clone(), outcome.to_string()])
        .collect();
    print_table(&["APPLICATION", "OUTCOME"], &outcomes);
    println!();
    print_applications(&report.statuses);
}

pub async fn run_deploy(ctx: &Context<'_>) -> Result<()> {
    deploy(ctx).await?;
    Ok(())
}

pub async fn run_sync(ctx: &Context<'_>, args: SyncArgs) -> Result<()> {
    sync(ctx, &args.order(), args.tuning.timeout()).await;
    Ok(())
}

pub async fn run_toggle(ctx: &Context<'_>, enable: bool) -> Result<()> {
    let flag = if enable {
        AutomationFlag::Enabled
    } else {
        AutomationFlag::Disabled
    };
    let report = set_sync_policy_all(ctx.store, &ctx.gitops_namespace, flag).await?;
    for name in &report.failed {
        warn!(app = %name, "sync policy not changed");
    }
    println!(
        "Automated sync {} on {} application(s), {} failed",
        if enable { "enabled" } else { "disabled" },
        report.patched.len(),
        report.failed.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::application;
    use gantry_common::memory::MemoryStore;
    use gantry_gitops::SyncOutcome;

    fn tuning(order: Option<&str>) -> SyncTuning {
        SyncTuning {
            timeout_secs: 300,
            order: order.map(str::to_string),
        }
    }

    #[test]
    fn explicit_names_win_over_configured_order() {
        let args = SyncArgs {
            tuning: tuning(Some("x,y")),
            names: vec!["a".to_string()],
        };
        assert_eq!(args.order(), vec!["a"]);
    }

    #[test]
    fn configured_order_wins_over_built_in() {
        assert_eq!(tuning(Some("x, y")).order(), vec!["x", "y"]);
        assert_eq!(tuning(Some(" , ")).order(), default_order());
        assert_eq!(tuning(None).order(), default_order());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_succeeds_with_timeouts_and_skips() {
        let store = MemoryStore::new();
        store.seed([
            application("a", "Synced", "Healthy"),
            application("c", "OutOfSync", "Degraded"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::for_tests(&store, dir.path());
        let order: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        let report = sync(&ctx, &order, Duration::from_secs(30)).await;

        assert_eq!(report.with_outcome(&SyncOutcome::Skipped), vec!["b"]);
        assert_eq!(report.with_outcome(&SyncOutcome::TimedOut), vec!["c"]);
    }

    #[test]
    fn status_rows_show_automation() {
        let statuses = vec![AppStatus::from_application(&application(
            "a", "Synced", "Healthy",
        ))];
        assert_eq!(
            status_rows(&statuses),
            vec![vec!["a", "Synced", "Healthy", "no"]]
        );
    }
}
