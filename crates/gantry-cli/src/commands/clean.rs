//! Clean command - remove what gantry created
//!
//! Deletes the root Application (Argo CD then prunes its children) and every
//! MachineAutoscaler and MachineSet labeled as gantry-managed. Pools created
//! by the installer are never touched.

use std::io::{BufRead, Write};

use clap::Args;
use gantry_cluster::teardown::{remove_managed_pools, TeardownReport};
use gantry_common::{Kind, Selector};
use gantry_gitops::ROOT_APPLICATION;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use super::Context;
use crate::Result;

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Skip confirmation prompt
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,
}

/// Asks the operator before anything destructive happens
#[cfg_attr(test, automock)]
pub trait Confirm {
    /// Show `prompt` and return whether the answer was yes
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Reads the answer from stdin
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        print!("{} [y/N] ", prompt);
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().eq_ignore_ascii_case("y"))
    }
}

/// What a clean removed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Whether the root Application existed and was deleted
    pub root_deleted: bool,
    /// Pools and autoscalers deleted
    pub pools: TeardownReport,
}

/// Delete the root Application and managed pools, `None` when declined
pub async fn clean(
    ctx: &Context<'_>,
    args: &CleanArgs,
    confirm: &dyn Confirm,
) -> Result<Option<CleanReport>> {
    if !args.yes {
        println!(
            "This will delete the root Application in '{}' and every gantry-managed \
             MachineSet and MachineAutoscaler.",
            ctx.gitops_namespace
        );
        if !confirm.confirm("Are you sure?")? {
            println!("Aborted");
            return Ok(None);
        }
    }

    let root_deleted = ctx
        .store
        .delete(
            &Kind::APPLICATION,
            Some(&ctx.gitops_namespace),
            Selector::Name(ROOT_APPLICATION),
        )
        .await?
        > 0;
    info!(deleted = root_deleted, "root application");

    let pools = remove_managed_pools(ctx.store).await?;
    Ok(Some(CleanReport {
        root_deleted,
        pools,
    }))
}

pub async fn run(ctx: &Context<'_>, args: CleanArgs) -> Result<()> {
    if let Some(report) = clean(ctx, &args, &StdinConfirm).await? {
        println!(
            "Deleted root application: {}, MachineSets: {}, MachineAutoscalers: {}",
            report.root_deleted, report.pools.machinesets, report.pools.machine_autoscalers
        );
    }
    Ok(())
}
