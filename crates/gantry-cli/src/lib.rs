//! gantry CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gantry_cluster::PoolRole;
use gantry_common::kube_store::KubeStore;

use commands::Context;

/// gantry - readiness-gated OpenShift provisioning and GitOps rollout
#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to kubeconfig (defaults to KUBECONFIG or in-cluster config)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Directory holding the manifest templates
    #[arg(
        long,
        global = true,
        env = "GANTRY_MANIFESTS_DIR",
        default_value = "manifests"
    )]
    pub manifests_dir: PathBuf,

    /// Namespace of Argo CD and its Applications
    #[arg(
        short = 'n',
        long = "namespace",
        global = true,
        env = "GITOPS_NAMESPACE",
        default_value = gantry_gitops::DEFAULT_GITOPS_NAMESPACE
    )]
    pub gitops_namespace: String,

    /// Namespace the GitOps operator is installed into
    #[arg(
        long,
        global = true,
        env = "GITOPS_OPERATOR_NAMESPACE",
        default_value = gantry_gitops::DEFAULT_OPERATOR_NAMESPACE
    )]
    pub operator_namespace: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify cluster access and platform
    Check,
    /// Provision the GPU compute pool
    Gpu(commands::pool::PoolArgs),
    /// Provision the CPU compute pool
    Cpu(commands::pool::PoolArgs),
    /// Merge registry credentials into the cluster pull secret
    PullSecret(commands::registry::PullSecretArgs),
    /// Apply image mirror policies
    Icsp,
    /// pull-secret, icsp, gpu, cpu, dedicate-masters
    Setup(commands::pipelines::SetupArgs),
    /// Install the GitOps control plane, deploy the root Application and sync
    Bootstrap(commands::pipelines::BootstrapArgs),
    /// setup followed by bootstrap
    All(commands::pipelines::AllArgs),
    /// Deploy the root Application and wait for its children
    Deploy,
    /// Sync Applications one at a time in order
    Sync(commands::gitops::SyncArgs),
    /// Show pools, machines, nodes and Applications
    Status,
    /// Check manifests and the sync order without touching the cluster
    Validate,
    /// Delete the root Application and every gantry-managed pool
    Clean(commands::clean::CleanArgs),
    /// Register the git repository with Argo CD
    ConfigureRepo(commands::repo::RepoArgs),
    /// Change the replica count of a MachineSet
    Scale(commands::scale::ScaleArgs),
    /// Restart the operator catalog to pick up new images
    Refresh(commands::refresh::RefreshArgs),
    /// Enable automated sync on every Application
    SyncEnable,
    /// Disable automated sync on every Application
    SyncDisable,
    /// Remove the worker role from master nodes
    DedicateMasters,
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        if matches!(self.command, Commands::Validate) {
            return commands::validate::run(&self.global.manifests_dir);
        }

        let store = KubeStore::connect(self.global.kubeconfig.as_deref()).await?;
        let ctx = Context {
            store: &store,
            manifests_dir: self.global.manifests_dir,
            gitops_namespace: self.global.gitops_namespace,
            operator_namespace: self.global.operator_namespace,
        };

        match self.command {
            Commands::Check => commands::check::run(&ctx).await,
            Commands::Gpu(args) => commands::pool::run(&ctx, PoolRole::Gpu, args).await,
            Commands::Cpu(args) => commands::pool::run(&ctx, PoolRole::Cpu, args).await,
            Commands::PullSecret(args) => commands::registry::run_pull_secret(&ctx, args).await,
            Commands::Icsp => commands::registry::run_icsp(&ctx).await,
            Commands::Setup(args) => commands::pipelines::run_setup(&ctx, args).await,
            Commands::Bootstrap(args) => commands::pipelines::run_bootstrap(&ctx, args).await,
            Commands::All(args) => commands::pipelines::run_all(&ctx, args).await,
            Commands::Deploy => commands::gitops::run_deploy(&ctx).await,
            Commands::Sync(args) => commands::gitops::run_sync(&ctx, args).await,
            Commands::Status => commands::status::run(&ctx).await,
            Commands::Validate => Ok(()),
            Commands::Clean(args) => commands::clean::run(&ctx, args).await,
            Commands::ConfigureRepo(args) => commands::repo::run(&ctx, args).await,
            Commands::Scale(args) => commands::scale::run(&ctx, args).await,
            Commands::Refresh(args) => commands::refresh::run(&ctx, args).await,
            Commands::SyncEnable => commands::gitops::run_toggle(&ctx, true).await,
            Commands::SyncDisable => commands::gitops::run_toggle(&ctx, false).await,
            Commands::DedicateMasters => commands::masters::run(&ctx).await,
        }
    }
}
