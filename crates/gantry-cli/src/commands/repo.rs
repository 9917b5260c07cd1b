//! configure-repo command

use clap::Args;
use gantry_gitops::{configure_repo, RepoConfig};

use super::Context;
use crate::Result;

#[derive(Args, Debug)]
pub struct RepoArgs {
    /// Git clone URL the root Application tracks
    #[arg(long, env = "REPO_URL")]
    pub url: String,

    /// Branch, tag or commit
    #[arg(long, env = "REPO_REVISION", default_value = "main")]
    pub revision: String,

    /// Username for a private repository
    #[arg(long, env = "REPO_USERNAME")]
    pub username: Option<String>,

    /// Password or token for a private repository
    #[arg(long, env = "REPO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl From<RepoArgs> for RepoConfig {
    fn from(args: RepoArgs) -> Self {
        Self {
            url: args.url,
            revision: args.revision,
            username: args.username,
            token: args.token,
        }
    }
}

pub async fn run(ctx: &Context<'_>, args: RepoArgs) -> Result<()> {
    let report = configure_repo(ctx.store, &ctx.gitops_namespace, &args.into()).await?;
    println!("Repository secret: {}", report.secret);
    if report.root_updated {
        println!("Root application now tracks the repository");
    } else {
        println!("Root application not deployed yet; run `gantry deploy` next");
    }
    Ok(())
}
