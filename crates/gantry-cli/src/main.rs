//! gantry CLI
//!
//! Provisions OpenShift compute pools and rolls out Argo CD applications,
//! gating every step on cluster readiness.

use clap::error::ErrorKind;
use clap::Parser;
use tracing::info;

use gantry_cli::commands::CommandErrorExt;
use gantry_cli::{config, Cli, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = config::load_env_file()?;

    gantry_common::telemetry::init_logging("info").cmd_err()?;
    if let Some(path) = env_file {
        info!(path = %path.display(), "loaded env file");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            // usage errors exit 1 like every other hard failure
            let _ = e.print();
            std::process::exit(1);
        }
    };
    cli.run().await
}
