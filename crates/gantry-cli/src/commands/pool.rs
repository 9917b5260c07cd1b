//! gpu / cpu commands - provision a compute pool

use clap::Args;
use gantry_cluster::{PoolRole, ProvisionReport, ProvisionRequest, Provisioner};

use super::{CommandErrorExt, Context};
use crate::config;
use crate::Result;

/// Provisioning flags; unset flags fall back to `<ROLE>_*` variables, then to
/// built-in defaults
#[derive(Args, Debug, Default)]
pub struct PoolArgs {
    /// Cloud instance type
    #[arg(long)]
    pub instance_type: Option<String>,

    /// Initial replica count
    #[arg(long)]
    pub replicas: Option<u32>,

    /// Availability zone (default: the reference MachineSet's zone)
    #[arg(long, env = "AZ")]
    pub az: Option<String>,

    /// Root volume size in GiB
    #[arg(long)]
    pub volume_size: Option<u32>,

    /// Autoscaler lower bound
    #[arg(long)]
    pub min: Option<u32>,

    /// Autoscaler upper bound
    #[arg(long)]
    pub max: Option<u32>,

    /// Render the MachineSet and print it without applying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not register autoscalers for the pool
    #[arg(long)]
    pub no_autoscale: bool,
}

impl PoolArgs {
    /// Resolve the request for `role`
    pub fn request(
        &self,
        role: PoolRole,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ProvisionRequest> {
        let mut req = config::pool_defaults(role, lookup)?;
        if let Some(instance_type) = &self.instance_type {
            req.instance_type = instance_type.clone();
        }
        if let Some(zone) = &self.az {
            req.zone = Some(zone.clone());
        }
        req.replicas = self.replicas.unwrap_or(req.replicas);
        req.volume_size = self.volume_size.unwrap_or(req.volume_size);
        req.min = self.min.unwrap_or(req.min);
        req.max = self.max.unwrap_or(req.max);
        req.dry_run = self.dry_run;
        req.autoscale = !self.no_autoscale;
        Ok(req)
    }
}

/// Provision one pool
pub async fn provision(
    ctx: &Context<'_>,
    req: &ProvisionRequest,
) -> gantry_common::Result<ProvisionReport> {
    Provisioner::new(ctx.store, &ctx.manifests_dir)
        .provision(req)
        .await
}

fn print_report(report: &ProvisionReport) -> Result<()> {
    if report.dry_run {
        println!("{}", serde_json::to_string_pretty(&report.manifest).cmd_err()?);
        println!();
        println!("Dry run: {} not applied", report.pool);
        return Ok(());
    }
    println!(
        "Pool {} ready in {} (attributes from {})",
        report.pool, report.zone, report.reference
    );
    if report.cluster_autoscaler_created {
        println!("Created the cluster autoscaler");
    }
    Ok(())
}

pub async fn run(ctx: &Context<'_>, role: PoolRole, args: PoolArgs) -> Result<()> {
    let req = args.request(role, config::env_lookup)?;
    let report = provision(ctx, &req).await?;
    print_report(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{aws_cluster, shipped_manifests};
    use gantry_common::memory::Verb;
    use gantry_common::Kind;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn flags_override_environment() {
        let args = PoolArgs {
            replicas: Some(4),
            ..Default::default()
        };
        let req = args
            .request(PoolRole::Gpu, |key| {
                (key == "GPU_REPLICAS" || key == "GPU_MAX").then(|| "2".to_string())
            })
            .unwrap();
        assert_eq!(req.replicas, 4);
        assert_eq!(req.max, 2);
        assert_eq!(req.instance_type, "g5.2xlarge");
        assert!(req.autoscale);
    }

    #[test]
    fn no_autoscale_flag_is_honoured() {
        let args = PoolArgs {
            no_autoscale: true,
            ..Default::default()
        };
        assert!(!args.request(PoolRole::Cpu, no_env).unwrap().autoscale);
    }

    #[tokio::test]
    async fn dry_run_renders_the_shipped_template_without_applying() {
        let store = aws_cluster();
        let ctx = Context::for_tests(&store, &shipped_manifests());
        let args = PoolArgs {
            dry_run: true,
            ..Default::default()
        };

        let report = provision(&ctx, &args.request(PoolRole::Gpu, no_env).unwrap())
            .await
            .unwrap();

        assert_eq!(report.pool, "demo-x7k2p-gpu-us-east-2a");
        let manifest = &report.manifest;
        assert_eq!(manifest["metadata"]["name"], "demo-x7k2p-gpu-us-east-2a");
        assert_eq!(
            manifest["spec"]["template"]["spec"]["providerSpec"]["value"]["instanceType"],
            "g5.2xlarge"
        );
        assert!(store.targets(Verb::Apply, &Kind::MACHINE_SET).is_empty());
    }

    #[tokio::test]
    async fn explicit_zone_names_the_pool() {
        let store = aws_cluster();
        let ctx = Context::for_tests(&store, &shipped_manifests());
        let args = PoolArgs {
            az: Some("us-east-2c".to_string()),
            dry_run: true,
            ..Default::default()
        };

        let report = provision(&ctx, &args.request(PoolRole::Cpu, no_env).unwrap())
            .await
            .unwrap();

        assert_eq!(report.pool, "demo-x7k2p-cpu-us-east-2c");
        assert_eq!(report.zone, "us-east-2c");
    }
}
