//! refresh command - recreate the operator catalog to pick up new images

use std::time::Duration;

use clap::Args;
use gantry_cluster::catalog::{refresh_images, ImageRefresh, PodTarget, RefreshReport};

use super::Context;
use crate::Result;

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Namespace of the catalog pods
    #[arg(long, default_value = "openshift-marketplace")]
    pub catalog_namespace: String,

    /// Label selector of the catalog pods
    #[arg(long, default_value = "olm.catalogSource=redhat-operators")]
    pub catalog_selector: String,

    /// Namespace of the OLM catalog operator
    #[arg(long, default_value = "openshift-operator-lifecycle-manager")]
    pub olm_namespace: String,

    /// Label selector of the OLM catalog operator pods
    #[arg(long, default_value = "app=catalog-operator")]
    pub olm_selector: String,

    /// Seconds to wait for the replacement catalog pod
    #[arg(long = "timeout", default_value_t = 300)]
    pub timeout_secs: u64,
}

impl From<RefreshArgs> for ImageRefresh {
    fn from(args: RefreshArgs) -> Self {
        Self {
            catalog: PodTarget::new(args.catalog_namespace, args.catalog_selector),
            operator: PodTarget::new(args.olm_namespace, args.olm_selector),
            timeout: Duration::from_secs(args.timeout_secs),
            ..Default::default()
        }
    }
}

fn print_report(report: &RefreshReport) {
    println!(
        "Catalog pods deleted: {}, replacement ready: {}, operator pods deleted: {}",
        report.catalog_deleted,
        super::format::yes_no(report.catalog_ready),
        report.operator_deleted
    );
}

pub async fn run(ctx: &Context<'_>, args: RefreshArgs) -> Result<()> {
    let report = refresh_images(ctx.store, &args.into()).await;
    print_report(&report);
    Ok(())
}
