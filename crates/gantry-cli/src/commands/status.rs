//! Status command - pools, machines, nodes and Applications at a glance
//!
//! Every section is read independently; one that fails is reported and the
//! rest are still shown.

use gantry_cluster::nodes::list_nodes;
use gantry_cluster::ClusterInfo;
use gantry_common::store::{name_of, str_at};
use gantry_common::{Kind, MACHINE_API_NAMESPACE};
use gantry_gitops::application::list_statuses;
use serde_json::Value;
use tracing::warn;

use super::format::{print_table, yes_no};
use super::gitops::print_applications;
use super::Context;
use crate::Result;

fn count_at(obj: &Value, pointer: &str) -> String {
    obj.pointer(pointer)
        .and_then(Value::as_u64)
        .unwrap_or(0)
        .to_string()
}

/// MachineSet rows: name, desired, ready, available
pub fn machineset_rows(machinesets: &[Value]) -> Vec<Vec<String>> {
    machinesets
        .iter()
        .map(|ms| {
            vec![
                name_of(ms).unwrap_or_default().to_string(),
                count_at(ms, "/spec/replicas"),
                count_at(ms, "/status/readyReplicas"),
                count_at(ms, "/status/availableReplicas"),
            ]
        })
        .collect()
}

/// Machine rows: name, phase
pub fn machine_rows(machines: &[Value]) -> Vec<Vec<String>> {
    machines
        .iter()
        .map(|m| {
            vec![
                name_of(m).unwrap_or_default().to_string(),
                str_at(m, "/status/phase").unwrap_or("Unknown").to_string(),
            ]
        })
        .collect()
}

fn heading(title: &str) {
    println!();
    println!("== {} ==", title);
}

fn unavailable(section: &str, error: &gantry_common::Error) {
    warn!(section, error = %error, "could not read section");
    println!("unavailable: {}", error);
}

pub async fn run(ctx: &Context<'_>) -> Result<()> {
    heading("Cluster");
    match ClusterInfo::discover(ctx.store).await {
        Ok(cluster) => {
            println!("Infrastructure ID: {}", cluster.infra_id);
            println!("Platform:          {}", cluster.platform);
        }
        Err(e) => unavailable("cluster", &e),
    }

    heading("MachineSets");
    match ctx
        .store
        .list(&Kind::MACHINE_SET, Some(MACHINE_API_NAMESPACE), None)
        .await
    {
        Ok(machinesets) => print_table(
            &["NAME", "DESIRED", "READY", "AVAILABLE"],
            &machineset_rows(&machinesets),
        ),
        Err(e) => unavailable("machinesets", &e),
    }

    heading("Machines");
    match ctx
        .store
        .list(&Kind::MACHINE, Some(MACHINE_API_NAMESPACE), None)
        .await
    {
        Ok(machines) => print_table(&["NAME", "PHASE"], &machine_rows(&machines)),
        Err(e) => unavailable("machines", &e),
    }

    heading("Nodes");
    match list_nodes(ctx.store).await {
        Ok(nodes) => {
            let rows: Vec<Vec<String>> = nodes
                .iter()
                .map(|n| vec![n.name.clone(), n.roles.join(","), yes_no(n.ready)])
                .collect();
            print_table(&["NAME", "ROLES", "READY"], &rows);
        }
        Err(e) => unavailable("nodes", &e),
    }

    heading("Applications");
    match list_statuses(ctx.store, &ctx.gitops_namespace).await {
        Ok(statuses) => print_applications(&statuses),
        Err(e) => unavailable("applications", &e),
    }

    Ok(())
}
