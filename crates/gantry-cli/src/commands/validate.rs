//! Validate command - offline checks of manifests and sync order

use std::path::Path;

use gantry_cluster::provision::render_machineset;
use gantry_cluster::registry::ICSP_FILE;
use gantry_cluster::{pool_name, PoolRole, ProvisionRequest, ReferenceAttributes};
use gantry_common::store::ObjectRef;
use gantry_common::template::render_file;
use gantry_gitops::stages::{check_order, default_order, parse_order};
use gantry_gitops::{BOOTSTRAP_FILE, EXPECTED_CHILDREN, ROOT_APPLICATION_FILE};

use crate::config;
use crate::{Error, Result};

fn placeholder_attributes() -> ReferenceAttributes {
    ReferenceAttributes {
        source: "placeholder".to_string(),
        region: "us-east-1".to_string(),
        zone: Some("us-east-1a".to_string()),
        ami_id: "ami-00000000".to_string(),
        subnet: "placeholder-subnet".to_string(),
        iam_profile: "placeholder-profile".to_string(),
        security_group: "placeholder-sg".to_string(),
    }
}

fn check_template(dir: &Path, role: PoolRole) -> std::result::Result<(), String> {
    let template = dir.join(role.template_file());
    let name = pool_name("placeholder", role.as_str(), "us-east-1a");
    render_machineset(
        &template,
        &name,
        "placeholder",
        "us-east-1a",
        &placeholder_attributes(),
        &ProvisionRequest::defaults(role),
    )
    .map(|_| ())
    .map_err(|e| e.to_string())
}

fn check_manifest(path: &Path, vars: &[(String, String)]) -> std::result::Result<(), String> {
    let docs = render_file(path, vars).map_err(|e| e.to_string())?;
    if docs.is_empty() {
        return Err(format!("{} contains no documents", path.display()));
    }
    for (i, doc) in docs.iter().enumerate() {
        ObjectRef::from_manifest(doc)
            .map_err(|e| format!("{} document {}: {}", path.display(), i + 1, e))?;
    }
    Ok(())
}

/// Every problem found, empty when everything checks out
pub fn validate_manifests(
    dir: &Path,
    vars: &[(String, String)],
    order: &[String],
) -> Vec<String> {
    let mut problems = Vec::new();

    for role in [PoolRole::Gpu, PoolRole::Cpu] {
        match check_template(dir, role) {
            Ok(()) => println!("  {} valid", role.template_file()),
            Err(e) => problems.push(e),
        }
    }

    for file in [BOOTSTRAP_FILE, ROOT_APPLICATION_FILE, ICSP_FILE] {
        match check_manifest(&dir.join(file), vars) {
            Ok(()) => println!("  {} valid", file),
            Err(e) => problems.push(e),
        }
    }

    problems.extend(check_order(order, EXPECTED_CHILDREN));
    problems
}

pub fn run(manifests_dir: &Path) -> Result<()> {
    let vars = config::template_vars(config::env_lookup);
    let order = config::env_lookup("SYNC_ORDER")
        .map(|list| parse_order(&list))
        .filter(|order| !order.is_empty())
        .unwrap_or_else(default_order);

    println!("Validating {}", manifests_dir.display());
    let problems = validate_manifests(manifests_dir, &vars, &order);
    if problems.is_empty() {
        println!("All checks passed");
        return Ok(());
    }

    println!();
    for problem in &problems {
        println!("  error: {}", problem);
    }
    Err(Error::validation(format!(
        "{} problem(s) found",
        problems.len()
    )))
}
