//! dedicate-masters command

use gantry_cluster::{dedicate_masters, NodeSummary};

use super::format::{print_table, yes_no};
use super::Context;
use crate::Result;

/// Remove the worker role from masters and print the resulting nodes
pub async fn dedicate(ctx: &Context<'_>) -> gantry_common::Result<Vec<NodeSummary>> {
    let nodes = dedicate_masters(ctx.store).await?;
    print_nodes(&nodes);
    Ok(nodes)
}

/// Nodes table: name, roles, ready
pub fn print_nodes(nodes: &[NodeSummary]) {
    let rows: Vec<Vec<String>> = nodes
        .iter()
        .map(|n| vec![n.name.clone(), n.roles.join(","), yes_no(n.ready)])
        .collect();
    print_table(&["NAME", "ROLES", "READY"], &rows);
}

pub async fn run(ctx: &Context<'_>) -> Result<()> {
    dedicate(ctx).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{aws_cluster, node};
    use gantry_common::memory::Verb;
    use gantry_common::{Error, Kind};

    #[tokio::test]
    async fn refuses_without_ready_workers() {
        let store = aws_cluster();
        store.seed([node("gpu-0", &["gpu", "worker"], false)]);
        let dir = tempfile::tempdir().unwrap();

        let err = dedicate(&Context::for_tests(&store, dir.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoReadyWorkers));
        assert!(store.targets(Verb::Patch, &Kind::NODE).is_empty());
    }

    #[tokio::test]
    async fn masters_lose_the_worker_role() {
        let store = aws_cluster();
        store.seed([node("gpu-0", &["gpu", "worker"], true)]);
        let dir = tempfile::tempdir().unwrap();

        let nodes = dedicate(&Context::for_tests(&store, dir.path()))
            .await
            .unwrap();

        let master = nodes.iter().find(|n| n.name == "master-0").unwrap();
        assert_eq!(master.roles, vec!["master"]);
        assert_eq!(
            store.targets(Verb::Patch, &Kind::NODE),
            vec!["master-0", "master-1", "master-2"]
        );
    }
}
