//! Removal of gantry-managed compute pools

use gantry_common::{Kind, ObjectStore, Result, Selector, MACHINE_API_NAMESPACE, MANAGED_SELECTOR};
use tracing::info;

/// Counts of deleted objects
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// MachineAutoscalers deleted
    pub machine_autoscalers: usize,
    /// MachineSets deleted
    pub machinesets: usize,
}

/// Delete every gantry-managed MachineAutoscaler, then every gantry-managed
/// MachineSet. Pools created by the installer are never touched.
pub async fn remove_managed_pools(store: &dyn ObjectStore) -> Result<TeardownReport> {
    let machine_autoscalers = store
        .delete(
            &Kind::MACHINE_AUTOSCALER,
            Some(MACHINE_API_NAMESPACE),
            Selector::Labels(MANAGED_SELECTOR),
        )
        .await?;
    info!(count = machine_autoscalers, "deleted managed MachineAutoscalers");

    let machinesets = store
        .delete(
            &Kind::MACHINE_SET,
            Some(MACHINE_API_NAMESPACE),
            Selector::Labels(MANAGED_SELECTOR),
        )
        .await?;
    info!(count = machinesets, "deleted managed MachineSets");

    Ok(TeardownReport {
        machine_autoscalers,
        machinesets,
    })
}
