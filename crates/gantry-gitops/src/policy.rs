//! Sync policy toggling
//!
//! Flipping automated sync on every Application is best-effort: a patch that
//! fails (the Application was deleted meanwhile, or is malformed) is logged
//! and skipped.

use gantry_common::store::name_of;
use gantry_common::{Kind, ObjectStore, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Automated sync setting of an Application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutomationFlag {
    /// Automated sync with prune and self-heal
    Enabled,
    /// Manual sync only
    Disabled,
}

impl AutomationFlag {
    /// Merge patch setting this flag
    pub fn patch(self) -> Value {
        match self {
            AutomationFlag::Enabled => json!({
                "spec": {"syncPolicy": {"automated": {"prune": true, "selfHeal": true}}}
            }),
            AutomationFlag::Disabled => json!({
                "spec": {"syncPolicy": {"automated": null}}
            }),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            AutomationFlag::Enabled => "enabled",
            AutomationFlag::Disabled => "disabled",
        }
    }
}

/// Set the automation flag of one Application
pub async fn set_automation(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    flag: AutomationFlag,
) -> Result<()> {
    store
        .patch(&Kind::APPLICATION, Some(namespace), name, &flag.patch())
        .await?;
    Ok(())
}

/// Outcome of a bulk toggle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToggleReport {
    /// Applications patched
    pub patched: Vec<String>,
    /// Applications whose patch failed
    pub failed: Vec<String>,
}

/// Set the automation flag on every Application in `namespace`.
///
/// Only listing can fail the call; per-Application failures land in
/// [`ToggleReport::failed`].
pub async fn set_sync_policy_all(
    store: &dyn ObjectStore,
    namespace: &str,
    flag: AutomationFlag,
) -> Result<ToggleReport> {
    let apps = store.list(&Kind::APPLICATION, Some(namespace), None).await?;
    let mut report = ToggleReport::default();

    for app in &apps {
        let Some(name) = name_of(app) else { continue };
        match set_automation(store, namespace, name, flag).await {
            Ok(()) => {
                info!(app = %name, "automated sync {}", flag.verb());
                report.patched.push(name.to_string());
            }
            Err(e) => {
                warn!(app = %name, error = %e, "failed to update sync policy, skipping");
                report.failed.push(name.to_string());
            }
        }
    }

    info!(
        patched = report.patched.len(),
        failed = report.failed.len(),
        "automated sync {} across applications",
        flag.verb()
    );
    Ok(report)
}
