//! Argo CD Application status

use std::fmt;

use gantry_common::store::{name_of, str_at};
use gantry_common::{Kind, ObjectStore, Result};
use serde_json::Value;

/// Annotation that makes Argo CD re-evaluate an Application immediately
pub const REFRESH_ANNOTATION: &str = "argocd.argoproj.io/refresh";

/// Declared-vs-live match of an Application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// Not reported yet
    Unknown,
    /// Live state matches git
    Synced,
    /// Live state differs from git
    OutOfSync,
}

impl SyncStatus {
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("Synced") => SyncStatus::Synced,
            Some("OutOfSync") => SyncStatus::OutOfSync,
            _ => SyncStatus::Unknown,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Unknown => "Unknown",
            SyncStatus::Synced => "Synced",
            SyncStatus::OutOfSync => "OutOfSync",
        })
    }
}

/// Runtime health of an Application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    /// Not reported yet
    Unknown,
    /// Resources are rolling out
    Progressing,
    /// Every resource is healthy
    Healthy,
    /// Some resource failed
    Degraded,
    /// Resources do not exist
    Missing,
}

impl HealthStatus {
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("Progressing") => HealthStatus::Progressing,
            Some("Healthy") => HealthStatus::Healthy,
            Some("Degraded") => HealthStatus::Degraded,
            Some("Missing") => HealthStatus::Missing,
            _ => HealthStatus::Unknown,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Unknown => "Unknown",
            HealthStatus::Progressing => "Progressing",
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Missing => "Missing",
        })
    }
}

/// Observed state of one Application
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppStatus {
    /// Application name
    pub name: String,
    /// Sync status
    pub sync: SyncStatus,
    /// Health status
    pub health: HealthStatus,
    /// Whether automated sync (prune + self-heal) is on
    pub automated: bool,
}

impl AppStatus {
    /// Read status from an Application object
    pub fn from_application(app: &Value) -> Self {
        Self {
            name: name_of(app).unwrap_or_default().to_string(),
            sync: SyncStatus::parse(str_at(app, "/status/sync/status")),
            health: HealthStatus::parse(str_at(app, "/status/health/status")),
            automated: app
                .pointer("/spec/syncPolicy/automated")
                .is_some_and(|a| !a.is_null()),
        }
    }

    /// Synced and Healthy
    pub fn is_converged(&self) -> bool {
        self.sync == SyncStatus::Synced && self.health == HealthStatus::Healthy
    }
}

/// Status of one Application, `None` when it does not exist
pub async fn get_status(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
) -> Result<Option<AppStatus>> {
    Ok(store
        .get(&Kind::APPLICATION, Some(namespace), name)
        .await?
        .as_ref()
        .map(AppStatus::from_application))
}

/// Status of every Application in a namespace, sorted by name
pub async fn list_statuses(store: &dyn ObjectStore, namespace: &str) -> Result<Vec<AppStatus>> {
    let mut statuses: Vec<AppStatus> = store
        .list(&Kind::APPLICATION, Some(namespace), None)
        .await?
        .iter()
        .map(AppStatus::from_application)
        .collect();
    statuses.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(statuses)
}


#[cfg(test)]
mod tests {
    use super::fixtures::application;
    use super::*;
    use serde_json::json;

    #[test]
    fn converged_requires_synced_and_healthy() {
        let app = AppStatus::from_application(&application("a", "Synced", "Healthy"));
        assert!(app.is_converged());

        let app = AppStatus::from_application(&application("a", "Synced", "Progressing"));
        assert!(!app.is_converged());

        let app = AppStatus::from_application(&application("a", "OutOfSync", "Healthy"));
        assert!(!app.is_converged());
    }

    #[test]
    fn missing_status_is_unknown() {
        let app = AppStatus::from_application(&json!({"metadata": {"name": "fresh"}}));
        assert_eq!(app.sync, SyncStatus::Unknown);
        assert_eq!(app.health, HealthStatus::Unknown);
        assert!(!app.automated);
    }

    #[test]
    fn automated_flag_reads_sync_policy() {
        let mut app = application("a", "Synced", "Healthy");
        app["spec"]["syncPolicy"]["automated"] = json!({"prune": true, "selfHeal": true});
        assert!(AppStatus::from_application(&app).automated);
    }
}
