//! Catalog image refresh
//!
//! Deletes the catalog pod so it is recreated from a freshly pulled image,
//! waits for the replacement, then deletes the operator pod so it reads the
//! refreshed catalog. Nothing here fails the command: delete errors and
//! readiness timeouts are logged and skipped.

use std::collections::BTreeSet;
use std::time::Duration;

use gantry_common::conditions::pod_ready;
use gantry_common::poll::poll_until;
use gantry_common::store::name_of;
use gantry_common::{Kind, ObjectStore, Selector};
use tracing::{info, warn};

/// Pods selected by namespace and labels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodTarget {
    /// Namespace of the pods
    pub namespace: String,
    /// Label selector
    pub selector: String,
}

impl PodTarget {
    /// Target pods in `namespace` matching `selector`
    pub fn new(namespace: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            selector: selector.into(),
        }
    }
}

/// What to refresh and how long to wait
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRefresh {
    /// Catalog (cache) pods, recreated first
    pub catalog: PodTarget,
    /// Operator pods, recreated after the catalog is back
    pub operator: PodTarget,
    /// Budget for the replacement catalog pod
    pub timeout: Duration,
    /// Interval between readiness checks
    pub interval: Duration,
}

impl Default for ImageRefresh {
    fn default() -> Self {
        Self {
            catalog: PodTarget::new("openshift-marketplace", "olm.catalogSource=redhat-operators"),
            operator: PodTarget::new(
                "openshift-operator-lifecycle-manager",
                "app=catalog-operator",
            ),
            timeout: Duration::from_secs(300),
            interval: Duration::from_secs(5),
        }
    }
}

/// What a refresh did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Catalog pods deleted
    pub catalog_deleted: usize,
    /// Whether a replacement catalog pod became Ready in time
    pub catalog_ready: bool,
    /// Operator pods deleted
    pub operator_deleted: usize,
}

async fn delete_pods(store: &dyn ObjectStore, target: &PodTarget) -> usize {
    match store
        .delete(
            &Kind::POD,
            Some(&target.namespace),
            Selector::Labels(&target.selector),
        )
        .await
    {
        Ok(deleted) => {
            info!(
                namespace = %target.namespace,
                selector = %target.selector,
                deleted,
                "deleted pods"
            );
            deleted
        }
        Err(e) => {
            warn!(
                namespace = %target.namespace,
                selector = %target.selector,
                error = %e,
                "failed to delete pods, continuing"
            );
            0
        }
    }
}

/// Run the refresh
pub async fn refresh_images(store: &dyn ObjectStore, refresh: &ImageRefresh) -> RefreshReport {
    let mut report = RefreshReport::default();

    let previous: BTreeSet<String> = match store
        .list(
            &Kind::POD,
            Some(&refresh.catalog.namespace),
            Some(&refresh.catalog.selector),
        )
        .await
    {
        Ok(pods) => pods
            .iter()
            .filter_map(name_of)
            .map(str::to_string)
            .collect(),
        Err(e) => {
            warn!(error = %e, "failed to list catalog pods");
            BTreeSet::new()
        }
    };

    report.catalog_deleted = delete_pods(store, &refresh.catalog).await;

    let catalog = &refresh.catalog;
    let previous = &previous;
    report.catalog_ready = poll_until(
        "replacement catalog pod Ready",
        refresh.interval,
        refresh.timeout,
        || async move {
            let pods = store
                .list(&Kind::POD, Some(&catalog.namespace), Some(&catalog.selector))
                .await?;
            Ok(pods.iter().any(|pod| {
                pod_ready(pod) && name_of(pod).is_some_and(|name| !previous.contains(name))
            }))
        },
    )
    .await
    .is_ready();

    if !report.catalog_ready {
        warn!(
            timeout_secs = refresh.timeout.as_secs(),
            "catalog pod not Ready in time, restarting the operator anyway"
        );
    }

    report.operator_deleted = delete_pods(store, &refresh.operator).await;
    report
}
