//! Manual MachineSet replica changes

use std::str::FromStr;

use gantry_common::{Error, Kind, ObjectStore, Result, MACHINE_API_NAMESPACE};
use serde_json::{json, Value};
use tracing::info;

/// Requested replica change: `N`, `+N` or `-N`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicaChange {
    /// Set replicas to exactly this value
    Absolute(u32),
    /// Add replicas
    Increase(u32),
    /// Remove replicas, stopping at zero
    Decrease(u32),
}

impl ReplicaChange {
    /// Resulting replica count from the current one
    pub fn apply_to(self, current: u32) -> u32 {
        match self {
            ReplicaChange::Absolute(n) => n,
            ReplicaChange::Increase(n) => current.saturating_add(n),
            ReplicaChange::Decrease(n) => current.saturating_sub(n),
        }
    }
}

impl FromStr for ReplicaChange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parse = |digits: &str| {
            digits.parse::<u32>().map_err(|_| {
                Error::validation(format!(
                    "invalid replica count '{}', expected N, +N or -N",
                    s
                ))
            })
        };
        if let Some(rest) = s.strip_prefix('+') {
            parse(rest).map(ReplicaChange::Increase)
        } else if let Some(rest) = s.strip_prefix('-') {
            parse(rest).map(ReplicaChange::Decrease)
        } else {
            parse(s).map(ReplicaChange::Absolute)
        }
    }
}

/// Replica count before and after a scale
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleOutcome {
    /// Replicas before
    pub from: u32,
    /// Replicas after
    pub to: u32,
}

fn replicas_of(machineset: &Value) -> u32 {
    machineset
        .pointer("/spec/replicas")
        .and_then(Value::as_u64)
        .and_then(|r| u32::try_from(r).ok())
        .unwrap_or(0)
}

/// Change the replica count of a MachineSet
pub async fn scale_pool(
    store: &dyn ObjectStore,
    name: &str,
    change: ReplicaChange,
) -> Result<ScaleOutcome> {
    let machineset = store
        .get(&Kind::MACHINE_SET, Some(MACHINE_API_NAMESPACE), name)
        .await?
        .ok_or_else(|| Error::not_found(Kind::MACHINE_SET.kind, name))?;

    let from = replicas_of(&machineset);
    let to = change.apply_to(from);
    if from != to {
        store
            .patch(
                &Kind::MACHINE_SET,
                Some(MACHINE_API_NAMESPACE),
                name,
                &json!({"spec": {"replicas": to}}),
            )
            .await?;
    }
    info!(machineset = %name, from, to, "scaled");
    Ok(ScaleOutcome { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machineset::fixtures::worker_machineset;
    use gantry_common::memory::{MemoryStore, Verb};

    #[test]
    fn parses_replica_changes() {
        assert_eq!("3".parse::<ReplicaChange>().unwrap(), ReplicaChange::Absolute(3));
        assert_eq!("+2".parse::<ReplicaChange>().unwrap(), ReplicaChange::Increase(2));
        assert_eq!("-1".parse::<ReplicaChange>().unwrap(), ReplicaChange::Decrease(1));
        assert!("two".parse::<ReplicaChange>().is_err());
        assert!("+".parse::<ReplicaChange>().is_err());
        assert!("".parse::<ReplicaChange>().is_err());
    }

    #[test]
    fn decrease_saturates_at_zero() {
        assert_eq!(ReplicaChange::Decrease(5).apply_to(2), 0);
        assert_eq!(ReplicaChange::Increase(2).apply_to(2), 4);
        assert_eq!(ReplicaChange::Absolute(7).apply_to(2), 7);
    }

    #[tokio::test]
    async fn scales_relative_to_current() {
        let store = MemoryStore::new();
        store.seed([worker_machineset("demo-gpu-us-east-2a", "us-east-2a")]);

        let outcome = scale_pool(&store, "demo-gpu-us-east-2a", ReplicaChange::Increase(1))
            .await
            .unwrap();

        assert_eq!(outcome, ScaleOutcome { from: 2, to: 3 });
        let ms = store
            .peek(&Kind::MACHINE_SET, Some(MACHINE_API_NAMESPACE), "demo-gpu-us-east-2a")
            .unwrap();
        assert_eq!(ms["spec"]["replicas"], 3);
    }

    #[tokio::test]
    async fn unchanged_count_does_not_patch() {
        let store = MemoryStore::new();
        store.seed([worker_machineset("demo-gpu-us-east-2a", "us-east-2a")]);

        scale_pool(&store, "demo-gpu-us-east-2a", ReplicaChange::Absolute(2))
            .await
            .unwrap();

        assert!(store.targets(Verb::Patch, &Kind::MACHINE_SET).is_empty());
    }

    #[tokio::test]
    async fn unknown_pool_is_not_found() {
        let store = MemoryStore::new();
        let err = scale_pool(&store, "ghost", ReplicaChange::Absolute(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
