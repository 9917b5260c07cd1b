//! In-memory [`ObjectStore`] for tests
//!
//! Behaves like the API server for everything gantry relies on: upsert by
//! identity, JSON merge patch, label selectors, and a resourceVersion that only
//! moves when stored content changes. Every call is recorded so tests can
//! assert on the exact sequence of operations, and failures can be injected
//! per kind (apply) or per object (patch).

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::store::{labels_of, Kind, LabelSelector, ObjectRef, ObjectStore, Selector};
use crate::{Error, Result};

type Key = (String, String, String, String);

fn key(api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> Key {
    (
        api_version.to_string(),
        kind.to_string(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

/// Store operation verbs recorded in the operation log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    /// `get`
    Get,
    /// `apply`
    Apply,
    /// `patch`
    Patch,
    /// `delete`
    Delete,
    /// `list`
    List,
}

/// One recorded store call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Op {
    /// What was called
    pub verb: Verb,
    /// Resource kind
    pub kind: String,
    /// Object name, or the selector for list/label deletes
    pub target: String,
}

/// In-memory object store
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<Key, Value>>,
    rejected_kinds: Mutex<BTreeSet<String>>,
    failing_patches: Mutex<BTreeSet<String>>,
    ops: Mutex<Vec<Op>>,
    version: Mutex<u64>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert objects directly, bypassing the operation log
    pub fn seed(&self, objects: impl IntoIterator<Item = Value>) {
        for obj in objects {
            self.insert(obj);
        }
    }

    /// Insert or overwrite an object directly, bypassing the operation log
    pub fn insert(&self, obj: Value) {
        let Ok(target) = ObjectRef::from_manifest(&obj) else {
            panic!("seeded object is missing apiVersion, kind or name: {}", obj);
        };
        let k = key(
            &target.api_version,
            &target.kind,
            target.namespace.as_deref(),
            &target.name,
        );
        self.objects.lock().insert(k, obj);
    }

    /// Remove an object directly, bypassing the operation log
    pub fn remove(&self, kind: &Kind, namespace: Option<&str>, name: &str) {
        self.objects
            .lock()
            .remove(&key(kind.api_version, kind.kind, namespace, name));
    }

    /// Replace the `status` of an existing object
    pub fn set_status(&self, kind: &Kind, namespace: Option<&str>, name: &str, status: Value) {
        if let Some(obj) = self
            .objects
            .lock()
            .get_mut(&key(kind.api_version, kind.kind, namespace, name))
        {
            obj["status"] = status;
        }
    }

    /// Read an object without recording the call
    pub fn peek(&self, kind: &Kind, namespace: Option<&str>, name: &str) -> Option<Value> {
        self.objects
            .lock()
            .get(&key(kind.api_version, kind.kind, namespace, name))
            .cloned()
    }

    /// Number of stored objects of a kind
    pub fn count(&self, kind: &Kind) -> usize {
        self.objects
            .lock()
            .keys()
            .filter(|(av, k, _, _)| av == kind.api_version && k == kind.kind)
            .count()
    }

    /// Make every `apply` of the given kind fail until [`Self::accept_kind`]
    pub fn reject_kind(&self, kind: &str) {
        self.rejected_kinds.lock().insert(kind.to_string());
    }

    /// Stop rejecting applies of a kind
    pub fn accept_kind(&self, kind: &str) {
        self.rejected_kinds.lock().remove(kind);
    }

    /// Make every `patch` of the named object fail
    pub fn fail_patches_for(&self, name: &str) {
        self.failing_patches.lock().insert(name.to_string());
    }

    /// Every call made so far
    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    /// Names targeted by calls of one verb on one kind, in call order
    pub fn targets(&self, verb: Verb, kind: &Kind) -> Vec<String> {
        self.ops
            .lock()
            .iter()
            .filter(|op| op.verb == verb && op.kind == kind.kind)
            .map(|op| op.target.clone())
            .collect()
    }

    fn record(&self, verb: Verb, kind: &str, target: &str) {
        self.ops.lock().push(Op {
            verb,
            kind: kind.to_string(),
            target: target.to_string(),
        });
    }

    fn next_version(&self) -> String {
        let mut version = self.version.lock();
        *version += 1;
        version.to_string()
    }
}

fn without_version(obj: &Value) -> Value {
    let mut obj = obj.clone();
    if let Some(meta) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("resourceVersion");
    }
    obj
}

/// Apply an RFC 7386 JSON merge patch in place
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    if let Value::Object(target_map) = target {
        for (k, v) in patch_map {
            if v.is_null() {
                target_map.remove(k);
            } else {
                merge_patch(target_map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>> {
        self.record(Verb::Get, kind.kind, name);
        Ok(self.peek(kind, namespace, name))
    }

    async fn apply(&self, manifest: &Value) -> Result<Value> {
        let target = ObjectRef::from_manifest(manifest)?;
        self.record(Verb::Apply, &target.kind, &target.name);

        if self.rejected_kinds.lock().contains(&target.kind) {
            return Err(Error::store(
                "apply",
                format!("no matches for kind \"{}\" in {}", target.kind, target.api_version),
            ));
        }

        let k = key(
            &target.api_version,
            &target.kind,
            target.namespace.as_deref(),
            &target.name,
        );
        let mut objects = self.objects.lock();
        let existing = objects.get(&k).cloned();

        let mut desired = manifest.clone();
        if let Some(existing) = &existing {
            if let Some(status) = existing.get("status") {
                desired["status"] = status.clone();
            }
        }

        let stored = match existing {
            Some(existing) if without_version(&existing) == without_version(&desired) => existing,
            _ => {
                desired["metadata"]["resourceVersion"] = Value::String(self.next_version());
                desired
            }
        };
        objects.insert(k, stored.clone());
        Ok(stored)
    }

    async fn patch(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        self.record(Verb::Patch, kind.kind, name);

        if self.failing_patches.lock().contains(name) {
            return Err(Error::store(
                "patch",
                format!("injected failure for {}", name),
            ));
        }

        let mut objects = self.objects.lock();
        let obj = objects
            .get_mut(&key(kind.api_version, kind.kind, namespace, name))
            .ok_or_else(|| Error::not_found(kind.kind, name))?;

        let before = without_version(obj);
        merge_patch(obj, patch);
        if without_version(obj) != before {
            obj["metadata"]["resourceVersion"] = Value::String(self.next_version());
        }
        Ok(obj.clone())
    }

    async fn delete(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        selector: Selector<'_>,
    ) -> Result<usize> {
        match selector {
            Selector::Name(name) => {
                self.record(Verb::Delete, kind.kind, name);
                let removed = self
                    .objects
                    .lock()
                    .remove(&key(kind.api_version, kind.kind, namespace, name));
                Ok(usize::from(removed.is_some()))
            }
            Selector::Labels(labels) => {
                self.record(Verb::Delete, kind.kind, labels);
                let selector = LabelSelector::parse(labels)?;
                let mut objects = self.objects.lock();
                let doomed: Vec<Key> = objects
                    .iter()
                    .filter(|((av, k, ns, _), obj)| {
                        av == kind.api_version
                            && k == kind.kind
                            && namespace.map_or(true, |n| n == ns)
                            && selector.matches(&labels_of(obj))
                    })
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in &doomed {
                    objects.remove(k);
                }
                Ok(doomed.len())
            }
        }
    }

    async fn list(
        &self,
        kind: &Kind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.record(Verb::List, kind.kind, label_selector.unwrap_or_default());
        let selector = LabelSelector::parse(label_selector.unwrap_or_default())?;
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|((av, k, ns, _), obj)| {
                av == kind.api_version
                    && k == kind.kind
                    && namespace.map_or(true, |n| n == ns)
                    && selector.matches(&labels_of(obj))
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }
}
