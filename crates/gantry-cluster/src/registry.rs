//! Registry configuration: global pull secret and image mirror policies

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use gantry_common::store::ObjectRef;
use gantry_common::template::render_file;
use gantry_common::{Error, Kind, ObjectStore, Result};
use k8s_openapi::api::core::v1::Secret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

/// Namespace of the cluster-wide pull secret
pub const PULL_SECRET_NAMESPACE: &str = "openshift-config";

/// Name of the cluster-wide pull secret
pub const PULL_SECRET_NAME: &str = "pull-secret";

/// Data key holding the docker config
pub const DOCKERCONFIGJSON_KEY: &str = ".dockerconfigjson";

/// Mirror policy manifest file name
pub const ICSP_FILE: &str = "icsp.yaml";

/// Docker config JSON, as found in auth files and `.dockerconfigjson`
#[derive(Debug, Default, Deserialize, Serialize)]
struct DockerConfig {
    auths: Map<String, Value>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

/// Merge the registry credentials in `auth_file` into the cluster pull secret.
///
/// Entries for registries already present are replaced; everything else in
/// the secret is kept. Returns the merged registry hostnames.
pub async fn merge_pull_secret(store: &dyn ObjectStore, auth_file: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(auth_file).map_err(|e| {
        Error::validation(format!(
            "cannot read registry auth file {}: {}",
            auth_file.display(),
            e
        ))
    })?;
    let incoming: DockerConfig = serde_json::from_str(&raw)?;

    let secret = store
        .get(&Kind::SECRET, Some(PULL_SECRET_NAMESPACE), PULL_SECRET_NAME)
        .await?
        .ok_or_else(|| {
            Error::not_found(
                Kind::SECRET.kind,
                format!("{}/{}", PULL_SECRET_NAMESPACE, PULL_SECRET_NAME),
            )
        })?;
    let secret: Secret = serde_json::from_value(secret)?;

    let mut config = match secret
        .data
        .as_ref()
        .and_then(|data| data.get(DOCKERCONFIGJSON_KEY))
    {
        Some(bytes) => serde_json::from_slice::<DockerConfig>(&bytes.0)?,
        None => DockerConfig::default(),
    };

    let registries: Vec<String> = incoming.auths.keys().cloned().collect();
    config.auths.extend(incoming.auths);

    let encoded = STANDARD.encode(serde_json::to_vec(&config)?);
    store
        .patch(
            &Kind::SECRET,
            Some(PULL_SECRET_NAMESPACE),
            PULL_SECRET_NAME,
            &json!({"data": {DOCKERCONFIGJSON_KEY: encoded}}),
        )
        .await?;

    info!(registries = ?registries, "pull secret updated");
    Ok(registries)
}

/// Apply every document of `<manifests>/icsp.yaml`, returning what was applied
pub async fn apply_mirror_policies(
    store: &dyn ObjectStore,
    manifests_dir: &Path,
) -> Result<Vec<ObjectRef>> {
    let docs = render_file(&manifests_dir.join(ICSP_FILE), &[])?;
    let mut applied = Vec::with_capacity(docs.len());
    for doc in &docs {
        let target = ObjectRef::from_manifest(doc)?;
        store.apply(doc).await?;
        info!(object = %target, "applied");
        applied.push(target);
    }
    Ok(applied)
}
