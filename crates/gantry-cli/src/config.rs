//! Configuration sources
//!
//! Precedence, highest first: command-line flag, process environment, env
//! file, built-in default. The env file only fills in variables the
//! environment does not already define.

use std::path::{Path, PathBuf};

use gantry_cluster::{PoolRole, ProvisionRequest};
use tracing::debug;

use crate::{Error, Result};

/// Variable naming an env file to load
pub const ENV_FILE_VAR: &str = "GANTRY_ENV_FILE";

/// Env file loaded when [`ENV_FILE_VAR`] is unset
pub const DEFAULT_ENV_FILE: &str = "gantry.env";

/// Variables forwarded from the environment into manifest templates.
/// Namespaces are added by the commands from their resolved flags.
pub const TEMPLATE_VARS: &[&str] = &["REPO_URL", "REPO_REVISION"];

/// Read a variable from the process environment, treating empty as unset
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Parse `key=value` pairs from an env file
pub fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let env_file_err = |message: String| Error::EnvFile {
        path: path.to_path_buf(),
        message,
    };
    dotenvy::from_path_iter(path)
        .map_err(|e| env_file_err(e.to_string()))?
        .map(|item| item.map_err(|e| env_file_err(e.to_string())))
        .collect()
}

/// Pairs from the file that the environment does not already define
pub fn missing_from_env(
    pairs: Vec<(String, String)>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<(String, String)> {
    pairs
        .into_iter()
        .filter(|(key, _)| lookup(key).is_none())
        .collect()
}

/// Merge the env file into the process environment.
///
/// A missing default file is fine; a missing file named by
/// [`ENV_FILE_VAR`] is an error. Returns the file that was loaded.
pub fn load_env_file() -> Result<Option<PathBuf>> {
    let (path, explicit) = match env_lookup(ENV_FILE_VAR) {
        Some(path) => (PathBuf::from(path), true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };
    if !path.is_file() {
        if explicit {
            return Err(Error::EnvFile {
                path,
                message: "no such file".to_string(),
            });
        }
        return Ok(None);
    }

    let pairs = missing_from_env(read_env_file(&path)?, |k| std::env::var(k).ok());
    for (key, value) in &pairs {
        std::env::set_var(key, value);
    }
    debug!(path = %path.display(), set = pairs.len(), "loaded env file");
    Ok(Some(path))
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value.trim().parse().map_err(|_| {
        Error::validation(format!(
            "{} must be a non-negative integer, got '{}'",
            key, value
        ))
    })
}

/// Provisioning defaults for a role: built-in values overridden by
/// `<ROLE>_INSTANCE_TYPE`, `<ROLE>_REPLICAS`, `<ROLE>_MIN`, `<ROLE>_MAX`,
/// `<ROLE>_VOLUME_SIZE` and `AZ`
pub fn pool_defaults(
    role: PoolRole,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ProvisionRequest> {
    let prefix = role.as_str().to_uppercase();
    let var = |suffix: &str| {
        let key = format!("{}_{}", prefix, suffix);
        lookup(&key).map(|value| (key, value))
    };

    let mut req = ProvisionRequest::defaults(role);
    if let Some((_, instance_type)) = var("INSTANCE_TYPE") {
        req.instance_type = instance_type;
    }
    if let Some((key, value)) = var("REPLICAS") {
        req.replicas = parse_u32(&key, &value)?;
    }
    if let Some((key, value)) = var("MIN") {
        req.min = parse_u32(&key, &value)?;
    }
    if let Some((key, value)) = var("MAX") {
        req.max = parse_u32(&key, &value)?;
    }
    if let Some((key, value)) = var("VOLUME_SIZE") {
        req.volume_size = parse_u32(&key, &value)?;
    }
    req.zone = lookup("AZ");
    Ok(req)
}

/// `${VAR}` values for bootstrap and root manifests
pub fn template_vars(lookup: impl Fn(&str) -> Option<String>) -> Vec<(String, String)> {
    TEMPLATE_VARS
        .iter()
        .filter_map(|key| lookup(key).map(|value| (key.to_string(), value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_file_parses_comments_and_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gantry.env");
        std::fs::write(
            &path,
            "# cluster\nGPU_REPLICAS=2\nREPO_URL=\"https://git.example.com/p.git\"\n",
        )
        .unwrap();

        let pairs = read_env_file(&path).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("GPU_REPLICAS".to_string(), "2".to_string()),
                ("REPO_URL".to_string(), "https://git.example.com/p.git".to_string()),
            ]
        );
    }

    #[test]
    fn environment_wins_over_env_file() {
        let pairs = vec![
            ("GPU_REPLICAS".to_string(), "2".to_string()),
            ("AZ".to_string(), "us-east-2b".to_string()),
        ];
        let kept = missing_from_env(pairs, env(&[("GPU_REPLICAS", "5")]));
        assert_eq!(kept, vec![("AZ".to_string(), "us-east-2b".to_string())]);
    }

    #[test]
    fn pool_defaults_fall_back_to_built_ins() {
        let req = pool_defaults(PoolRole::Cpu, env(&[])).unwrap();
        assert_eq!(req, ProvisionRequest::defaults(PoolRole::Cpu));
    }

    #[test]
    fn pool_defaults_read_role_prefixed_variables() {
        let req = pool_defaults(
            PoolRole::Gpu,
            env(&[
                ("GPU_INSTANCE_TYPE", "g6.xlarge"),
                ("GPU_MAX", "8"),
                ("CPU_MAX", "99"),
                ("AZ", "us-east-2c"),
            ]),
        )
        .unwrap();
        assert_eq!(req.instance_type, "g6.xlarge");
        assert_eq!(req.max, 8);
        assert_eq!(req.min, 1);
        assert_eq!(req.zone.as_deref(), Some("us-east-2c"));
    }

    #[test]
    fn malformed_number_names_the_variable() {
        let err = pool_defaults(PoolRole::Gpu, env(&[("GPU_REPLICAS", "two")])).unwrap_err();
        assert!(err.to_string().contains("GPU_REPLICAS"));
    }

    #[test]
    fn template_vars_only_include_set_variables() {
        let vars = template_vars(env(&[("REPO_URL", "https://x"), ("UNRELATED", "y")]));
        assert_eq!(vars, vec![("REPO_URL".to_string(), "https://x".to_string())]);
    }
}
