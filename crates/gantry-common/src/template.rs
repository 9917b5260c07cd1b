//! `${VAR}` manifest templates
//!
//! Supported patterns:
//! - `${VAR}` - replaced with the value from `vars`, or left as-is if missing
//! - `${VAR:=default}` / `${VAR:-default}` - value from `vars`, or `default`
//! - `${VAR="default"}` - same, with surrounding quotes stripped from the default

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::yaml::parse_yaml_multi;
use crate::{Error, Result};

/// Substitute `${VAR}` patterns in a template.
pub fn substitute_vars(template: &str, vars: &[(String, String)]) -> String {
    let var_map: HashMap<&str, &str> = vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    while let Some(start) = remaining.find("${") {
        result.push_str(&remaining[..start]);
        let after_start = &remaining[start + 2..];

        if let Some(end) = after_start.find('}') {
            let expr = &after_start[..end];
            result.push_str(&resolve_var_expr(expr, &var_map));
            remaining = &after_start[end + 1..];
        } else {
            // No closing brace: emit literal and advance past "${"
            result.push_str("${");
            remaining = after_start;
        }
    }
    result.push_str(remaining);
    result
}

fn resolve_var_expr(expr: &str, vars: &HashMap<&str, &str>) -> String {
    if let Some(pos) = expr.find(":=").or_else(|| expr.find(":-")) {
        let var_name = &expr[..pos];
        let default = &expr[pos + 2..];
        return vars
            .get(var_name)
            .map(|s| s.to_string())
            .unwrap_or_else(|| default.to_string());
    }

    if let Some(pos) = expr.find('=') {
        let var_name = &expr[..pos];
        let default = expr[pos + 1..].trim_matches('"');
        return vars
            .get(var_name)
            .map(|s| s.to_string())
            .unwrap_or_else(|| default.to_string());
    }

    vars.get(expr)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("${{{}}}", expr))
}

/// Names of `${VAR}` placeholders still present in rendered output
pub fn unresolved_vars(rendered: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut remaining = rendered;
    while let Some(start) = remaining.find("${") {
        let after_start = &remaining[start + 2..];
        match after_start.find('}') {
            Some(end) => {
                let name = after_start[..end].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
                remaining = &after_start[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Read a template file, substitute `vars`, and parse every YAML document.
///
/// A missing file is [`Error::MissingTemplate`]; placeholders left unresolved
/// after substitution are a template error.
pub fn render_file(path: &Path, vars: &[(String, String)]) -> Result<Vec<Value>> {
    let template = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingTemplate {
            path: path.to_path_buf(),
        },
        _ => Error::template(format!("failed to read {}: {}", path.display(), e)),
    })?;

    let rendered = substitute_vars(&template, vars);
    let missing = unresolved_vars(&rendered);
    if !missing.is_empty() {
        return Err(Error::template(format!(
            "{} has unresolved variables: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    parse_yaml_multi(&rendered)
        .map_err(|e| Error::template(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitute_vars_replaces_patterns() {
        let out = substitute_vars(
            "name: ${NAME}\nzone: ${ZONE}",
            &vars(&[("NAME", "demo-gpu-us-east-2a"), ("ZONE", "us-east-2a")]),
        );
        assert_eq!(out, "name: demo-gpu-us-east-2a\nzone: us-east-2a");
    }

    #[test]
    fn substitute_vars_leaves_unknown_patterns() {
        assert_eq!(substitute_vars("a: ${MISSING}", &[]), "a: ${MISSING}");
    }

    #[test]
    fn substitute_vars_handles_defaults() {
        assert_eq!(substitute_vars("${SIZE:=120}", &[]), "120");
        assert_eq!(substitute_vars("${SIZE:-120}", &[]), "120");
        assert_eq!(substitute_vars("${SIZE=\"120\"}", &[]), "120");
        assert_eq!(substitute_vars("${SIZE:=120}", &vars(&[("SIZE", "200")])), "200");
    }

    #[test]
    fn substitute_vars_unclosed_brace_is_literal() {
        assert_eq!(substitute_vars("a: ${OPEN", &[]), "a: ${OPEN");
    }

    #[test]
    fn unresolved_vars_are_reported_once() {
        assert_eq!(
            unresolved_vars("${A} ${B} ${A}"),
            vec!["A".to_string(), "B".to_string()]
        );
        assert!(unresolved_vars("plain").is_empty());
    }

    #[test]
    fn render_file_missing_is_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_file(&dir.path().join("machineset-gpu.yaml"), &[]).unwrap_err();
        assert!(matches!(err, Error::MissingTemplate { .. }));
    }

    #[test]
    fn render_file_parses_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns.yaml");
        std::fs::write(
            &path,
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: ${NS}\n---\napiVersion: v1\nkind: Namespace\nmetadata:\n  name: other\n",
        )
        .unwrap();

        let docs = render_file(&path, &vars(&[("NS", "openshift-gitops")])).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["metadata"]["name"], "openshift-gitops");
    }

    #[test]
    fn render_file_rejects_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.yaml");
        std::fs::write(&path, "name: ${NAME}\n").unwrap();
        let err = render_file(&path, &[]).unwrap_err();
        assert!(err.to_string().contains("NAME"));
    }
}
