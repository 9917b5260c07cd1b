//! Manifest YAML to `serde_json::Value`, via yaml-rust2
//!
//! The object store speaks JSON values, so rendered manifests are converted
//! here rather than deserialized into typed objects.

use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

use crate::{Error, Result};

fn load(input: &str) -> Result<Vec<Yaml>> {
    YamlLoader::load_from_str(input).map_err(|e| Error::template(format!("invalid YAML: {}", e)))
}

/// First document of `input`, `Value::Null` when there is none
pub fn parse_yaml(input: &str) -> Result<Value> {
    load(input)?
        .into_iter()
        .next()
        .map_or(Ok(Value::Null), to_json)
}

/// Every non-empty document of `input`, in order
pub fn parse_yaml_multi(input: &str) -> Result<Vec<Value>> {
    let mut docs = Vec::new();
    for doc in load(input)? {
        match to_json(doc)? {
            Value::Null => {}
            value => docs.push(value),
        }
    }
    Ok(docs)
}

fn key_string(key: Yaml) -> Result<String> {
    Ok(match key {
        Yaml::String(s) | Yaml::Real(s) => s,
        Yaml::Integer(i) => i.to_string(),
        Yaml::Boolean(b) => b.to_string(),
        Yaml::Null => "null".to_string(),
        other => {
            return Err(Error::template(format!(
                "mapping key {:?} is not a scalar",
                other
            )))
        }
    })
}

fn to_json(yaml: Yaml) -> Result<Value> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::from(i),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|_| Error::template(format!("invalid number '{}'", s)))?;
            Number::from_f64(f).map_or(Value::Null, Value::Number)
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(
            items
                .into_iter()
                .map(to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Yaml::Hash(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(key_string(k)?, to_json(v)?);
            }
            Value::Object(map)
        }
        Yaml::Alias(_) => return Err(Error::template("YAML aliases are not supported")),
        Yaml::BadValue => return Err(Error::template("malformed YAML value")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machineset_manifest_keeps_types() {
        let value = parse_yaml(
            r#"
apiVersion: machine.openshift.io/v1beta1
kind: MachineSet
metadata:
  name: demo-gpu-us-east-2a
spec:
  replicas: 1
  template:
    spec:
      metadata:
        labels:
          node-role.kubernetes.io/gpu: ""
"#,
        )
        .unwrap();
        assert_eq!(value["kind"], "MachineSet");
        assert_eq!(value["spec"]["replicas"], 1);
        assert_eq!(
            value["spec"]["template"]["spec"]["metadata"]["labels"]["node-role.kubernetes.io/gpu"],
            ""
        );
    }

    #[test]
    fn empty_documents_are_dropped() {
        let docs = parse_yaml_multi("---\nname: first\n---\n---\nname: second\n").unwrap();
        let names: Vec<_> = docs.iter().map(|d| d["name"].clone()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(parse_yaml_multi("").unwrap().is_empty());
        assert_eq!(parse_yaml("").unwrap(), Value::Null);
    }

    #[test]
    fn malformed_input_is_a_template_error() {
        let err = parse_yaml("not: valid: yaml: {{").unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
    }

    #[test]
    fn scalars_and_numeric_keys() {
        let value = parse_yaml("enabled: true\nratio: 1.5\nnothing: null\n8080: http").unwrap();
        assert_eq!(value["enabled"], true);
        assert_eq!(value["ratio"], 1.5);
        assert!(value["nothing"].is_null());
        assert_eq!(value["8080"], "http");
    }
}
