//! Per-worker environment derivation
//!
//! Turns the configured `env_variables` mapping into the concrete set of
//! variables passed to one worker process.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Marker telling the worker's process it runs under test
pub const TEST_FLAG: &str = "TEST";

/// Worker index visible to the worker's process
pub const WORKER_INDEX_VAR: &str = "TEST_PROCESS_NUMBER";

/// Comma-separated names of every other exported variable
pub const MANIFEST_VAR: &str = "PARALLEL_CUCUMBER_EXPORTS";

/// Concrete variables for one worker
pub type Environment = BTreeMap<String, String>;

/// Environment configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnvError {
    #[error("Don't know how to set '{value}' to the environment variable '{name}'")]
    UnsupportedShape { name: String, value: String },
}

/// A single scalar value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scalar(String);

impl Scalar {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar(s.clone())),
            Value::Number(n) => Some(Scalar(n.to_string())),
            Value::Bool(b) => Some(Scalar(b.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One configured variable, classified by shape
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvValue {
    /// Same value for every worker
    Scalar(Scalar),
    /// Value at the worker's position
    Sequence(Vec<Option<Scalar>>),
    /// Value under the worker's stringified index
    Keyed(BTreeMap<String, Option<Scalar>>),
    /// Not exported
    Absent,
}

impl EnvValue {
    /// Classify a raw configuration value
    pub fn classify(name: &str, value: &Value) -> Result<Self, EnvError> {
        let unsupported = || EnvError::UnsupportedShape {
            name: name.to_string(),
            value: value.to_string(),
        };
        let element = |v: &Value| match v {
            Value::Null => Ok(None),
            other => Scalar::from_json(other).map(Some).ok_or_else(unsupported),
        };

        match value {
            Value::Null => Ok(EnvValue::Absent),
            Value::Array(items) => items
                .iter()
                .map(element)
                .collect::<Result<_, _>>()
                .map(EnvValue::Sequence),
            Value::Object(entries) => entries
                .iter()
                .map(|(k, v)| element(v).map(|v| (k.clone(), v)))
                .collect::<Result<_, _>>()
                .map(EnvValue::Keyed),
            scalar => Scalar::from_json(scalar)
                .map(EnvValue::Scalar)
                .ok_or_else(unsupported),
        }
    }

    /// Resolve the value for one worker
    pub fn resolve(&self, worker_index: usize) -> Option<&str> {
        match self {
            EnvValue::Scalar(s) => Some(s.as_str()),
            EnvValue::Sequence(items) => items
                .get(worker_index)
                .and_then(Option::as_ref)
                .map(Scalar::as_str),
            EnvValue::Keyed(entries) => entries
                .get(&worker_index.to_string())
                .and_then(Option::as_ref)
                .map(Scalar::as_str),
            EnvValue::Absent => None,
        }
    }

    /// Number of per-worker slots, if indexed
    pub fn slots(&self) -> Option<usize> {
        match self {
            EnvValue::Sequence(items) => Some(items.len()),
            EnvValue::Keyed(entries) => Some(entries.len()),
            EnvValue::Scalar(_) | EnvValue::Absent => None,
        }
    }
}

/// The configured `env_variables` mapping, as read from config or CLI
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvSpec(BTreeMap<String, Value>);

impl EnvSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a JSON or YAML document
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        match serde_json::from_str(text) {
            Ok(spec) => Ok(spec),
            Err(_) => Ok(serde_yaml::from_str(text)?),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Classify every entry, failing on the first unsupported shape
    pub fn classify(&self) -> Result<Vec<(&str, EnvValue)>, EnvError> {
        self.0
            .iter()
            .map(|(name, value)| EnvValue::classify(name, value).map(|v| (name.as_str(), v)))
            .collect()
    }

    /// Validate every entry's shape
    pub fn validate(&self) -> Result<(), EnvError> {
        self.classify().map(|_| ())
    }

    /// Worker count implied by indexed entries; 1 if none are indexed
    pub fn infer_worker_count(&self) -> Result<usize, EnvError> {
        Ok(self
            .classify()?
            .iter()
            .filter_map(|(_, value)| value.slots())
            .fold(1, usize::max))
    }
}

/// Derive the environment for one worker.
///
/// Configured entries win over the `TEST` and `TEST_PROCESS_NUMBER`
/// defaults. The manifest variable is always recomputed from the final key
/// set.
pub fn derive(spec: &EnvSpec, worker_index: usize) -> Result<Environment, EnvError> {
    let mut env: Environment = spec
        .classify()?
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .resolve(worker_index)
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect();

    env.remove(MANIFEST_VAR);
    env.entry(TEST_FLAG.to_string())
        .or_insert_with(|| "1".to_string());
    env.entry(WORKER_INDEX_VAR.to_string())
        .or_insert_with(|| worker_index.to_string());

    let manifest = env.keys().cloned().collect::<Vec<_>>().join(",");
    env.insert(MANIFEST_VAR.to_string(), manifest);

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_applies_to_every_worker() {
        let spec = EnvSpec::new()
            .with("FOO", json!("bar"))
            .with("RETRIES", json!(3))
            .with("HEADLESS", json!(true));

        for index in 0..3 {
            let env = derive(&spec, index).unwrap();
            assert_eq!(env["FOO"], "bar");
            assert_eq!(env["RETRIES"], "3");
            assert_eq!(env["HEADLESS"], "true");
        }
    }

    #[test]
    fn test_sequence_by_position() {
        let spec = EnvSpec::new().with("DEVICE", json!(["emulator-5554", "emulator-5556"]));

        assert_eq!(derive(&spec, 0).unwrap()["DEVICE"], "emulator-5554");
        assert_eq!(derive(&spec, 1).unwrap()["DEVICE"], "emulator-5556");
        assert!(!derive(&spec, 2).unwrap().contains_key("DEVICE"));
    }

    #[test]
    fn test_keyed_mapping_skips_missing_index() {
        let spec = EnvSpec::new().with("PORT", json!({"0": 4723, "2": 4725}));

        assert_eq!(derive(&spec, 0).unwrap()["PORT"], "4723");
        assert!(!derive(&spec, 1).unwrap().contains_key("PORT"));
        assert_eq!(derive(&spec, 2).unwrap()["PORT"], "4725");
    }

    #[test]
    fn test_null_is_skipped() {
        let spec = EnvSpec::new()
            .with("UNSET", json!(null))
            .with("HOLES", json!([null, "x"]));

        let env = derive(&spec, 0).unwrap();
        assert!(!env.contains_key("UNSET"));
        assert!(!env.contains_key("HOLES"));
        assert_eq!(derive(&spec, 1).unwrap()["HOLES"], "x");
    }

    #[test]
    fn test_unsupported_shape() {
        let spec = EnvSpec::new().with("NESTED", json!([["a"], ["b"]]));
        let err = derive(&spec, 0).unwrap_err();
        assert!(matches!(err, EnvError::UnsupportedShape { ref name, .. } if name == "NESTED"));

        let spec = EnvSpec::new().with("DEEP", json!({"0": {"x": 1}}));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_defaults_and_precedence() {
        let env = derive(&EnvSpec::new(), 4).unwrap();
        assert_eq!(env[TEST_FLAG], "1");
        assert_eq!(env[WORKER_INDEX_VAR], "4");

        let spec = EnvSpec::new().with(TEST_FLAG, json!("0"));
        assert_eq!(derive(&spec, 4).unwrap()[TEST_FLAG], "0");
    }

    #[test]
    fn test_manifest_lists_other_keys() {
        let spec = EnvSpec::new()
            .with("FOO", json!("bar"))
            .with(MANIFEST_VAR, json!("SOMETHING_ELSE"));

        let env = derive(&spec, 0).unwrap();
        assert_eq!(env[MANIFEST_VAR], "FOO,TEST,TEST_PROCESS_NUMBER");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let spec = EnvSpec::new()
            .with("A", json!(["x", "y"]))
            .with("B", json!({"1": "z"}))
            .with("C", json!(1.5));

        for index in 0..3 {
            assert_eq!(derive(&spec, index), derive(&spec, index));
        }
    }

    #[test]
    fn test_infer_worker_count() {
        let spec = EnvSpec::new()
            .with("DEVICE", json!(["a", "b", "c", "d", "e"]))
            .with("FOO", json!("a long scalar string"));
        assert_eq!(spec.infer_worker_count().unwrap(), 5);

        let spec = EnvSpec::new().with("PORT", json!({"0": 1, "1": 2}));
        assert_eq!(spec.infer_worker_count().unwrap(), 2);

        let spec = EnvSpec::new().with("FOO", json!("bar"));
        assert_eq!(spec.infer_worker_count().unwrap(), 1);
        assert_eq!(EnvSpec::new().infer_worker_count().unwrap(), 1);
    }

    #[test]
    fn test_parse_json_and_yaml() {
        let from_json = EnvSpec::parse(r#"{"FOO": "bar", "IDX": [1, 2]}"#).unwrap();
        let from_yaml = EnvSpec::parse("FOO: bar\nIDX:\n  - 1\n  - 2\n").unwrap();
        assert_eq!(from_json, from_yaml);
    }
}
