//! Backend configuration: the JSON/TOML tree from spec §6.3, with recognized
//! keys pulled out into a typed view and a shadow-diff warning for anything
//! left over, logged via `log` when a config value doesn't match what the
//! rest of the program expects.

use std::collections::BTreeSet;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfiguredAccessMode {
    Write,
    Read,
    Append,
    Readrandomaccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfiguredFlushTarget {
    Disk,
    Buffer,
    Step,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: JsonValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Adios2EngineConfig {
    #[serde(rename = "type")]
    pub engine_type: Option<String>,
    #[serde(default)]
    pub parameters: std::collections::BTreeMap<String, String>,
    pub access_mode: Option<ConfiguredAccessMode>,
    pub flush_target: Option<ConfiguredFlushTarget>,
    pub treat_unsupported_engine_like: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Adios2Config {
    #[serde(default)]
    pub engine: Adios2EngineConfig,
    pub use_group_table: Option<bool>,
    pub use_span_based_put: Option<bool>,
    pub modifiable_attributes: Option<bool>,
    #[serde(default)]
    pub attribute_writing_ranks: AttributeWritingRanks,
    #[serde(default, rename = "dataset")]
    pub dataset: Adios2DatasetConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Adios2DatasetConfig {
    #[serde(default)]
    pub operators: Vec<OperatorConfig>,
}

/// `adios2.attribute_writing_ranks`: a single rank or a list of ranks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeWritingRanks {
    All,
    One(i64),
    Many(Vec<i64>),
}

impl Default for AttributeWritingRanks {
    fn default() -> Self {
        AttributeWritingRanks::All
    }
}

impl AttributeWritingRanks {
    pub fn allows(&self, rank: i64) -> bool {
        match self {
            AttributeWritingRanks::All => true,
            AttributeWritingRanks::One(r) => *r == rank,
            AttributeWritingRanks::Many(rs) => rs.contains(&rank),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hdf5ChunksConfig {
    Auto,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hdf5DatasetConfig {
    pub chunks: Option<Hdf5ChunksConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hdf5Config {
    #[serde(default)]
    pub dataset: Hdf5DatasetConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub adios2: Adios2Config,
    #[serde(default)]
    pub hdf5: Hdf5Config,
}

impl BackendConfig {
    /// Parses a JSON document, per spec §6.3.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(input)
            .map_err(|e| Error::config_schema(&[], format!("invalid JSON: {e}")))?;
        Self::from_json_value(value)
    }

    /// Parses a TOML document, per spec §6.3.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(input)
            .map_err(|e| Error::config_schema(&[], format!("invalid TOML: {e}")))?;
        let json = toml_to_json(value);
        Self::from_json_value(json)
    }

    fn from_json_value(value: JsonValue) -> Result<Self> {
        warn_on_unrecognized_keys(&value);
        serde_json::from_value(value)
            .map_err(|e| Error::config_schema(&[], format!("backend config schema error: {e}")))
    }
}

fn toml_to_json(value: toml::Value) -> JsonValue {
    match value {
        toml::Value::String(s) => JsonValue::String(s),
        toml::Value::Integer(i) => JsonValue::from(i),
        toml::Value::Float(f) => {
            JsonValue::from(serde_json::Number::from_f64(f).unwrap_or_else(|| 0.into()))
        }
        toml::Value::Boolean(b) => JsonValue::Bool(b),
        toml::Value::Datetime(d) => JsonValue::String(d.to_string()),
        toml::Value::Array(a) => JsonValue::Array(a.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(t) => {
            JsonValue::Object(t.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}

/// Recognized top-level/second-level keys, spec §6.3. Anything under
/// `adios2`/`hdf5` not in this set triggers a shadow-diff warning naming the
/// key path (property 8), while valid keys elsewhere in the document still
/// take effect (the warning does not abort parsing).
fn recognized_keys() -> BTreeSet<&'static str> {
    [
        "adios2.engine.type",
        "adios2.engine.parameters",
        "adios2.engine.access_mode",
        "adios2.engine.flush_target",
        "adios2.engine.treat_unsupported_engine_like",
        "adios2.use_group_table",
        "adios2.use_span_based_put",
        "adios2.modifiable_attributes",
        "adios2.attribute_writing_ranks",
        "adios2.dataset.operators",
        "hdf5.dataset.chunks",
    ]
    .into_iter()
    .collect()
}

fn warn_on_unrecognized_keys(value: &JsonValue) {
    let recognized = recognized_keys();
    let mut seen_paths = Vec::new();
    collect_leaf_paths(value, String::new(), &mut seen_paths);
    for path in seen_paths {
        if (path.starts_with("adios2.") || path.starts_with("hdf5."))
            && !recognized.contains(path.as_str())
            && !path.starts_with("adios2.engine.parameters.")
        {
            warn!("unrecognized openPMD backend configuration key: {path}");
        }
    }
}

fn collect_leaf_paths(value: &JsonValue, prefix: String, out: &mut Vec<String>) {
    match value {
        JsonValue::Object(map) => {
            for (k, v) in map {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                collect_leaf_paths(v, path, out);
            }
        }
        _ => out.push(prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_adios2_keys() {
        let cfg = BackendConfig::from_json_str(
            r#"{"adios2": {"engine": {"type": "bp5"}, "use_group_table": true}}"#,
        )
        .unwrap();
        assert_eq!(cfg.adios2.engine.engine_type.as_deref(), Some("bp5"));
        assert_eq!(cfg.adios2.use_group_table, Some(true));
    }

    #[test]
    fn unrecognized_key_does_not_break_parsing() {
        // property 8: a malformed/unused key warns but the rest still applies.
        let cfg = BackendConfig::from_json_str(
            r#"{"adios2": {"bogus_key": 1, "use_group_table": false}}"#,
        )
        .unwrap();
        assert_eq!(cfg.adios2.use_group_table, Some(false));
    }

    #[test]
    fn attribute_writing_ranks_accepts_scalar_or_list() {
        let single: AttributeWritingRanks = serde_json::from_str("2").unwrap();
        assert!(single.allows(2) && !single.allows(3));
        let many: AttributeWritingRanks = serde_json::from_str("[0, 2]").unwrap();
        assert!(many.allows(0) && !many.allows(1));
    }
}
