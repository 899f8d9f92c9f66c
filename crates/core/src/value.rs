// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversions between the YAML document model and the [`serde_json::Value`]
//! used internally to represent rendered, possibly-typed values.
//!
//! Flow/manifest/profile documents are authored as YAML; once parsed we work
//! exclusively in `serde_json::Value` so the resolver, validator and
//! executor share one mapping/list/scalar representation.

use serde_json::Value;

/// Convert a parsed YAML document into the internal JSON value model.
///
/// YAML mapping keys that aren't strings (rare, e.g. `? 1`) are stringified;
/// AetherFlow documents never rely on non-string keys.
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut obj = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    other => yaml_to_json(other).to_string(),
                };
                obj.insert(key, yaml_to_json(v));
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Render a [`Value`] as a string for concatenation inside a template
/// (e.g. `"prefix {{X}}"`). Strings pass through unescaped; scalars use
/// their natural textual form; mappings/lists use compact JSON.
pub fn json_to_string_lossy(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
