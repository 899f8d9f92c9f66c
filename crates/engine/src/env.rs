// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Env files (§6 "Env files"): additional environment variable sources
//! layered onto the ambient env snapshot before a run starts (§4.3
//! "Environment snapshot": ambient env, then env_files, in declaration
//! order, each later file's keys overriding earlier ones).
//!
//! Three shapes, selected by `EnvFileSpec.type`:
//!   - `dotenv` — `KEY=VALUE` lines; blank lines and `#` comments skipped;
//!     a value may be wrapped in matching single or double quotes.
//!   - `json`   — a flat JSON object; non-string values are stringified
//!     the same way the resolver stringifies a rendered value for
//!     concatenation.
//!   - `dir`    — one file per variable: the file's name is the key, its
//!     contents (trailing newline stripped) the value — the Docker/
//!     Kubernetes secrets-mount convention.
//!
//! Every key loaded from a file gets `EnvFileSpec.prefix` prepended before
//! merging into the snapshot.

use std::collections::BTreeMap;
use std::path::Path;

use aetherflow_core::{json_to_string_lossy, EnvFileSpec};
use serde_json::Value;

use crate::error::StepError;

/// Load one env file per its declared shape, applying its prefix.
/// A missing path is an error unless `optional` is set, in which case it
/// contributes no keys.
pub fn load_env_file(spec: &EnvFileSpec, base_dir: &Path) -> Result<BTreeMap<String, String>, StepError> {
    let path = base_dir.join(&spec.path);
    if !path.exists() {
        return if spec.optional {
            Ok(BTreeMap::new())
        } else {
            Err(StepError::InvalidInput {
                field: "path".to_string(),
                msg: format!("env file `{}` not found", path.display()),
            })
        };
    }

    let raw = match spec.file_type.as_str() {
        "dotenv" => parse_dotenv(&std::fs::read_to_string(&path)?),
        "json" => parse_json(&std::fs::read_to_string(&path)?)?,
        "dir" => parse_dir(&path)?,
        other => {
            return Err(StepError::InvalidInput {
                field: "type".to_string(),
                msg: format!("unknown env file type `{other}` (expected dotenv|json|dir)"),
            })
        }
    };
    Ok(apply_prefix(raw, &spec.prefix))
}

/// Load and merge a declared list of env files in order; later files
/// override earlier ones key-for-key.
pub fn load_env_files(specs: &[EnvFileSpec], base_dir: &Path) -> Result<BTreeMap<String, String>, StepError> {
    let mut merged = BTreeMap::new();
    for spec in specs {
        merged.extend(load_env_file(spec, base_dir)?);
    }
    Ok(merged)
}

fn apply_prefix(raw: BTreeMap<String, String>, prefix: &str) -> BTreeMap<String, String> {
    if prefix.is_empty() {
        return raw;
    }
    raw.into_iter().map(|(k, v)| (format!("{prefix}{k}"), v)).collect()
}

fn parse_dotenv(content: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = trimmed.find('=') else { continue };
        let key = trimmed[..eq_pos].trim().to_string();
        if key.is_empty() {
            continue;
        }
        let mut value = trimmed[eq_pos + 1..].trim().to_string();
        let quoted = value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"')) || (value.starts_with('\'') && value.ends_with('\'')));
        if quoted {
            value = value[1..value.len() - 1].to_string();
        }
        map.insert(key, value);
    }
    map
}

fn parse_json(content: &str) -> Result<BTreeMap<String, String>, StepError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| StepError::InvalidInput { field: "path".to_string(), msg: format!("invalid env json: {e}") })?;
    let obj = value.as_object().ok_or_else(|| StepError::InvalidInput {
        field: "path".to_string(),
        msg: "env json file must be a flat object".to_string(),
    })?;
    Ok(obj.iter().map(|(k, v)| (k.clone(), json_to_string_lossy(v))).collect())
}

fn parse_dir(dir: &Path) -> Result<BTreeMap<String, String>, StepError> {
    let mut map = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if name.starts_with('.') {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        map.insert(name.to_string(), content.trim_end_matches('\n').to_string());
    }
    Ok(map)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
