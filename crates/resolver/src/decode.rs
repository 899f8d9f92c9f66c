// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decode pipeline: normalizing a `DecodeSpec` into `(section, path)`
//! requests, the standalone-raw-value rule, and the secrets module
//! contract (§4.1 "Decode pipeline", "Secrets module contract").
//!
//! `collect_decode_requests` is shared by the resolver (which applies
//! `decode()` post-render) and the validator (which only checks the raw
//! pre-render standalone rule) rather than duplicated between them.

use aetherflow_core::EnvSnapshot;
use serde_json::Value;

use crate::error::ResolverError;
use crate::grammar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Config,
    Options,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Config => "config",
            Section::Options => "options",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeRequest {
    pub section: Section,
    pub path: String,
}

/// Normalize either DecodeSpec shape — a nested boolean tree under
/// `config`/`options`, or `config_paths`/`options_paths` lists — into a
/// flat set of decode requests.
pub fn collect_decode_requests(decode: &Value) -> Vec<DecodeRequest> {
    let mut out = Vec::new();
    let Value::Object(map) = decode else {
        return out;
    };

    for (key, section) in [("config_paths", Section::Config), ("options_paths", Section::Options)] {
        if let Some(Value::Array(paths)) = map.get(key) {
            for p in paths {
                if let Value::String(s) = p {
                    out.push(DecodeRequest { section, path: s.clone() });
                }
            }
        }
    }

    for (key, section) in [("config", Section::Config), ("options", Section::Options)] {
        if let Some(tree) = map.get(key) {
            collect_bool_tree(tree, section, String::new(), &mut out);
        }
    }

    out
}

fn collect_bool_tree(value: &Value, section: Section, prefix: String, out: &mut Vec<DecodeRequest>) {
    match value {
        Value::Bool(true) => out.push(DecodeRequest { section, path: prefix }),
        Value::Object(map) => {
            for (k, v) in map {
                let next = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                collect_bool_tree(v, section, next, out);
            }
        }
        _ => {}
    }
}

/// The raw, pre-render value at a decode target must either contain no
/// template syntax at all, or be exactly one standalone token — never a
/// token concatenated with literal text (§4.1, §8 property 4).
pub fn check_standalone_raw(raw: &Value) -> Result<(), ResolverError> {
    if let Value::String(s) = raw {
        if s.contains("{{") || s.contains("}}") {
            grammar::standalone_token(s)?.ok_or(ResolverError::Syntax)?;
        }
    }
    Ok(())
}

/// The secrets module contract: exactly `decode(str) -> str`, with an
/// optional `expand_env(env) -> env`. Any other public surface a loaded
/// module might expose is outside this trait's concern — the plugin
/// loader rejects it before a `SecretsProvider` is ever constructed.
pub trait SecretsProvider: Send + Sync {
    fn decode(&self, value: &str) -> Result<String, String>;

    /// Returns a new snapshot; must never claim to mutate the original.
    fn expand_env(&self, env: &EnvSnapshot) -> Option<EnvSnapshot> {
        let _ = env;
        None
    }
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
