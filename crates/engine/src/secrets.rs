// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The secrets module loader (§4.1 "Secrets module contract", §6
//! `AETHERFLOW_SECRETS_MODULE`/`AETHERFLOW_SECRETS_PATH`).
//!
//! The original resolves `secrets_module` as a Python import path and calls
//! its `decode`/`expand_env` at runtime. There is no safe Rust counterpart
//! to an arbitrary dynamic import, so — mirroring the plugin loader's
//! "declare intent via a name, resolve the actual code from a compiled-in
//! list" shape (§9 "registry polymorphism") — `secrets_module` names one of
//! a small set of providers compiled into this binary rather than a path to
//! load. `file` is the only reference provider: `secrets_path` names a flat
//! JSON object mapping a secret reference to its plaintext value, and
//! `decode(value)` looks `value` up in that map.

use std::collections::HashMap;
use std::path::Path;

use aetherflow_resolver::SecretsProvider;

use crate::error::ExecuteError;

/// Looks a rendered value up as a key in a flat JSON object loaded once
/// from `secrets_path`. A value with no entry in the map fails decode,
/// matching the opaque `decode(str) -> str` contract (§4.1) rather than
/// silently passing the reference through.
#[derive(Debug, Default)]
pub struct FileSecretsProvider {
    entries: HashMap<String, String>,
}

impl FileSecretsProvider {
    pub fn load(path: &Path) -> Result<Self, ExecuteError> {
        let raw = std::fs::read_to_string(path)?;
        let entries: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|e| ExecuteError::Other(format!("invalid secrets file {}: {e}", path.display())))?;
        Ok(Self { entries })
    }
}

impl SecretsProvider for FileSecretsProvider {
    fn decode(&self, value: &str) -> Result<String, String> {
        self.entries
            .get(value)
            .cloned()
            .ok_or_else(|| format!("no secret entry for `{value}`"))
    }
}

/// Resolve `Settings.secrets_module`/`secrets_path` into a live provider.
/// `None` when no secrets module is configured. An unrecognized module
/// name or a `file` module missing its `secrets_path` is a hard error —
/// this is operator misconfiguration, not the "decode target exists but
/// no secrets module configured" warning path (§4.1), which fires in
/// `materialize_resources` precisely when this function returns `None`
/// and a resource still has decode targets.
pub fn load_secrets_provider(
    secrets_module: Option<&str>,
    secrets_path: Option<&Path>,
) -> Result<Option<Box<dyn SecretsProvider>>, ExecuteError> {
    match secrets_module {
        None => Ok(None),
        Some("file") => {
            let path = secrets_path
                .ok_or_else(|| ExecuteError::Other("secrets_module=file requires AETHERFLOW_SECRETS_PATH".to_string()))?;
            Ok(Some(Box::new(FileSecretsProvider::load(path)?)))
        }
        Some(other) => Err(ExecuteError::Other(format!("unknown secrets module `{other}` (expected: file)"))),
    }
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
