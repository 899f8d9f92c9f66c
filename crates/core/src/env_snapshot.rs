// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sealed env snapshot a run is built from.
//!
//! Settings and template rendering never read `std::env` directly past the
//! single point where the initial snapshot is captured (§9 "No global
//! mutable config"). An [`EnvSnapshot`] is an immutable, cheaply-cloned map
//! threaded explicitly through resolver/validator/executor calls.

use std::collections::BTreeMap;
use std::sync::Arc;

/// An immutable environment snapshot.
///
/// Wraps an `Arc<BTreeMap<..>>` so cloning a snapshot (e.g. to hand to a
/// step's runtime context) is O(1); the map itself is never mutated after
/// [`EnvSnapshot::seal`].
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot(Arc<BTreeMap<String, String>>);

impl EnvSnapshot {
    /// Capture the current process environment. This is the one place in
    /// the crate permitted to read ambient `std::env` state.
    pub fn from_process_env() -> Self {
        Self(Arc::new(std::env::vars().collect()))
    }

    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        Self(Arc::new(map))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Produce a new snapshot with `overrides` layered on top (overrides win).
    pub fn with_overrides(&self, overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut map = (*self.0).clone();
        for (k, v) in overrides {
            map.insert(k, v);
        }
        Self(Arc::new(map))
    }

    /// Produce a new snapshot with the given keys removed.
    pub fn without_keys(&self, keys: &[&str]) -> Self {
        let mut map = (*self.0).clone();
        for k in keys {
            map.remove(*k);
        }
        Self(Arc::new(map))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[path = "env_snapshot_tests.rs"]
mod tests;
