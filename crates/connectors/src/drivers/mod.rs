// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference drivers, one per kind, registered by [`crate::registry::builtin_registry`].

pub mod archive;
pub mod db;
pub mod mail;
pub mod rest;
pub mod sftp;
pub mod smb;

pub(crate) fn opt_str(config: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    config.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
