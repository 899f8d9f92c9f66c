// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only bundle status (§4.4 "bundle status"): reports what the next
//! `sync_bundle` would do without fetching or mutating anything beyond a
//! listing call.

use std::path::{Path, PathBuf};

use aetherflow_connectors::registry::ConnectorRegistry;
use aetherflow_core::{BundleManifestSpec, EnvSnapshot, Settings};
use aetherflow_resolver::SecretsProvider;

use crate::error::BundleError;
use crate::fingerprint::fingerprint;
use crate::snapshot;
use crate::sync::build_source;

#[derive(Debug, Clone)]
pub struct BundleStatus {
    pub bundle_id: String,
    pub active_dir: PathBuf,
    pub active_present: bool,
    pub recorded_fingerprint: Option<String>,
    pub current_fingerprint: Option<String>,
    pub would_change: Option<bool>,
    pub last_error: Option<String>,
}

/// Compare the source's current listing against the last recorded
/// fingerprint. When `strict_fingerprint` is set the comparison is only
/// advisory (`would_change: None`): a true content-hash comparison would
/// require fetching every unhashed file's bytes, which a status check must
/// not do (§4.4 "strict_fingerprint" trades listing speed for staging-time
/// hashing only).
pub fn bundle_status(
    manifest: &BundleManifestSpec,
    local_root: &Path,
    env: &EnvSnapshot,
    settings: &Settings,
    registry: &ConnectorRegistry,
    secrets: Option<&dyn SecretsProvider>,
) -> Result<BundleStatus, BundleError> {
    let active_dir = local_root.join("active");
    let fingerprints_dir = local_root.join("fingerprints");
    let recorded = snapshot::load_latest(&fingerprints_dir).map(|(fp, _)| fp);
    let last_error = std::fs::read_to_string(local_root.join("last_error.json")).ok();

    let source = build_source(manifest, env, settings, registry, secrets)?;
    let metas = source.list_files()?;
    let strict = manifest.bundle.source.strict_fingerprint.unwrap_or(false);

    let (current, would_change) = if strict {
        (None, None)
    } else {
        let fp = fingerprint(&metas);
        let changed = recorded.as_ref().map(|r| r != &fp).unwrap_or(true) || !active_dir.is_dir();
        (Some(fp), Some(changed))
    };

    Ok(BundleStatus {
        bundle_id: manifest.bundle.id.clone(),
        active_dir: active_dir.clone(),
        active_present: active_dir.is_dir(),
        recorded_fingerprint: recorded,
        current_fingerprint: current,
        would_change,
        last_error,
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
