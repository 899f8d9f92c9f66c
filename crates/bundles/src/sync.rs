// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sync_bundle` (§4.4): fetch a bundle's declared source into a
//! content-addressed local cache, reusing unchanged blobs and atomically
//! swapping the bundle's `active/` directory only when the fingerprint
//! actually moved.

use std::path::{Path, PathBuf};

use aetherflow_connectors::registry::ConnectorRegistry;
use aetherflow_connectors::Connectors;
use aetherflow_core::{
    new_run_id, BundleManifestSpec, BundleSourceType, EnvSnapshot, RemoteFileMeta, Settings,
};
use aetherflow_resolver::SecretsProvider;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::BundleError;
use crate::fingerprint::{fingerprint, mtime_sig, sha256_hex};
use crate::resources::materialize_resources;
use crate::snapshot::{self, Snapshot};
use crate::source::{BundleSource, DbSource, FilesystemSource, RestSource, SftpSource, SmbSource};

#[derive(Debug, Clone)]
pub struct BundleSyncResult {
    pub local_root: PathBuf,
    pub active_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub fingerprints_dir: PathBuf,
    pub fingerprint: String,
    pub changed: bool,
    pub fetched_files: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LastError {
    message: String,
    occurred_at: String,
}

fn layout_dirs(local_root: &Path) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
    (
        local_root.join("active"),
        local_root.join("cache").join("blobs"),
        local_root.join("fingerprints"),
        local_root.join("staged"),
    )
}

/// Build the concrete [`BundleSource`] for a manifest's `bundle.source`
/// block, resolving its `resource` reference (if any) through the
/// manifest's bootstrap-only resources (§4.4 "Source types").
pub(crate) fn build_source(
    manifest: &BundleManifestSpec,
    env: &EnvSnapshot,
    settings: &Settings,
    registry: &ConnectorRegistry,
    secrets: Option<&dyn SecretsProvider>,
) -> Result<Box<dyn BundleSource>, BundleError> {
    let source = &manifest.bundle.source;
    let base_path = source.base_path.clone().unwrap_or_default();

    if matches!(source.source_type, BundleSourceType::Filesystem) {
        return Ok(Box::new(FilesystemSource::new(base_path)));
    }

    let resources = materialize_resources(&manifest.resources, env, secrets)?;
    let resource_name = source
        .resource
        .as_deref()
        .ok_or_else(|| BundleError::Manifest("non-filesystem bundle source requires `resource`".to_string()))?;
    let connectors = Connectors::new(registry.clone(), &resources, settings);

    match source.source_type {
        BundleSourceType::Sftp => {
            let handle = connectors.get("sftp", resource_name, None)?;
            let conn = handle.as_sftp().ok_or_else(|| BundleError::Manifest(format!("{resource_name} is not an sftp connector")))?;
            Ok(Box::new(SftpSource::new(conn.clone(), base_path)))
        }
        BundleSourceType::Smb => {
            let handle = connectors.get("smb", resource_name, None)?;
            let conn = handle.as_smb().ok_or_else(|| BundleError::Manifest(format!("{resource_name} is not an smb connector")))?;
            Ok(Box::new(SmbSource::new(conn.clone(), base_path)))
        }
        BundleSourceType::Db => {
            let handle = connectors.get("db", resource_name, None)?;
            let conn = handle.as_db().ok_or_else(|| BundleError::Manifest(format!("{resource_name} is not a db connector")))?;
            let bundle = source.bundle.clone().unwrap_or_else(|| manifest.bundle.id.clone());
            Ok(Box::new(DbSource::new(conn.clone(), bundle, source.list_sql.clone(), source.fetch_sql.clone())))
        }
        BundleSourceType::Rest => {
            let handle = connectors.get("rest", resource_name, None)?;
            let conn = handle.as_rest().ok_or_else(|| BundleError::Manifest(format!("{resource_name} is not a rest connector")))?;
            let bundle = source.bundle.clone().unwrap_or_else(|| manifest.bundle.id.clone());
            Ok(Box::new(RestSource::new(
                conn.clone(),
                bundle,
                source.list_path.clone(),
                source.fetch_path.clone(),
                source.prefix_param.clone(),
            )))
        }
        BundleSourceType::Filesystem => unreachable!("handled above"),
    }
}

/// Enrich file metadata with a content hash when the manifest asks for a
/// content-addressed (not size/mtime-based) fingerprint (§4.4
/// "strict_fingerprint"). Every hashed byte also lands in the blob cache so
/// the staging pass below never re-fetches it.
fn enrich_strict(source: &dyn BundleSource, metas: &mut [RemoteFileMeta], cache_dir: &Path) -> Result<(), BundleError> {
    for meta in metas.iter_mut() {
        if meta.sha256.is_some() {
            continue;
        }
        let Some(rel) = meta.rel_path.clone() else { continue };
        let bytes = source.read_bytes(&rel)?;
        let sha = sha256_hex(&bytes);
        cache_blob(cache_dir, &sha, &bytes)?;
        meta.sha256 = Some(sha);
    }
    Ok(())
}

fn cache_blob(cache_dir: &Path, sha: &str, bytes: &[u8]) -> Result<(), BundleError> {
    std::fs::create_dir_all(cache_dir)?;
    let path = cache_dir.join(sha);
    if !path.exists() {
        std::fs::write(path, bytes)?;
    }
    Ok(())
}

fn reuse_signature_matches(meta: &RemoteFileMeta, prev: &snapshot::SnapshotFile) -> bool {
    meta.size == prev.size && mtime_sig(meta.mtime_ms) == prev.mtime.unwrap_or(0)
}

/// Resolve one file's bytes into the blob cache, preferring reuse over a
/// fresh fetch (§4.4 step 6): a declared sha256 that's already cached wins,
/// then a previous snapshot's matching `(size, mtime)` entry, then fetch.
fn materialize_blob(
    source: &dyn BundleSource,
    meta: &RemoteFileMeta,
    prev_files: &std::collections::HashMap<String, &snapshot::SnapshotFile>,
    cache_dir: &Path,
) -> Result<(String, bool), BundleError> {
    let rel = meta.rel_path.clone().unwrap_or_default();

    if let Some(sha) = &meta.sha256 {
        if cache_dir.join(sha).exists() {
            return Ok((sha.clone(), false));
        }
        let bytes = source.read_bytes(&rel)?;
        let actual = sha256_hex(&bytes);
        if &actual != sha {
            return Err(BundleError::ChecksumMismatch { rel_path: rel, expected: sha.clone(), actual });
        }
        cache_blob(cache_dir, sha, &bytes)?;
        return Ok((sha.clone(), true));
    }

    if let Some(prev) = prev_files.get(&rel) {
        if reuse_signature_matches(meta, prev) {
            if let Some(prev_sha) = &prev.sha256 {
                if cache_dir.join(prev_sha).exists() {
                    return Ok((prev_sha.clone(), false));
                }
            }
        }
    }

    let bytes = source.read_bytes(&rel)?;
    let sha = sha256_hex(&bytes);
    cache_blob(cache_dir, &sha, &bytes)?;
    Ok((sha, true))
}

fn find_entry_flow(staged: &Path, flows_dir: &str, entry_flow: &str) -> Option<PathBuf> {
    let candidates = [
        staged.join(entry_flow),
        staged.join(flows_dir).join(entry_flow),
        staged.join(flows_dir).join(format!("{entry_flow}.yaml")),
        staged.join(flows_dir).join(format!("{entry_flow}.yml")),
    ];
    candidates.into_iter().find(|p| p.is_file())
}

fn atomic_swap_active(active_dir: &Path, staged: &Path) -> Result<(), BundleError> {
    let old = active_dir.with_extension("old");
    if active_dir.exists() {
        if old.exists() {
            std::fs::remove_dir_all(&old)?;
        }
        std::fs::rename(active_dir, &old)?;
    }
    std::fs::rename(staged, active_dir)?;
    if old.exists() {
        std::fs::remove_dir_all(&old)?;
    }
    Ok(())
}

fn write_last_error(local_root: &Path, message: &str, now_iso: &str) {
    let payload = LastError { message: message.to_string(), occurred_at: now_iso.to_string() };
    if let Ok(bytes) = serde_json::to_vec(&payload) {
        let _ = std::fs::write(local_root.join("last_error.json"), bytes);
    }
}

#[allow(clippy::too_many_arguments)]
fn sync_inner(
    manifest: &BundleManifestSpec,
    local_root: &Path,
    env: &EnvSnapshot,
    settings: &Settings,
    registry: &ConnectorRegistry,
    secrets: Option<&dyn SecretsProvider>,
    now_iso: &str,
) -> Result<BundleSyncResult, BundleError> {
    let (active_dir, cache_dir, fingerprints_dir, staged_root) = layout_dirs(local_root);
    std::fs::create_dir_all(&cache_dir)?;
    std::fs::create_dir_all(&fingerprints_dir)?;
    std::fs::create_dir_all(&staged_root)?;

    let source = build_source(manifest, env, settings, registry, secrets)?;
    let mut metas = source.list_files()?;

    if manifest.bundle.source.strict_fingerprint.unwrap_or(false) {
        enrich_strict(source.as_ref(), &mut metas, &cache_dir)?;
    }

    let new_fingerprint = fingerprint(&metas);

    let cache_check = matches!(manifest.bundle.fetch_policy, aetherflow_core::BundleFetchPolicy::CacheCheck);
    let previous = snapshot::load_latest(&fingerprints_dir);
    if let Some((prev_fp, _)) = &previous {
        if cache_check && prev_fp == &new_fingerprint && active_dir.is_dir() {
            info!(bundle = %manifest.bundle.id, fingerprint = %new_fingerprint, "bundle unchanged, reusing active/");
            return Ok(BundleSyncResult {
                local_root: local_root.to_path_buf(),
                active_dir,
                cache_dir,
                fingerprints_dir,
                fingerprint: new_fingerprint,
                changed: false,
                fetched_files: Vec::new(),
            });
        }
    }

    let prev_snapshot: Option<Snapshot> = previous.as_ref().and_then(|(fp, _)| snapshot::load_snapshot(&fingerprints_dir, fp));
    let prev_map = prev_snapshot.as_ref().map(snapshot::file_map).unwrap_or_default();

    let staged = staged_root.join(new_run_id());
    std::fs::create_dir_all(&staged)?;

    let mut fetched: Vec<String> = Vec::new();
    for meta in &metas {
        let rel = meta.rel_path.clone().unwrap_or_default();
        let (sha, was_fetched) = materialize_blob(source.as_ref(), meta, &prev_map, &cache_dir)?;
        if was_fetched {
            fetched.push(rel.clone());
        }
        let dest = staged.join(&rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(cache_dir.join(&sha), &dest)?;
    }

    let flows_dir = manifest.bundle.layout.flows_dir.clone().unwrap_or_else(|| "flows".to_string());
    if find_entry_flow(&staged, &flows_dir, &manifest.bundle.entry_flow).is_none() {
        let _ = std::fs::remove_dir_all(&staged);
        return Err(BundleError::EntryFlowMissing(manifest.bundle.entry_flow.clone()));
    }

    atomic_swap_active(&active_dir, &staged)?;

    snapshot::write_latest_and_snapshot(
        &fingerprints_dir,
        &new_fingerprint,
        source_type_label(manifest.bundle.source.source_type),
        source.base_path(),
        &manifest.bundle.id,
        &metas,
        manifest.bundle.source.strict_fingerprint.unwrap_or(false),
        now_iso,
    )?;

    info!(bundle = %manifest.bundle.id, fingerprint = %new_fingerprint, fetched_files = fetched.len(), "bundle synced");

    Ok(BundleSyncResult {
        local_root: local_root.to_path_buf(),
        active_dir,
        cache_dir,
        fingerprints_dir,
        fingerprint: new_fingerprint,
        changed: true,
        fetched_files: fetched,
    })
}

fn source_type_label(t: BundleSourceType) -> &'static str {
    match t {
        BundleSourceType::Filesystem => "filesystem",
        BundleSourceType::Sftp => "sftp",
        BundleSourceType::Smb => "smb",
        BundleSourceType::Db => "db",
        BundleSourceType::Rest => "rest",
    }
}

/// Sync a bundle into `local_root`, returning the swapped-in `active/`
/// directory. On failure, a `last_error.json` post-mortem is written under
/// `local_root`; if `allow_stale` is set and a previous `active/` exists,
/// the stale directory is returned instead of propagating the error
/// (§4.4 "allow_stale").
#[allow(clippy::too_many_arguments)]
pub fn sync_bundle(
    manifest: &BundleManifestSpec,
    local_root: &Path,
    env: &EnvSnapshot,
    settings: &Settings,
    registry: &ConnectorRegistry,
    secrets: Option<&dyn SecretsProvider>,
    allow_stale: bool,
    now_iso: &str,
) -> Result<BundleSyncResult, BundleError> {
    match sync_inner(manifest, local_root, env, settings, registry, secrets, now_iso) {
        Ok(result) => Ok(result),
        Err(err) => {
            write_last_error(local_root, &err.to_string(), now_iso);
            let (active_dir, cache_dir, fingerprints_dir, _) = layout_dirs(local_root);
            if allow_stale && active_dir.is_dir() {
                warn!(bundle = %manifest.bundle.id, error = %err, "sync failed, serving stale active/");
                if let Some((fp, _)) = snapshot::load_latest(&fingerprints_dir) {
                    return Ok(BundleSyncResult {
                        local_root: local_root.to_path_buf(),
                        active_dir,
                        cache_dir,
                        fingerprints_dir,
                        fingerprint: fp,
                        changed: false,
                        fetched_files: Vec::new(),
                    });
                }
            }
            Err(err)
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
