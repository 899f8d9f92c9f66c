// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fingerprint snapshot persistence (§4.4 "Directory layout — fingerprints/").

use std::path::Path;

use aetherflow_core::RemoteFileMeta;
use serde::{Deserialize, Serialize};

use crate::error::BundleError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub path: String,
    pub sha256: Option<String>,
    pub size: Option<u64>,
    pub mtime: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub bundle_id: String,
    pub fingerprint: String,
    pub created_at: String,
    pub source: SnapshotSource,
    pub files: Vec<SnapshotFile>,
    #[serde(default)]
    pub strict_fingerprint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub base_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestPointer {
    pub fingerprint: String,
    pub snapshot: String,
    pub updated_at: String,
}

pub fn snapshot_path(fp_dir: &Path, fingerprint: &str) -> std::path::PathBuf {
    fp_dir.join(format!("{fingerprint}.json"))
}

/// Returns `(fingerprint, pointer)` — `None` if no sync has ever succeeded.
pub fn load_latest(fp_dir: &Path) -> Option<(String, LatestPointer)> {
    let path = fp_dir.join("latest.json");
    let raw = std::fs::read_to_string(path).ok()?;
    let pointer: LatestPointer = serde_json::from_str(&raw).ok()?;
    let fp = pointer.fingerprint.clone();
    Some((fp, pointer))
}

pub fn load_snapshot(fp_dir: &Path, fingerprint: &str) -> Option<Snapshot> {
    let path = snapshot_path(fp_dir, fingerprint);
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Map `rel_path -> (sha256, size, mtime)` from a previous snapshot, used by
/// the sync algorithm's incremental-reuse path (§4.4 step 6 "consult the
/// previous snapshot").
pub fn file_map(snapshot: &Snapshot) -> std::collections::HashMap<String, &SnapshotFile> {
    snapshot.files.iter().map(|f| (f.path.clone(), f)).collect()
}

pub fn write_latest_and_snapshot(
    fp_dir: &Path,
    fingerprint: &str,
    source_type: &str,
    base_path: &str,
    bundle_id: &str,
    metas: &[RemoteFileMeta],
    strict_fingerprint: bool,
    now_iso: &str,
) -> Result<(), BundleError> {
    let mut files: Vec<SnapshotFile> = metas
        .iter()
        .map(|m| SnapshotFile {
            path: m.rel_path.clone().unwrap_or_default(),
            sha256: m.sha256.clone(),
            size: m.size,
            mtime: m.mtime_ms,
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let snapshot = Snapshot {
        version: 1,
        bundle_id: bundle_id.to_string(),
        fingerprint: fingerprint.to_string(),
        created_at: now_iso.to_string(),
        source: SnapshotSource { source_type: source_type.to_string(), base_path: base_path.to_string() },
        files,
        strict_fingerprint,
    };
    let snap_path = snapshot_path(fp_dir, fingerprint);
    std::fs::write(&snap_path, serde_json::to_vec(&snapshot)?)?;

    let pointer = LatestPointer {
        fingerprint: fingerprint.to_string(),
        snapshot: snap_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        updated_at: now_iso.to_string(),
    };
    std::fs::write(fp_dir.join("latest.json"), serde_json::to_vec(&pointer)?)?;
    Ok(())
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
