// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bundle sources (§4.4 "Source types"): a uniform `list`/`fetch` surface
//! over the five source kinds, each backed by the matching connector kind.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use aetherflow_connectors::{DbConnector, RestConnector, SftpConnector, SmbConnector};
use aetherflow_core::{BundleSourceType, RemoteFileMeta};

use crate::error::BundleError;

pub trait BundleSource: Send + Sync {
    fn source_type(&self) -> BundleSourceType;
    fn base_path(&self) -> &str;
    /// List every file under the source root, `rel_path` relative to it.
    fn list_files(&self) -> Result<Vec<RemoteFileMeta>, BundleError>;
    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>, BundleError>;
}

/// Compose a full remote path from a source's base path and a file's
/// relative path (§4.4 "Remote path composition"). SMB keeps the
/// `SHARE:/…` prefix the driver and validator both expect; every other
/// source type is a plain `/`-join.
pub fn join_remote_path(source_type: BundleSourceType, base_path: &str, rel: &str) -> String {
    match source_type {
        BundleSourceType::Smb => match base_path.split_once(":/") {
            Some((share, rest)) => {
                let rest = rest.trim_matches('/');
                let rel = rel.trim_start_matches('/');
                let combined = if rest.is_empty() { rel.to_string() } else { format!("{rest}/{rel}") };
                format!("{share}:/{combined}")
            }
            None => join_posix(base_path, rel),
        },
        _ => join_posix(base_path, rel),
    }
}

fn join_posix(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return rel.trim_start_matches('/').to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), rel.trim_start_matches('/'))
}

fn strip_base(full: &str, base: &str) -> String {
    full.strip_prefix(base)
        .unwrap_or(full)
        .trim_start_matches('/')
        .to_string()
}

fn scratch_file(tag: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    std::env::temp_dir().join(format!("aetherflow-bundle-{tag}-{nanos}"))
}

// ---------------------------------------------------------------------
// filesystem
// ---------------------------------------------------------------------

pub struct FilesystemSource {
    base_path: PathBuf,
}

impl FilesystemSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }
}

impl BundleSource for FilesystemSource {
    fn source_type(&self) -> BundleSourceType {
        BundleSourceType::Filesystem
    }

    fn base_path(&self) -> &str {
        self.base_path.to_str().unwrap_or_default()
    }

    fn list_files(&self) -> Result<Vec<RemoteFileMeta>, BundleError> {
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&self.base_path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&self.base_path).unwrap_or(entry.path());
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let Ok(meta) = entry.metadata() else { continue };
            let mtime_ms = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64);
            out.push(RemoteFileMeta {
                rel_path: Some(rel_str),
                path: Some(entry.path().to_string_lossy().to_string()),
                name: entry.file_name().to_str().map(str::to_string),
                is_dir: false,
                size: Some(meta.len()),
                mtime_ms,
                sha256: None,
            });
        }
        Ok(out)
    }

    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>, BundleError> {
        Ok(std::fs::read(self.base_path.join(rel_path))?)
    }
}

// ---------------------------------------------------------------------
// sftp / smb — recursive walk over a connector's single-level `list`
// ---------------------------------------------------------------------

pub struct SftpSource {
    connector: Arc<dyn SftpConnector>,
    base_path: String,
}

impl SftpSource {
    pub fn new(connector: Arc<dyn SftpConnector>, base_path: impl Into<String>) -> Self {
        Self { connector, base_path: base_path.into() }
    }

    fn walk(&self, dir: &str, out: &mut Vec<RemoteFileMeta>) -> Result<(), BundleError> {
        for entry in self.connector.list(dir)? {
            if entry.is_dir {
                if let Some(path) = entry.path.clone() {
                    self.walk(&path, out)?;
                }
            } else {
                out.push(entry);
            }
        }
        Ok(())
    }
}

impl BundleSource for SftpSource {
    fn source_type(&self) -> BundleSourceType {
        BundleSourceType::Sftp
    }

    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn list_files(&self) -> Result<Vec<RemoteFileMeta>, BundleError> {
        let mut out = Vec::new();
        self.walk(&self.base_path, &mut out)?;
        for meta in &mut out {
            if let Some(rel) = meta.rel_path.take() {
                meta.rel_path = Some(strip_base(&rel, &self.base_path));
            }
        }
        Ok(out)
    }

    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>, BundleError> {
        let remote = join_remote_path(BundleSourceType::Sftp, &self.base_path, rel_path);
        let tmp = scratch_file("sftp");
        self.connector.fetch(&remote, &tmp)?;
        let bytes = std::fs::read(&tmp)?;
        let _ = std::fs::remove_file(&tmp);
        Ok(bytes)
    }
}

pub struct SmbSource {
    connector: Arc<dyn SmbConnector>,
    base_path: String,
}

impl SmbSource {
    pub fn new(connector: Arc<dyn SmbConnector>, base_path: impl Into<String>) -> Self {
        Self { connector, base_path: base_path.into() }
    }

    fn walk(&self, dir: &str, out: &mut Vec<RemoteFileMeta>) -> Result<(), BundleError> {
        for entry in self.connector.list(dir)? {
            if entry.is_dir {
                if let Some(path) = entry.path.clone() {
                    self.walk(&path, out)?;
                }
            } else {
                out.push(entry);
            }
        }
        Ok(())
    }
}

impl BundleSource for SmbSource {
    fn source_type(&self) -> BundleSourceType {
        BundleSourceType::Smb
    }

    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn list_files(&self) -> Result<Vec<RemoteFileMeta>, BundleError> {
        let mut out = Vec::new();
        self.walk(&self.base_path, &mut out)?;
        let base_rel = self.base_path.split_once(":/").map(|(_, rest)| rest).unwrap_or(&self.base_path);
        for meta in &mut out {
            if let Some(rel) = meta.rel_path.take() {
                meta.rel_path = Some(strip_base(&rel, base_rel));
            }
        }
        Ok(out)
    }

    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>, BundleError> {
        let remote = join_remote_path(BundleSourceType::Smb, &self.base_path, rel_path);
        let tmp = scratch_file("smb");
        self.connector.fetch(&remote, &tmp)?;
        let bytes = std::fs::read(&tmp)?;
        let _ = std::fs::remove_file(&tmp);
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------
// db — `assets(bundle, path, sha256, data, updated_at, size)`
// ---------------------------------------------------------------------

pub struct DbSource {
    connector: Arc<dyn DbConnector>,
    bundle: String,
    list_sql: String,
    fetch_sql: String,
}

impl DbSource {
    pub fn new(connector: Arc<dyn DbConnector>, bundle: impl Into<String>, list_sql: Option<String>, fetch_sql: Option<String>) -> Self {
        Self {
            connector,
            bundle: bundle.into(),
            list_sql: list_sql.unwrap_or_else(|| "SELECT path, sha256, size FROM assets WHERE bundle = ?".to_string()),
            fetch_sql: fetch_sql.unwrap_or_else(|| "SELECT data FROM assets WHERE bundle = ? AND path = ?".to_string()),
        }
    }
}

impl BundleSource for DbSource {
    fn source_type(&self) -> BundleSourceType {
        BundleSourceType::Db
    }

    fn base_path(&self) -> &str {
        &self.bundle
    }

    fn list_files(&self) -> Result<Vec<RemoteFileMeta>, BundleError> {
        let rows = self.connector.query(&self.list_sql, &[serde_json::Value::String(self.bundle.clone())])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let path = row.get("path")?.as_str()?.to_string();
                let sha256 = row.get("sha256").and_then(|v| v.as_str()).map(str::to_string);
                let size = row.get("size").and_then(|v| v.as_u64());
                Some(RemoteFileMeta {
                    rel_path: Some(path.clone()),
                    path: Some(path.clone()),
                    name: path.rsplit('/').next().map(str::to_string),
                    is_dir: false,
                    size,
                    mtime_ms: None,
                    sha256,
                })
            })
            .collect())
    }

    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>, BundleError> {
        let params = [
            serde_json::Value::String(self.bundle.clone()),
            serde_json::Value::String(rel_path.to_string()),
        ];
        let rows = self.connector.query(&self.fetch_sql, &params)?;
        let row = rows.into_iter().next().ok_or_else(|| BundleError::Manifest(format!("asset not found: {rel_path}")))?;
        let data = row.get("data").and_then(|v| v.as_str()).unwrap_or_default();
        let hex_digits = data.strip_prefix("hex:").unwrap_or(data);
        hex::decode(hex_digits).map_err(|e| BundleError::Manifest(format!("bad blob encoding for {rel_path}: {e}")))
    }
}

// ---------------------------------------------------------------------
// rest — `{list_path}?bundle=&{prefix_param}=`, `{fetch_path}?bundle=&path=`
// ---------------------------------------------------------------------

pub struct RestSource {
    connector: Arc<dyn RestConnector>,
    bundle: String,
    list_path: String,
    fetch_path: String,
    prefix_param: String,
}

impl RestSource {
    pub fn new(
        connector: Arc<dyn RestConnector>,
        bundle: impl Into<String>,
        list_path: Option<String>,
        fetch_path: Option<String>,
        prefix_param: Option<String>,
    ) -> Self {
        Self {
            connector,
            bundle: bundle.into(),
            list_path: list_path.unwrap_or_else(|| "/bundles/files".to_string()),
            fetch_path: fetch_path.unwrap_or_else(|| "/bundles/fetch".to_string()),
            prefix_param: prefix_param.unwrap_or_else(|| "prefix".to_string()),
        }
    }
}

impl BundleSource for RestSource {
    fn source_type(&self) -> BundleSourceType {
        BundleSourceType::Rest
    }

    fn base_path(&self) -> &str {
        &self.bundle
    }

    fn list_files(&self) -> Result<Vec<RemoteFileMeta>, BundleError> {
        let query = [("bundle".to_string(), self.bundle.clone()), (self.prefix_param.clone(), String::new())];
        let resp = self.connector.get(&self.list_path, &query)?;
        let files = resp.body.get("files").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        Ok(files
            .into_iter()
            .filter_map(|f| {
                let path = f.get("path")?.as_str()?.to_string();
                Some(RemoteFileMeta {
                    rel_path: Some(path.clone()),
                    path: Some(path.clone()),
                    name: path.rsplit('/').next().map(str::to_string),
                    is_dir: false,
                    size: f.get("size").and_then(|v| v.as_u64()),
                    mtime_ms: f.get("mtime_ms").and_then(|v| v.as_i64()),
                    sha256: f.get("sha256").and_then(|v| v.as_str()).map(str::to_string),
                })
            })
            .collect())
    }

    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>, BundleError> {
        let query = [("bundle".to_string(), self.bundle.clone()), ("path".to_string(), rel_path.to_string())];
        let resp = self.connector.get(&self.fetch_path, &query)?;
        let encoded = resp.body.get("data").and_then(|v| v.as_str()).unwrap_or_default();
        hex::decode(encoded.strip_prefix("hex:").unwrap_or(encoded))
            .map_err(|e| BundleError::Manifest(format!("bad payload encoding for {rel_path}: {e}")))
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
