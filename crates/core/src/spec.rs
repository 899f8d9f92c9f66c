// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The flow/manifest/profile document model (§3).
//!
//! Strict regions (`ResourceSpec`, the bundle manifest subtree, profile
//! entries) use `deny_unknown_fields` so an unknown key is a load-time
//! schema error rather than a silently-ignored typo, mirroring the
//! reference implementation's pydantic `extra="forbid"` models.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::{CleanupPolicy, LockScope};

// ---------------------------------------------------------------------
// Workspace / State / Locks
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSpec {
    #[serde(default = "default_workspace_root")]
    pub root: String,
    #[serde(default)]
    pub cleanup_policy: CleanupPolicy,
    #[serde(default = "default_layout")]
    pub layout: HashMap<String, String>,
}

fn default_workspace_root() -> String {
    "/tmp/work".to_string()
}

fn default_layout() -> HashMap<String, String> {
    [
        ("artifacts".to_string(), "artifacts".to_string()),
        ("scratch".to_string(), "scratch".to_string()),
        ("manifests".to_string(), "manifests".to_string()),
    ]
    .into_iter()
    .collect()
}

impl Default for WorkspaceSpec {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            cleanup_policy: CleanupPolicy::OnSuccess,
            layout: default_layout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSpec {
    #[serde(default = "default_state_backend")]
    pub backend: String,
    #[serde(default = "default_state_path")]
    pub path: String,
}

fn default_state_backend() -> String {
    "sqlite".to_string()
}
fn default_state_path() -> String {
    "/tmp/state/aetherflow.sqlite".to_string()
}

impl Default for StateSpec {
    fn default() -> Self {
        Self {
            backend: default_state_backend(),
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksSpec {
    #[serde(default)]
    pub scope: LockScope,
    #[serde(default = "default_lock_ttl")]
    pub ttl_seconds: u64,
}

fn default_lock_ttl() -> u64 {
    3600
}

impl Default for LocksSpec {
    fn default() -> Self {
        Self {
            scope: LockScope::Job,
            ttl_seconds: default_lock_ttl(),
        }
    }
}

// ---------------------------------------------------------------------
// Flow / Jobs / Steps
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowMetaSpec {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workspace: WorkspaceSpec,
    #[serde(default)]
    pub state: StateSpec,
    #[serde(default)]
    pub locks: LocksSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecodeSpec(pub Value);

impl DecodeSpec {
    pub fn is_empty(&self) -> bool {
        matches!(&self.0, Value::Null) || matches!(&self.0, Value::Object(m) if m.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub kind: String,
    pub driver: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub config: serde_json::Map<String, Value>,
    #[serde(default)]
    pub options: serde_json::Map<String, Value>,
    #[serde(default)]
    pub decode: DecodeSpec,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnNoData {
    SkipJob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub inputs: serde_json::Map<String, Value>,
    #[serde(default)]
    pub on_no_data: Option<OnNoData>,
    #[serde(default)]
    pub outputs: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub when: Option<String>,
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    #[serde(default = "default_version")]
    pub version: u32,
    pub flow: FlowMetaSpec,
    #[serde(default)]
    pub resources: IndexMap<String, ResourceSpec>,
    pub jobs: Vec<JobSpec>,
}

fn default_version() -> u32 {
    1
}

// ---------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProfileSpec {
    #[serde(default)]
    pub config: serde_json::Map<String, Value>,
    #[serde(default)]
    pub options: serde_json::Map<String, Value>,
    #[serde(default)]
    pub decode: DecodeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesFileSpec(pub IndexMap<String, ProfileSpec>);

// ---------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BundleArchiveDriver {
    Pyzipper,
    Zipfile,
    Os,
    External,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BundleSourceType {
    Filesystem,
    Sftp,
    Smb,
    Db,
    Rest,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BundleFetchPolicy {
    CacheCheck,
    Always,
}

impl Default for BundleFetchPolicy {
    fn default() -> Self {
        BundleFetchPolicy::CacheCheck
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BundleLayoutSpec {
    #[serde(default)]
    pub flows_dir: Option<String>,
    #[serde(default)]
    pub profiles_file: Option<String>,
    #[serde(default)]
    pub plugins_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleSourceSpec {
    #[serde(default = "default_source_type")]
    #[serde(rename = "type")]
    pub source_type: BundleSourceType,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub bundle: Option<String>,
    #[serde(default)]
    pub list_sql: Option<String>,
    #[serde(default)]
    pub fetch_sql: Option<String>,
    #[serde(default)]
    pub list_path: Option<String>,
    #[serde(default)]
    pub fetch_path: Option<String>,
    #[serde(default)]
    pub prefix_param: Option<String>,
    #[serde(default)]
    pub strict_fingerprint: Option<bool>,
}

fn default_source_type() -> BundleSourceType {
    BundleSourceType::Filesystem
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleSpec {
    pub id: String,
    pub source: BundleSourceSpec,
    #[serde(default)]
    pub layout: BundleLayoutSpec,
    pub entry_flow: String,
    #[serde(default)]
    pub fetch_policy: BundleFetchPolicy,
}

fn default_zip_drivers() -> std::collections::HashSet<BundleArchiveDriver> {
    [BundleArchiveDriver::Pyzipper, BundleArchiveDriver::Zipfile]
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleManifestSpec {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub mode: Option<String>,
    pub bundle: BundleSpec,
    #[serde(default)]
    pub resources: IndexMap<String, ResourceSpec>,
    #[serde(default)]
    pub paths: serde_json::Map<String, Value>,
    #[serde(default = "default_zip_drivers")]
    pub zip_drivers: std::collections::HashSet<BundleArchiveDriver>,
    #[serde(default)]
    pub env_files: Vec<String>,
}

// ---------------------------------------------------------------------
// Env files
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvFileSpec {
    #[serde(rename = "type")]
    pub file_type: String,
    pub path: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub prefix: String,
}

// ---------------------------------------------------------------------
// Connectors (data model only; behavior lives in aetherflow-connectors)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteFileMeta {
    pub rel_path: Option<String>,
    pub path: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub is_dir: bool,
    pub size: Option<u64>,
    /// Milliseconds since epoch (normalized; §9 Open Question on mtime precision).
    pub mtime_ms: Option<i64>,
    pub sha256: Option<String>,
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
