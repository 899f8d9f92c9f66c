// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aetherflow-bundles: the bundle synchronizer (§4.4).
//!
//! Fetches a declared bundle source (filesystem, sftp, smb, db, rest) into
//! a content-addressed local cache, computing a fingerprint over the file
//! list so an unchanged source is a no-op and a changed one swaps `active/`
//! atomically. Grounded on the Python original's `bundles.py`; the
//! per-source-kind transports are the same connector contracts
//! `aetherflow-connectors` already exposes to the run executor.

pub mod error;
pub mod fingerprint;
pub mod resources;
pub mod snapshot;
pub mod source;
pub mod status;
pub mod sync;

pub use error::BundleError;
pub use snapshot::{LatestPointer, Snapshot, SnapshotFile, SnapshotSource};
pub use source::{BundleSource, DbSource, FilesystemSource, RestSource, SftpSource, SmbSource};
pub use status::{bundle_status, BundleStatus};
pub use sync::{sync_bundle, BundleSyncResult};

use std::path::Path;

use aetherflow_core::BundleManifestSpec;

/// Parse a bundle manifest document (§4.4 "Manifest schema"). Structural
/// validation (the strict-schema `deny_unknown_fields` pass) happens here
/// via serde; semantic checks (archive-driver allowlist, etc.) are
/// `aetherflow-validate`'s job, not this crate's.
pub fn parse_manifest(yaml: &str) -> Result<BundleManifestSpec, BundleError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn load_manifest(path: &Path) -> Result<BundleManifestSpec, BundleError> {
    let raw = std::fs::read_to_string(path)?;
    parse_manifest(&raw)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
