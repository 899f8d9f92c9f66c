// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bundle synchronizer error kinds (§7 ConnectorError umbrella; bundle-sync
//! specific failures get their own variants since a fingerprint mismatch or
//! a missing `entry_flow` is neither a connector nor a resolver failure).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("invalid bundle manifest: {0}")]
    Manifest(String),

    #[error(transparent)]
    Spec(#[from] aetherflow_core::SpecError),

    #[error("unsupported bundle source type: {0}")]
    UnsupportedSource(String),

    #[error(transparent)]
    Resolver(#[from] aetherflow_resolver::ResolverError),

    #[error(transparent)]
    Connector(#[from] aetherflow_connectors::ConnectorError),

    #[error("checksum mismatch for {rel_path}: expected {expected} got {actual}")]
    ChecksumMismatch { rel_path: String, expected: String, actual: String },

    #[error("entry_flow `{0}` not found in synced bundle")]
    EntryFlowMissing(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
