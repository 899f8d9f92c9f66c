// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy (§7).
//!
//! Crate-specific errors (resolver, validate, connectors, bundles, engine)
//! live in their own crates as `thiserror` enums and convert into
//! [`AetherError`] at the CLI boundary; this module defines the closed set
//! of top-level kinds and the schema/semantic error used by `core::spec`
//! deserialization helpers.

use thiserror::Error;

/// Schema or semantic invariant violated in a flow/manifest/profile document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{loc}: {msg}")]
pub struct SpecError {
    pub loc: String,
    pub msg: String,
}

impl SpecError {
    pub fn new(loc: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            msg: msg.into(),
        }
    }
}

/// The closed top-level error taxonomy (spec.md §7).
#[derive(Debug, Error)]
pub enum AetherError {
    #[error("spec error at {0}")]
    Spec(#[from] SpecError),

    #[error("{0}")]
    ResolverSyntax(String),

    #[error("missing key: {0}")]
    ResolverMissingKey(String),

    #[error("connector error: {0}")]
    Connector(String),

    #[error("report too large: {rows} rows exceeds threshold {threshold}")]
    ReportTooLarge { rows: u64, threshold: u64 },

    #[error("optional parquet support is not available")]
    ParquetSupportMissing,

    #[error("timed out after {0}s")]
    Timeout(f64),

    #[error("{0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
