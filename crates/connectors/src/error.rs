// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("unknown connector: {kind}:{driver}. loaded: {loaded:?}")]
    Unregistered { kind: String, driver: String, loaded: Vec<String> },

    #[error("unknown resource: {name}. known: {known:?}")]
    UnknownResource { name: String, known: Vec<String> },

    #[error("resource {name} is kind={actual}, requested kind={requested}")]
    KindMismatch { name: String, actual: String, requested: String },

    #[error("connector {kind}:{driver} failed: {msg}")]
    Driver { kind: String, driver: String, msg: String },

    #[error("connector {kind}:{driver} timed out after {timeout_secs}s")]
    Timeout { kind: String, driver: String, timeout_secs: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
