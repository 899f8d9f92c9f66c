// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-local error taxonomy (§7), converging into [`aetherflow_core::AetherError`]
//! at the CLI boundary the way `aetherflow_bundles::BundleError` does for the
//! sync crate.

use thiserror::Error;

/// Errors a built-in step or the sandbox path resolver can raise.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("missing required input `{0}`")]
    MissingInput(String),

    #[error("invalid input `{field}`: {msg}")]
    InvalidInput { field: String, msg: String },

    #[error("path `{0}` escapes the sandbox")]
    SandboxViolation(String),

    #[error("symlink encountered in path chain at `{0}`")]
    SymlinkInPath(String),

    #[error("connector error: {0}")]
    Connector(#[from] aetherflow_connectors::ConnectorError),

    #[error("report too large: {rows} rows exceeds threshold {threshold}")]
    ReportTooLarge { rows: u64, threshold: u64 },

    #[error("timed out after {0}s")]
    Timeout(f64),

    #[error("lock `{0}` could not be acquired")]
    LockUnavailable(String),

    #[error("success criteria not met: {0}")]
    SuccessCriteria(String),

    #[error("process exited with status {0}")]
    NonZeroExit(i32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Resolver(#[from] aetherflow_resolver::ResolverError),

    #[error("{0}")]
    Other(String),
}

/// Errors the state store (job_runs/step_runs/locks) can raise.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("state JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown state backend `{0}` (expected sqlite|file)")]
    UnknownBackend(String),
}

/// Top-level executor error. Step failures are wrapped rather than
/// re-typed so the job/step ids they occurred under stay attached.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("job `{job_id}` step `{step_id}` failed: {source}")]
    Step {
        job_id: String,
        step_id: String,
        #[source]
        source: StepError,
    },

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("bundle sync error: {0}")]
    Bundle(#[from] aetherflow_bundles::BundleError),

    #[error(transparent)]
    Resolver(#[from] aetherflow_resolver::ResolverError),

    #[error("unregistered step type `{0}`")]
    UnknownStepType(String),

    #[error("validation failed with {0} error(s)")]
    ValidationFailed(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<aetherflow_resolver::ResolverError> for aetherflow_core::AetherError {
    fn from(e: aetherflow_resolver::ResolverError) -> Self {
        match &e {
            aetherflow_resolver::ResolverError::Syntax => aetherflow_core::AetherError::ResolverSyntax(e.to_string()),
            aetherflow_resolver::ResolverError::MissingKey { path } => {
                aetherflow_core::AetherError::ResolverMissingKey(path.clone())
            }
            aetherflow_resolver::ResolverError::UnknownRoot { .. } => {
                aetherflow_core::AetherError::ResolverSyntax(e.to_string())
            }
        }
    }
}

impl From<ExecuteError> for aetherflow_core::AetherError {
    fn from(e: ExecuteError) -> Self {
        match e {
            ExecuteError::Resolver(r) => r.into(),
            ExecuteError::Io(e) => aetherflow_core::AetherError::Io(e),
            ExecuteError::Step { source: StepError::ReportTooLarge { rows, threshold }, .. } => {
                aetherflow_core::AetherError::ReportTooLarge { rows, threshold }
            }
            ExecuteError::Step { source: StepError::Timeout(secs), .. } => aetherflow_core::AetherError::Timeout(secs),
            other => aetherflow_core::AetherError::Runtime(other.to_string()),
        }
    }
}
