// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CLI-boundary error type (§7 "Propagation policy", §6 "Exit codes").
//!
//! Every crate-local error taxonomy converges here. `exit_code()` maps the
//! closed set of outcomes to spec.md §6's contract: 0 success, 2 validation
//! failure, non-zero on any other runtime error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Execute(#[from] aetherflow_engine::ExecuteError),

    #[error(transparent)]
    Bundle(#[from] aetherflow_bundles::BundleError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),

    /// The validation report came back with one or more errors. Carried
    /// separately from `Execute`'s `ValidationFailed` so the CLI boundary
    /// can map it to exit code 2 without inspecting an error's text.
    #[error("validation failed")]
    ValidationFailed,
}

impl CliError {
    pub fn msg(text: impl Into<String>) -> Self {
        CliError::Message(text.into())
    }

    /// Exit code per spec.md §6: 0 success, 2 validation failure, non-zero
    /// runtime error. This function is only ever consulted on the `Err`
    /// path, so 0 never actually escapes through it.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ValidationFailed => 2,
            _ => 1,
        }
    }
}
