// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolver error kinds (§7: ResolverSyntaxError, ResolverMissingKey).

use thiserror::Error;

/// The exact, externally-visible syntax error message (§4.1, §8 property 1).
/// This wording is a contract surface — do not reword.
pub const SYNTAX_ERROR_MESSAGE: &str =
    "Unsupported templating syntax. Use `{{VAR}}` or `{{VAR:DEFAULT}}`";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("{}", SYNTAX_ERROR_MESSAGE)]
    Syntax,

    #[error("missing key: {path}")]
    MissingKey { path: String },

    #[error("unknown template root '{root}' (allowed: {allowed})")]
    UnknownRoot { root: String, allowed: String },
}

impl ResolverError {
    pub fn missing_key(path: impl Into<String>) -> Self {
        Self::MissingKey { path: path.into() }
    }

    pub fn unknown_root(root: impl Into<String>, allowed: &[&str]) -> Self {
        Self::UnknownRoot {
            root: root.into(),
            allowed: allowed.join(", "),
        }
    }
}
