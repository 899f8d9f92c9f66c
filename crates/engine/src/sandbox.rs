// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox path containment (§4.3 "Sandbox").
//!
//! Grounded in the original's `builtins/steps.py` path-resolution helpers,
//! generalized from Python's `Path` API to `std::path` plus an explicit
//! per-segment `symlink_metadata` walk: resolving a symlink chain would
//! hide the very attack the sandbox exists to catch, so every path is
//! checked segment-by-segment without ever calling `canonicalize`.

use std::path::{Path, PathBuf};

use crate::error::StepError;

/// The roots a sandboxed path may land under, most specific first.
pub struct AllowedRoots<'a> {
    pub artifacts_dir: &'a Path,
    /// Present only outside enterprise mode (§4.3: "In enterprise mode the
    /// only allowed root is the job artifacts directory").
    pub work_root: Option<&'a Path>,
}

/// Resolve a user-supplied path against the sandbox.
///
/// Relative paths are always joined under `artifacts_dir`. Absolute paths
/// are accepted only when they fall under one of `roots`. Every existing
/// path segment from the root down to the candidate is `symlink_metadata`'d;
/// any symlink anywhere in that chain is rejected (§8 property 11).
pub fn resolve_path(user_path: &str, roots: &AllowedRoots, strict_sandbox: bool) -> Result<PathBuf, StepError> {
    if !strict_sandbox {
        return Ok(roots.artifacts_dir.join(user_path));
    }

    let candidate = Path::new(user_path);
    let resolved = if candidate.is_absolute() {
        let normalized = normalize_lexical(candidate);
        let under_artifacts = normalized.starts_with(roots.artifacts_dir);
        let under_work_root = roots.work_root.map(|w| normalized.starts_with(w)).unwrap_or(false);
        if !under_artifacts && !under_work_root {
            return Err(StepError::SandboxViolation(user_path.to_string()));
        }
        normalized
    } else {
        let joined = roots.artifacts_dir.join(candidate);
        let normalized = normalize_lexical(&joined);
        if !normalized.starts_with(roots.artifacts_dir) {
            return Err(StepError::SandboxViolation(user_path.to_string()));
        }
        normalized
    };

    reject_symlink_chain(&resolved)?;
    Ok(resolved)
}

/// Collapse `.`/`..` components purely lexically (no filesystem access),
/// the way `os.path.normpath` does. A leading root/prefix component
/// absorbs any excess `..` rather than letting it escape above the root —
/// this is what makes a `starts_with(base)` check after normalization
/// trustworthy for both relative-joined and absolute candidates.
/// `Path::starts_with` alone only compares components lexically and never
/// resolves `..`, which is what let `/artifacts/../../../etc/passwd` sail
/// past a bare `starts_with("/artifacts")` check before this existed.
fn normalize_lexical(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut stack: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match stack.last() {
                Some(Component::Normal(_)) => {
                    stack.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => stack.push(Component::ParentDir),
            },
            other => stack.push(other),
        }
    }
    stack.iter().collect()
}

/// Walk every path segment from the filesystem root down to `path`,
/// `symlink_metadata`-ing each one that exists. A symlink anywhere in the
/// chain (including the final component) is rejected — resolving it first
/// would defeat the check.
pub fn reject_symlink_chain(path: &Path) -> Result<(), StepError> {
    let mut acc = PathBuf::new();
    for component in path.components() {
        acc.push(component);
        match std::fs::symlink_metadata(&acc) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(StepError::SymlinkInPath(acc.display().to_string()));
            }
            Ok(_) | Err(_) => continue,
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
