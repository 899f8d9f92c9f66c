// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in step catalog (§C "Built-in steps"): `external.process`,
//! `db.extract`, `fs.zip`/`fs.unzip`, `transfer.upload`/`transfer.download`,
//! `with_lock`. Each module owns one or two `Step` impls; shared success-
//! criteria and path-collection helpers live here.

pub mod archive;
pub mod db_extract;
pub mod external_process;
pub mod transfer;
pub mod with_lock;

use std::path::Path;

use serde_json::Value;

use crate::error::StepError;
use crate::registry::StepRunContext;

fn as_string_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Check a step's `success` spec against the filesystem (§C external.process
/// "success criteria via required/forbidden files or marker").
pub fn check_success(ctx: &StepRunContext, spec: &serde_json::Map<String, Value>) -> Result<(bool, Option<String>), StepError> {
    let mut require_files = as_string_list(spec.get("require_files"));
    let forbid_files = as_string_list(spec.get("forbid_files"));
    if let Some(marker) = spec.get("marker_file").and_then(Value::as_str) {
        require_files.push(marker.to_string());
    }

    for rel in &require_files {
        let path = ctx.resolve(rel)?;
        if !path.exists() {
            return Ok((false, Some(format!("missing_required_file:{rel}"))));
        }
    }
    for rel in &forbid_files {
        let path = ctx.resolve(rel)?;
        if path.exists() {
            return Ok((false, Some(format!("forbidden_file_present:{rel}"))));
        }
    }
    Ok((true, None))
}

/// Safely join `rel` under `dest_dir`, rejecting any escape (mirrors
/// `_safe_dest` — the local-side counterpart to sandbox containment for
/// downloaded files named by a remote listing).
pub fn safe_dest(dest_dir: &Path, rel: &str) -> Result<std::path::PathBuf, StepError> {
    let cand = dest_dir.join(rel.trim_start_matches(['/', '\\']));
    let dest_dir = dest_dir.canonicalize().unwrap_or_else(|_| dest_dir.to_path_buf());
    let cand_parent = cand.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| dest_dir.clone());
    std::fs::create_dir_all(&cand_parent)?;
    let resolved_parent = cand_parent.canonicalize()?;
    if !resolved_parent.starts_with(&dest_dir) {
        return Err(StepError::SandboxViolation(rel.to_string()));
    }
    Ok(cand)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
