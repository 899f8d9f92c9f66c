// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `transfer.upload` / `transfer.download` (§C): sftp/smb connector-backed
//! file transfer with thread-pool fan-out (§5 "parallelism appears in
//! specific step implementations") and fail-fast semantics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use aetherflow_connectors::{ConnectorError, ConnectorHandle, Connectors};
use aetherflow_validate::Issue;

use crate::error::StepError;
use crate::registry::{Step, StepOutcome, StepRegistry, StepRunContext};

fn str_field(v: &Map<String, Value>, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn u32_field(v: &Map<String, Value>, key: &str, default: u32) -> u32 {
    v.get(key).and_then(Value::as_u64).map(|n| n as u32).unwrap_or(default)
}

fn bool_field(v: &Map<String, Value>, key: &str, default: bool) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(default)
}

struct FilePair {
    local: String,
    remote: String,
}

fn file_pairs(inputs: &Map<String, Value>) -> Result<Vec<FilePair>, StepError> {
    let items = match inputs.get("files") {
        Some(Value::Array(items)) => items,
        _ => return Err(StepError::MissingInput("files".into())),
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object().ok_or_else(|| StepError::InvalidInput { field: "files".into(), msg: "each entry must be an object".into() })?;
        let local = obj.get("local").and_then(Value::as_str).ok_or_else(|| StepError::MissingInput("files[].local".into()))?;
        let remote = obj.get("remote").and_then(Value::as_str).ok_or_else(|| StepError::MissingInput("files[].remote".into()))?;
        out.push(FilePair { local: local.to_string(), remote: remote.to_string() });
    }
    Ok(out)
}

/// Resolve the named resource's transfer connector, trying `sftp` then
/// `smb` since either kind satisfies this step's contract.
fn resolve_transfer_handle(connectors: &Connectors, resource: &str) -> Result<ConnectorHandle, ConnectorError> {
    match connectors.sftp(resource) {
        Ok(h) => Ok(h),
        Err(ConnectorError::KindMismatch { .. }) => connectors.smb(resource),
        Err(e) => Err(e),
    }
}

enum Direction {
    Upload,
    Download,
}

fn run_transfer(inputs: &Map<String, Value>, ctx: &StepRunContext, direction: Direction) -> Result<StepOutcome, StepError> {
    let resource = str_field(inputs, "resource").ok_or_else(|| StepError::MissingInput("resource".into()))?;
    let pairs = file_pairs(inputs)?;
    let workers = u32_field(inputs, "workers", 4).max(1) as usize;
    let fail_fast = bool_field(inputs, "fail_fast", true);

    let handle = resolve_transfer_handle(ctx.connectors, &resource)?;
    let failed = Arc::new(AtomicBool::new(false));
    let mut transferred: Vec<String> = Vec::with_capacity(pairs.len());
    let mut errors: Vec<String> = Vec::new();

    for chunk in pairs.chunks(workers.max(1)) {
        let mut results: Vec<Result<String, StepError>> = Vec::with_capacity(chunk.len());
        std::thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|pair| {
                    let failed = Arc::clone(&failed);
                    scope.spawn(move || -> Result<String, StepError> {
                        if fail_fast && failed.load(Ordering::Relaxed) {
                            return Err(StepError::Other("skipped after sibling failure".to_string()));
                        }
                        let local_path = ctx.resolve(&pair.local)?;
                        let outcome = match &direction {
                            Direction::Upload => match &handle {
                                ConnectorHandle::Sftp(c) => c.put(&local_path, &pair.remote),
                                ConnectorHandle::Smb(c) => c.put(&local_path, &pair.remote),
                                _ => unreachable!("resolve_transfer_handle only returns sftp/smb"),
                            },
                            Direction::Download => {
                                if let Some(parent) = local_path.parent() {
                                    std::fs::create_dir_all(parent)?;
                                }
                                match &handle {
                                    ConnectorHandle::Sftp(c) => c.fetch(&pair.remote, &local_path),
                                    ConnectorHandle::Smb(c) => c.fetch(&pair.remote, &local_path),
                                    _ => unreachable!("resolve_transfer_handle only returns sftp/smb"),
                                }
                            }
                        };
                        match outcome {
                            Ok(()) => Ok(pair.remote.clone()),
                            Err(e) => {
                                failed.store(true, Ordering::Relaxed);
                                Err(StepError::Connector(e))
                            }
                        }
                    })
                })
                .collect();
            for h in handles {
                results.push(h.join().unwrap_or_else(|_| Err(StepError::Other("transfer worker panicked".to_string()))));
            }
        });

        for r in results {
            match r {
                Ok(remote) => transferred.push(remote),
                Err(e) => {
                    errors.push(e.to_string());
                    if fail_fast {
                        return Err(StepError::Other(format!("transfer failed: {}", errors.join("; "))));
                    }
                }
            }
        }
    }

    if !errors.is_empty() {
        return Err(StepError::Other(format!("transfer failed for {} file(s): {}", errors.len(), errors.join("; "))));
    }

    let mut output = Map::new();
    output.insert("transferred".to_string(), Value::from(transferred.len() as u64));
    output.insert("files".to_string(), Value::Array(transferred.into_iter().map(Value::String).collect()));
    Ok(StepOutcome::Success(output))
}

pub struct UploadStep;

impl Step for UploadStep {
    fn validate(&self, inputs: &Map<String, Value>, loc: &str) -> Vec<Issue> {
        validate_common(inputs, loc, "transfer.upload")
    }

    fn run(&self, inputs: &Map<String, Value>, ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        run_transfer(inputs, ctx, Direction::Upload)
    }
}

pub struct DownloadStep;

impl Step for DownloadStep {
    fn validate(&self, inputs: &Map<String, Value>, loc: &str) -> Vec<Issue> {
        validate_common(inputs, loc, "transfer.download")
    }

    fn run(&self, inputs: &Map<String, Value>, ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        run_transfer(inputs, ctx, Direction::Download)
    }
}

fn validate_common(inputs: &Map<String, Value>, loc: &str, step_type: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    if inputs.get("resource").and_then(Value::as_str).is_none() {
        issues.push(Issue::new("missing_input", format!("{loc}.inputs.resource"), format!("{step_type} requires `resource`")));
    }
    match inputs.get("files") {
        Some(Value::Array(_)) => {}
        _ => issues.push(Issue::new("missing_input", format!("{loc}.inputs.files"), format!("{step_type} requires a `files` list"))),
    }
    issues
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
