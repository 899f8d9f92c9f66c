// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed tagged-variant statuses and policies.
//!
//! The reference implementation represents these as string literals
//! compared ad hoc at each call site; here they are closed enums parsed
//! once at the edge (serde) rather than compared as strings throughout.

use serde::{Deserialize, Serialize};

/// Status of a job within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Blocked,
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Blocked => "blocked",
            JobStatus::Skipped => "skipped",
        }
    }

    /// A downstream job may proceed only if all its dependencies ended here.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

/// Status of a single step within a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Resume idempotency: a step already in one of these states is not re-executed.
    pub fn is_resumable_complete(&self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Skipped)
    }
}

/// Workspace cleanup policy declared on `FlowMeta.workspace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    OnSuccess,
    Always,
    Never,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        CleanupPolicy::OnSuccess
    }
}

/// Lock scope declared on `FlowMeta.locks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    None,
    Job,
    Flow,
}

impl Default for LockScope {
    fn default() -> Self {
        LockScope::Job
    }
}

/// Connector instance lifetime policy (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Cached for the lifetime of the run context (default).
    Run,
    /// Cached process-wide; survives between runs.
    Process,
    /// Fresh instance per call.
    None,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy::Run
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
