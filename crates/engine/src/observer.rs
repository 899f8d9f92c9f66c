// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured run/job/step lifecycle events (§6 "Log events"), grounded in
//! the original's `observability.py` logger-adapter but implemented over
//! `tracing` instead of a bespoke logger, since the teacher already builds
//! its event model on `tracing::info_span!`/`tracing::info!`.
//!
//! `AETHERFLOW_LOG_FORMAT=json` selects `tracing_subscriber::fmt::json()`
//! at the CLI boundary; this module only emits the structured fields each
//! event needs (`{ts_ms, event}` plus typed fields), not the formatter.

use aetherflow_core::{JobStatus, StepStatus};
use tracing::info;

use crate::executor::RunSummary;

fn ts_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// The event sink a run reports its lifecycle through. `aetherflow-cli`
/// selects the `tracing`-backed implementation; tests use the null sink.
pub trait RunObserver: Send + Sync {
    fn run_start(&self, flow_id: &str, run_id: &str) {
        let _ = (flow_id, run_id);
    }
    fn job_start(&self, job_id: &str) {
        let _ = job_id;
    }
    fn job_end(&self, job_id: &str, status: JobStatus, duration_ms: u64, skip_reason: Option<&str>) {
        let _ = (job_id, status, duration_ms, skip_reason);
    }
    fn step_start(&self, job_id: &str, step_id: &str, step_type: &str) {
        let _ = (job_id, step_id, step_type);
    }
    fn step_end(&self, job_id: &str, step_id: &str, status: StepStatus, duration_ms: u64) {
        let _ = (job_id, step_id, status, duration_ms);
    }
    fn run_summary(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// Emits one `tracing::info!` event per lifecycle point, each carrying
/// `ts_ms` + `event` + the typed fields §6 documents. With
/// `AETHERFLOW_LOG_FORMAT=json` these render as the one-JSON-object-per-line
/// shape external tooling consumes.
#[derive(Default)]
pub struct LogRunObserver;

impl RunObserver for LogRunObserver {
    fn run_start(&self, flow_id: &str, run_id: &str) {
        info!(ts_ms = ts_ms(), event = "run_start", flow_id, run_id);
    }

    fn job_start(&self, job_id: &str) {
        info!(ts_ms = ts_ms(), event = "job_start", job_id);
    }

    fn job_end(&self, job_id: &str, status: JobStatus, duration_ms: u64, skip_reason: Option<&str>) {
        info!(ts_ms = ts_ms(), event = "job_end", job_id, status = status.as_str(), duration_ms, skip_reason);
    }

    fn step_start(&self, job_id: &str, step_id: &str, step_type: &str) {
        info!(ts_ms = ts_ms(), event = "step_start", job_id, step_id, step_type);
    }

    fn step_end(&self, job_id: &str, step_id: &str, status: StepStatus, duration_ms: u64) {
        info!(ts_ms = ts_ms(), event = "step_end", job_id, step_id, status = status.as_str(), duration_ms);
    }

    fn run_summary(&self, summary: &RunSummary) {
        info!(
            ts_ms = ts_ms(),
            event = "run_summary",
            flow_id = %summary.flow_id,
            run_id = %summary.run_id,
            duration_ms = summary.duration_ms,
            status_counts = %serde_json::to_string(&summary.status_counts).unwrap_or_default(),
        );
    }
}

/// A no-op sink, used where a caller (tests, `doctor`/`explain`) needs a
/// `&dyn RunObserver` but doesn't want log output.
#[derive(Default)]
pub struct NullRunObserver;

impl RunObserver for NullRunObserver {}
