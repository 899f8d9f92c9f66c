// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aetherflow_connectors::ConnectorRegistry;
use aetherflow_core::{
    EnvSnapshot, FlowMetaSpec, FlowSpec, JobSpec, RunMode, Settings, StateSpec, StepSpec, WorkspaceSpec,
};
use aetherflow_validate::Issue;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use super::*;
use crate::observer::NullRunObserver;
use crate::registry::{Step, StepOutcome, StepRegistry, StepRunContext};

/// A step that always succeeds, recording each invocation so a test can
/// assert how many times it actually ran (resume idempotency).
struct CountingStep {
    calls: Arc<AtomicUsize>,
    output: Value,
}

impl Step for CountingStep {
    fn validate(&self, _inputs: &Map<String, Value>, _loc: &str) -> Vec<Issue> {
        Vec::new()
    }

    fn run(&self, _inputs: &Map<String, Value>, _ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StepOutcome::Success(self.output.as_object().cloned().unwrap_or_default()))
    }
}

struct FailingStep;

impl Step for FailingStep {
    fn validate(&self, _inputs: &Map<String, Value>, _loc: &str) -> Vec<Issue> {
        Vec::new()
    }

    fn run(&self, _inputs: &Map<String, Value>, _ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        Err(StepError::Other("boom".to_string()))
    }
}

struct SkippingStep;

impl Step for SkippingStep {
    fn validate(&self, _inputs: &Map<String, Value>, _loc: &str) -> Vec<Issue> {
        Vec::new()
    }

    fn run(&self, _inputs: &Map<String, Value>, _ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Skipped { reason: "no rows".to_string() })
    }
}

fn step(id: &str, step_type: &str) -> StepSpec {
    StepSpec { id: id.to_string(), step_type: step_type.to_string(), inputs: Map::new(), on_no_data: None, outputs: Map::new() }
}

fn job(id: &str, depends_on: &[&str], when: Option<&str>, steps: Vec<StepSpec>) -> JobSpec {
    JobSpec {
        id: id.to_string(),
        description: None,
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        when: when.map(str::to_string),
        steps,
    }
}

fn flow(state_path: &std::path::Path, jobs: Vec<JobSpec>) -> FlowSpec {
    FlowSpec {
        version: 1,
        flow: FlowMetaSpec {
            id: "flow-1".to_string(),
            description: None,
            workspace: WorkspaceSpec::default(),
            state: StateSpec { backend: "file".to_string(), path: state_path.to_string_lossy().to_string() },
            locks: Default::default(),
        },
        resources: IndexMap::new(),
        jobs,
    }
}

fn run_with(flow: &FlowSpec, step_registry: StepRegistry, work_root: &std::path::Path, run_id: Option<&str>) -> Result<RunSummary, ExecuteError> {
    let mut flow = flow.clone();
    flow.flow.workspace.root = work_root.to_string_lossy().to_string();
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let settings = Settings { mode: RunMode::InternalFast, ..Settings::from_env(&env) };
    let observer = NullRunObserver;
    let deps = RunDeps {
        connector_registry: ConnectorRegistry::new(),
        step_registry,
        secrets: None,
        observer: &observer,
    };
    let options = RunOptions { run_id: run_id.map(str::to_string), flow_job: None };
    run_flow(&flow, &IndexMap::new(), &env, &settings, deps, options)
}

#[test]
fn happy_path_runs_jobs_in_order_and_chains_outputs() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();

    let mut first = step("extract", "counting");
    first.outputs.insert("rows".to_string(), json!("{{result.rows}}"));
    let second = step("load", "counting");

    let f = flow(
        &state_dir.path().join("state.json"),
        vec![job("a", &[], None, vec![first]), job("b", &["a"], None, vec![second])],
    );

    let registry = StepRegistry::new();
    registry.register("counting", Arc::new(CountingStep { calls: Arc::new(AtomicUsize::new(0)), output: json!({"rows": 7}) }));

    let summary = run_with(&f, registry, work_dir.path(), None).unwrap();
    assert_eq!(summary.status_counts.get("success"), Some(&2));
    assert_eq!(summary.jobs.len(), 2);
}

#[test]
fn failing_step_fails_the_job_and_halts_the_run() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();

    let f = flow(
        &state_dir.path().join("state.json"),
        vec![job("a", &[], None, vec![step("s", "failing")]), job("b", &["a"], None, vec![step("s", "counting")])],
    );

    let registry = StepRegistry::new();
    registry.register("failing", Arc::new(FailingStep));
    registry.register("counting", Arc::new(CountingStep { calls: Arc::new(AtomicUsize::new(0)), output: json!({}) }));

    let err = run_with(&f, registry, work_dir.path(), None).unwrap_err();
    assert!(matches!(err, ExecuteError::Step { .. }));
}

#[test]
fn job_blocked_when_its_dependency_was_skipped_not_successful() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let f = flow(
        &state_dir.path().join("state.json"),
        vec![
            job("a", &[], Some("jobs.nonexistent.outputs.flag == true"), vec![step("s", "counting")]),
            job("b", &["a"], None, vec![step("s", "counting")]),
        ],
    );

    let registry = StepRegistry::new();
    registry.register("counting", Arc::new(CountingStep { calls: calls.clone(), output: json!({}) }));

    let summary = run_with(&f, registry, work_dir.path(), None).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.jobs[0].status, aetherflow_core::JobStatus::Skipped);
    assert_eq!(summary.jobs[1].status, aetherflow_core::JobStatus::Blocked);
}

#[test]
fn when_false_skips_job_without_running_its_steps() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let f = flow(
        &state_dir.path().join("state.json"),
        vec![job("a", &[], Some("jobs.nonexistent.outputs.flag == true"), vec![step("s", "counting")])],
    );

    let registry = StepRegistry::new();
    registry.register("counting", Arc::new(CountingStep { calls: calls.clone(), output: json!({}) }));

    let summary = run_with(&f, registry, work_dir.path(), None).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.status_counts.get("skipped"), Some(&1));
}

#[test]
fn on_no_data_skip_job_short_circuits_remaining_steps() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut gate = step("gate", "skipping");
    gate.on_no_data = Some(aetherflow_core::OnNoData::SkipJob);
    let after = step("after", "counting");

    let f = flow(&state_dir.path().join("state.json"), vec![job("a", &[], None, vec![gate, after])]);

    let registry = StepRegistry::new();
    registry.register("skipping", Arc::new(SkippingStep));
    registry.register("counting", Arc::new(CountingStep { calls: calls.clone(), output: json!({}) }));

    let summary = run_with(&f, registry, work_dir.path(), None).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.jobs[0].status, aetherflow_core::JobStatus::Skipped);
}

#[test]
fn resuming_a_run_id_does_not_re_execute_completed_steps() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let f = flow(&state_dir.path().join("state.json"), vec![job("a", &[], None, vec![step("s", "counting")])]);
    let registry = StepRegistry::new();
    registry.register("counting", Arc::new(CountingStep { calls: calls.clone(), output: json!({"rows": 1}) }));

    run_with(&f, registry.clone(), work_dir.path(), Some("fixed-run")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    run_with(&f, registry, work_dir.path(), Some("fixed-run")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "resumed run must not re-run a completed step");
}

#[test]
fn unregistered_step_type_fails_the_run() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();

    let f = flow(&state_dir.path().join("state.json"), vec![job("a", &[], None, vec![step("s", "ghost.type")])]);
    let err = run_with(&f, StepRegistry::new(), work_dir.path(), None).unwrap_err();
    assert!(matches!(err, ExecuteError::UnknownStepType(t) if t == "ghost.type"));
}
