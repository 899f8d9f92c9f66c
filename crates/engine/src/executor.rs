// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run executor (§4.3): walks jobs in declaration order, honors
//! `depends_on`/`when` gating, executes each job's steps under a shared
//! run context with resumable per-step state, and emits a structured
//! run summary.

use std::collections::HashMap;
use std::time::Instant;

use aetherflow_connectors::{ConnectorRegistry, Connectors};
use aetherflow_core::{
    new_run_id, CleanupPolicy, EnvSnapshot, FlowSpec, JobStatus, OnNoData, ProfileSpec, Settings,
    StepSpec, StepStatus,
};
use aetherflow_resolver::{render_value, RenderCtx, SecretsProvider, STEP_ALLOWED_ROOTS};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::{cleanup_job_dir, create_job_dirs, materialize_resources};
use crate::error::{ExecuteError, StepError};
use crate::observer::RunObserver;
use crate::registry::{StepOutcome, StepRegistry, StepRunContext};
use crate::state::StateStore;

/// Caller-supplied options for a single `run_flow` invocation (§6 CLI
/// surface `run --run-id --flow-job`).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Reuse a prior run id to resume (step-level resume idempotency,
    /// §8 property 10). A fresh 12-hex id is generated when absent.
    pub run_id: Option<String>,
    /// Restrict execution to a single job id (and anything it
    /// transitively depends on is still honored via state lookups, but
    /// not re-run unless its own status isn't terminal).
    pub flow_job: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcomeRecord {
    pub step_id: String,
    pub step_type: String,
    pub status: StepStatus,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub steps: Vec<StepOutcomeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub flow_id: String,
    pub run_id: String,
    pub duration_ms: u64,
    pub status_counts: HashMap<String, u64>,
    pub jobs: Vec<JobOutcome>,
}

/// Everything `run_flow` needs beyond the flow document itself: the
/// materialized registries, the secrets hook, and the observer sink.
pub struct RunDeps<'a> {
    pub connector_registry: ConnectorRegistry,
    pub step_registry: StepRegistry,
    pub secrets: Option<&'a dyn SecretsProvider>,
    pub observer: &'a dyn RunObserver,
}

fn roots_map(
    env: &EnvSnapshot,
    steps_outputs: &Map<String, Value>,
    job_outputs: &Map<String, Value>,
    jobs_value: &Value,
    run_id: &str,
    flow_id: &str,
    result: Value,
) -> Map<String, Value> {
    let mut env_obj = Map::new();
    for (k, v) in env.iter() {
        env_obj.insert(k.clone(), Value::String(v.clone()));
    }
    let mut roots = Map::new();
    roots.insert("env".to_string(), Value::Object(env_obj));
    roots.insert("steps".to_string(), Value::Object(steps_outputs.clone()));
    let mut job_obj = Map::new();
    job_obj.insert("outputs".to_string(), Value::Object(job_outputs.clone()));
    roots.insert("job".to_string(), Value::Object(job_obj));
    roots.insert("jobs".to_string(), jobs_value.clone());
    roots.insert("run_id".to_string(), Value::String(run_id.to_string()));
    roots.insert("flow_id".to_string(), Value::String(flow_id.to_string()));
    roots.insert("result".to_string(), result);
    roots
}

fn render_step_outputs(
    step: &StepSpec,
    result: &Map<String, Value>,
    env: &EnvSnapshot,
    steps_outputs: &Map<String, Value>,
    job_outputs: &mut Map<String, Value>,
    jobs_value: &Value,
    run_id: &str,
    flow_id: &str,
) -> Result<(), ExecuteError> {
    if step.outputs.is_empty() {
        return Ok(());
    }
    let roots = roots_map(env, steps_outputs, job_outputs, jobs_value, run_id, flow_id, Value::Object(result.clone()));
    let ctx = RenderCtx { roots: &roots, allowed_roots: STEP_ALLOWED_ROOTS };
    let rendered = render_value(&Value::Object(step.outputs.clone()), &ctx)?;
    if let Value::Object(map) = rendered {
        for (k, v) in map {
            job_outputs.insert(k, v);
        }
    }
    Ok(())
}

fn job_status_str_counts(counts: &mut HashMap<String, u64>, status: JobStatus) {
    *counts.entry(status.as_str().to_string()).or_insert(0) += 1;
}

/// Execute a validated [`FlowSpec`]. Callers are expected to have already
/// run the flow through `aetherflow-validate` — this function does not
/// re-validate, it executes.
#[allow(clippy::too_many_arguments)]
pub fn run_flow(
    flow: &FlowSpec,
    profiles: &IndexMap<String, ProfileSpec>,
    env: &EnvSnapshot,
    settings: &Settings,
    deps: RunDeps,
    options: RunOptions,
) -> Result<RunSummary, ExecuteError> {
    let started = Instant::now();
    let run_id = options.run_id.clone().unwrap_or_else(new_run_id);
    let flow_id = flow.flow.id.clone();

    deps.observer.run_start(&flow_id, &run_id);

    let env_roots = {
        let mut m = Map::new();
        let mut env_obj = Map::new();
        for (k, v) in env.iter() {
            env_obj.insert(k.clone(), Value::String(v.clone()));
        }
        m.insert("env".to_string(), Value::Object(env_obj));
        m
    };
    let resource_ctx = RenderCtx { roots: &env_roots, allowed_roots: aetherflow_resolver::RESOURCE_ALLOWED_ROOTS };
    let work_root_str = match render_value(&Value::String(flow.flow.workspace.root.clone()), &resource_ctx)? {
        Value::String(s) => s,
        other => aetherflow_core::json_to_string_lossy(&other),
    };
    let work_root = std::path::PathBuf::from(work_root_str);

    let state_path_str = match render_value(&Value::String(flow.flow.state.path.clone()), &resource_ctx)? {
        Value::String(s) => s,
        other => aetherflow_core::json_to_string_lossy(&other),
    };
    let state =
        crate::state::open_state_store(&flow.flow.state.backend, std::path::Path::new(&state_path_str))?;

    let resources = materialize_resources(&flow.resources, profiles, env, deps.secrets)
        .map_err(|e| ExecuteError::Other(format!("resource materialization failed: {e}")))?;
    let connectors = Connectors::new(deps.connector_registry, &resources, settings);

    let mut job_statuses: HashMap<String, JobStatus> = HashMap::new();
    let mut jobs_outputs: IndexMap<String, Map<String, Value>> = IndexMap::new();
    let mut job_outcomes: Vec<JobOutcome> = Vec::new();
    let mut run_error: Option<ExecuteError> = None;

    'jobs: for job in &flow.jobs {
        if let Some(only) = &options.flow_job {
            if &job.id != only {
                continue;
            }
        }

        let job_started = Instant::now();
        deps.observer.job_start(&job.id);

        let deps_ok = job.depends_on.iter().all(|d| job_statuses.get(d).map(JobStatus::is_success).unwrap_or(false));
        if !deps_ok {
            job_statuses.insert(job.id.clone(), JobStatus::Blocked);
            state.set_job_status(&job.id, &run_id, JobStatus::Blocked)?;
            let duration_ms = job_started.elapsed().as_millis() as u64;
            deps.observer.job_end(&job.id, JobStatus::Blocked, duration_ms, None);
            job_outcomes.push(JobOutcome { job_id: job.id.clone(), status: JobStatus::Blocked, duration_ms, skip_reason: None, steps: Vec::new() });
            continue;
        }

        let jobs_value = build_jobs_value(&jobs_outputs, &job_statuses);

        if let Some(when_src) = &job.when {
            let cond = match aetherflow_validate::parse(when_src) {
                Ok(expr) => aetherflow_validate::evaluate(&expr, &jobs_value),
                Err(_) => false,
            };
            if !cond {
                job_statuses.insert(job.id.clone(), JobStatus::Skipped);
                state.set_job_status(&job.id, &run_id, JobStatus::Skipped)?;
                jobs_outputs.insert(job.id.clone(), Map::new());
                let duration_ms = job_started.elapsed().as_millis() as u64;
                deps.observer.job_end(&job.id, JobStatus::Skipped, duration_ms, Some("condition=false"));
                job_outcomes.push(JobOutcome {
                    job_id: job.id.clone(),
                    status: JobStatus::Skipped,
                    duration_ms,
                    skip_reason: Some("condition=false".to_string()),
                    steps: Vec::new(),
                });
                continue;
            }
        }

        state.set_job_status(&job.id, &run_id, JobStatus::Running)?;

        let job_dirs = match create_job_dirs(&work_root, &flow_id, &job.id, &run_id, &flow.flow.workspace) {
            Ok(d) => d,
            Err(e) => {
                state.set_job_status(&job.id, &run_id, JobStatus::Failed)?;
                let duration_ms = job_started.elapsed().as_millis() as u64;
                deps.observer.job_end(&job.id, JobStatus::Failed, duration_ms, None);
                job_outcomes.push(JobOutcome { job_id: job.id.clone(), status: JobStatus::Failed, duration_ms, skip_reason: None, steps: Vec::new() });
                run_error = Some(ExecuteError::Step { job_id: job.id.clone(), step_id: String::new(), source: e });
                break 'jobs;
            }
        };

        let mut steps_outputs: Map<String, Value> = Map::new();
        let mut job_outputs: Map<String, Value> = Map::new();
        let mut step_records: Vec<StepOutcomeRecord> = Vec::new();
        let mut skip_job_reason: Option<String> = None;
        let mut job_failed = false;

        for step in &job.steps {
            let step_started = Instant::now();
            deps.observer.step_start(&job.id, &step.id, &step.step_type);

            if let Some(reason) = &skip_job_reason {
                state.set_step_status(&job.id, &run_id, &step.id, StepStatus::Skipped, None)?;
                let duration_ms = step_started.elapsed().as_millis() as u64;
                deps.observer.step_end(&job.id, &step.id, StepStatus::Skipped, duration_ms);
                step_records.push(StepOutcomeRecord { step_id: step.id.clone(), step_type: step.step_type.clone(), status: StepStatus::Skipped, duration_ms });
                let _ = reason;
                continue;
            }

            let persisted = state.get_step_status(&job.id, &run_id, &step.id)?;
            if persisted.map(|s| s.is_resumable_complete()).unwrap_or(false) {
                let output = state.get_step_output(&job.id, &run_id, &step.id)?.unwrap_or(Value::Object(Map::new()));
                let output_obj = output.as_object().cloned().unwrap_or_default();
                steps_outputs.insert(step.id.clone(), Value::Object(output_obj.clone()));
                let jobs_value = build_jobs_value(&jobs_outputs, &job_statuses);
                if let Err(e) = render_step_outputs(step, &output_obj, env, &steps_outputs, &mut job_outputs, &jobs_value, &run_id, &flow_id) {
                    run_error = Some(e.into());
                    job_failed = true;
                    break;
                }
                let duration_ms = step_started.elapsed().as_millis() as u64;
                let status = persisted.unwrap_or(StepStatus::Success);
                deps.observer.step_end(&job.id, &step.id, status, duration_ms);
                step_records.push(StepOutcomeRecord { step_id: step.id.clone(), step_type: step.step_type.clone(), status, duration_ms });
                continue;
            }

            let jobs_value = build_jobs_value(&jobs_outputs, &job_statuses);
            let roots = roots_map(env, &steps_outputs, &job_outputs, &jobs_value, &run_id, &flow_id, Value::Object(Map::new()));
            let render_ctx = RenderCtx { roots: &roots, allowed_roots: STEP_ALLOWED_ROOTS };
            let rendered_inputs = match render_value(&Value::Object(step.inputs.clone()), &render_ctx) {
                Ok(Value::Object(m)) => m,
                Ok(_) => Map::new(),
                Err(e) => {
                    run_error = Some(ExecuteError::Step { job_id: job.id.clone(), step_id: step.id.clone(), source: StepError::from(e) });
                    job_failed = true;
                    break;
                }
            };

            let step_impl = match deps.step_registry.get(&step.step_type) {
                Some(s) => s,
                None => {
                    run_error = Some(ExecuteError::UnknownStepType(step.step_type.clone()));
                    job_failed = true;
                    break;
                }
            };

            let step_loc = format!("jobs.{}.steps.{}", job.id, step.id);
            let issues = step_impl.validate(&rendered_inputs, &step_loc);
            if !issues.is_empty() {
                let msg = issues.into_iter().map(|i| i.msg).collect::<Vec<_>>().join("; ");
                run_error = Some(ExecuteError::Step {
                    job_id: job.id.clone(),
                    step_id: step.id.clone(),
                    source: StepError::InvalidInput { field: "inputs".to_string(), msg },
                });
                state.set_step_status(&job.id, &run_id, &step.id, StepStatus::Failed, None)?;
                job_failed = true;
                break;
            }

            let step_ctx = StepRunContext {
                run_id: &run_id,
                flow_id: &flow_id,
                job_id: &job.id,
                step_id: &step.id,
                artifacts_dir: &job_dirs.artifacts_dir,
                scratch_dir: &job_dirs.scratch_dir,
                manifests_dir: &job_dirs.manifests_dir,
                work_root: &work_root,
                env,
                settings,
                connectors: &connectors,
                state: state.as_ref(),
            };

            match step_impl.run(&rendered_inputs, &step_ctx, &deps.step_registry) {
                Ok(StepOutcome::Success(output)) => {
                    state.set_step_status(&job.id, &run_id, &step.id, StepStatus::Success, Some(&Value::Object(output.clone())))?;
                    steps_outputs.insert(step.id.clone(), Value::Object(output.clone()));
                    if let Err(e) = render_step_outputs(step, &output, env, &steps_outputs, &mut job_outputs, &jobs_value, &run_id, &flow_id) {
                        run_error = Some(e.into());
                        job_failed = true;
                        break;
                    }
                    let duration_ms = step_started.elapsed().as_millis() as u64;
                    deps.observer.step_end(&job.id, &step.id, StepStatus::Success, duration_ms);
                    step_records.push(StepOutcomeRecord { step_id: step.id.clone(), step_type: step.step_type.clone(), status: StepStatus::Success, duration_ms });
                }
                Ok(StepOutcome::Skipped { reason }) => {
                    state.set_step_status(&job.id, &run_id, &step.id, StepStatus::Skipped, None)?;
                    steps_outputs.insert(step.id.clone(), Value::Object(Map::new()));
                    let duration_ms = step_started.elapsed().as_millis() as u64;
                    deps.observer.step_end(&job.id, &step.id, StepStatus::Skipped, duration_ms);
                    step_records.push(StepOutcomeRecord { step_id: step.id.clone(), step_type: step.step_type.clone(), status: StepStatus::Skipped, duration_ms });
                    if step.on_no_data == Some(OnNoData::SkipJob) {
                        skip_job_reason = Some(reason);
                    }
                }
                Err(e) => {
                    state.set_step_status(&job.id, &run_id, &step.id, StepStatus::Failed, None)?;
                    let duration_ms = step_started.elapsed().as_millis() as u64;
                    deps.observer.step_end(&job.id, &step.id, StepStatus::Failed, duration_ms);
                    step_records.push(StepOutcomeRecord { step_id: step.id.clone(), step_type: step.step_type.clone(), status: StepStatus::Failed, duration_ms });
                    run_error = Some(ExecuteError::Step { job_id: job.id.clone(), step_id: step.id.clone(), source: e });
                    job_failed = true;
                    break;
                }
            }
        }

        let job_status = if job_failed {
            JobStatus::Failed
        } else if skip_job_reason.is_some() {
            JobStatus::Skipped
        } else {
            JobStatus::Success
        };
        state.set_job_status(&job.id, &run_id, job_status)?;
        job_statuses.insert(job.id.clone(), job_status);
        jobs_outputs.insert(job.id.clone(), job_outputs);

        let should_clean = match flow.flow.workspace.cleanup_policy {
            CleanupPolicy::Always => true,
            CleanupPolicy::OnSuccess => job_status == JobStatus::Success,
            CleanupPolicy::Never => false,
        };
        if should_clean {
            let _ = cleanup_job_dir(&job_dirs.job_dir);
        }

        let duration_ms = job_started.elapsed().as_millis() as u64;
        deps.observer.job_end(&job.id, job_status, duration_ms, skip_job_reason.as_deref());
        job_outcomes.push(JobOutcome { job_id: job.id.clone(), status: job_status, duration_ms, skip_reason: skip_job_reason, steps: step_records });

        if job_failed {
            break 'jobs;
        }
    }

    connectors.close_all();

    let mut status_counts: HashMap<String, u64> = HashMap::new();
    for outcome in &job_outcomes {
        job_status_str_counts(&mut status_counts, outcome.status);
    }

    let summary = RunSummary {
        flow_id,
        run_id,
        duration_ms: started.elapsed().as_millis() as u64,
        status_counts,
        jobs: job_outcomes,
    };
    deps.observer.run_summary(&summary);

    match run_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

fn build_jobs_value(jobs_outputs: &IndexMap<String, Map<String, Value>>, statuses: &HashMap<String, JobStatus>) -> Value {
    let mut out = Map::new();
    for (job_id, outputs) in jobs_outputs {
        let mut entry = Map::new();
        entry.insert("outputs".to_string(), Value::Object(outputs.clone()));
        if let Some(status) = statuses.get(job_id) {
            entry.insert("status".to_string(), Value::String(status.as_str().to_string()));
        }
        out.insert(job_id.clone(), Value::Object(entry));
    }
    Value::Object(out)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
