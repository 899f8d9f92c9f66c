// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::sync::Arc;

use aetherflow_connectors::Connectors;
use aetherflow_core::{EnvSnapshot, Settings};
use aetherflow_validate::Issue;
use indexmap::IndexMap;
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::registry::StepRegistry;
use crate::state::SqliteStateStore;

struct EchoStep;

impl Step for EchoStep {
    fn validate(&self, _inputs: &Map<String, Value>, _loc: &str) -> Vec<Issue> {
        Vec::new()
    }

    fn run(&self, inputs: &Map<String, Value>, _ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Success(inputs.clone()))
    }
}

struct AlwaysFailsStep;

impl Step for AlwaysFailsStep {
    fn validate(&self, _inputs: &Map<String, Value>, _loc: &str) -> Vec<Issue> {
        Vec::new()
    }

    fn run(&self, _inputs: &Map<String, Value>, _ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        Err(StepError::Other("nested step failed".to_string()))
    }
}

fn ctx_fixture<'a>(
    work_root: &'a std::path::Path,
    env: &'a EnvSnapshot,
    settings: &'a Settings,
    connectors: &'a Connectors<'a>,
    state: &'a SqliteStateStore,
) -> StepRunContext<'a> {
    StepRunContext {
        run_id: "run1",
        flow_id: "flow1",
        job_id: "job1",
        step_id: "lock-step",
        artifacts_dir: work_root,
        scratch_dir: work_root,
        manifests_dir: work_root,
        work_root,
        env,
        settings,
        connectors,
        state,
    }
}

#[test]
fn acquires_runs_nested_step_and_releases_lock() {
    let work = TempDir::new().unwrap();
    let resources = IndexMap::new();
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let settings = Settings::from_env(&env);
    let connectors = Connectors::new(aetherflow_connectors::builtin_registry(), &resources, &settings);
    let state = SqliteStateStore::open_in_memory();
    let ctx = ctx_fixture(work.path(), &env, &settings, &connectors, &state);

    let registry = StepRegistry::new();
    registry.register("echo", Arc::new(EchoStep));

    let mut inner = Map::new();
    inner.insert("type".to_string(), json!("echo"));
    inner.insert("inputs".to_string(), json!({"value": 42}));
    let mut inputs = Map::new();
    inputs.insert("key".to_string(), json!("nightly-export"));
    inputs.insert("step".to_string(), Value::Object(inner));

    let outcome = WithLockStep.run(&inputs, &ctx, &registry).unwrap();
    let StepOutcome::Success(out) = outcome else { panic!("expected success") };
    assert_eq!(out["value"], json!(42));

    assert!(state.try_acquire_lock("nightly-export", "someone-else", 60, 0).unwrap());
}

#[test]
fn lock_already_held_is_unavailable() {
    let work = TempDir::new().unwrap();
    let resources = IndexMap::new();
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let settings = Settings::from_env(&env);
    let connectors = Connectors::new(aetherflow_connectors::builtin_registry(), &resources, &settings);
    let state = SqliteStateStore::open_in_memory();
    state.try_acquire_lock("nightly-export", "other-owner", 3600, 0).unwrap();
    let ctx = ctx_fixture(work.path(), &env, &settings, &connectors, &state);

    let registry = StepRegistry::new();
    registry.register("echo", Arc::new(EchoStep));

    let mut inner = Map::new();
    inner.insert("type".to_string(), json!("echo"));
    let mut inputs = Map::new();
    inputs.insert("key".to_string(), json!("nightly-export"));
    inputs.insert("step".to_string(), Value::Object(inner));

    let err = WithLockStep.run(&inputs, &ctx, &registry).unwrap_err();
    assert!(matches!(err, StepError::LockUnavailable(k) if k == "nightly-export"));
}

#[test]
fn lock_is_released_even_when_nested_step_fails() {
    let work = TempDir::new().unwrap();
    let resources = IndexMap::new();
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let settings = Settings::from_env(&env);
    let connectors = Connectors::new(aetherflow_connectors::builtin_registry(), &resources, &settings);
    let state = SqliteStateStore::open_in_memory();
    let ctx = ctx_fixture(work.path(), &env, &settings, &connectors, &state);

    let registry = StepRegistry::new();
    registry.register("boom", Arc::new(AlwaysFailsStep));

    let mut inner = Map::new();
    inner.insert("type".to_string(), json!("boom"));
    let mut inputs = Map::new();
    inputs.insert("key".to_string(), json!("k"));
    inputs.insert("step".to_string(), Value::Object(inner));

    let err = WithLockStep.run(&inputs, &ctx, &registry).unwrap_err();
    assert!(matches!(err, StepError::Other(_)));

    assert!(state.try_acquire_lock("k", "new-owner", 60, 0).unwrap());
}

#[test]
fn validate_requires_key_and_nested_step_type() {
    let issues = WithLockStep.validate(&Map::new(), "jobs.a.steps.lock");
    assert_eq!(issues.len(), 2);
}
