// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use aetherflow_connectors::Connectors;
use aetherflow_core::{EnvSnapshot, Settings};
use indexmap::IndexMap;
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::registry::StepRunContext;
use crate::state::SqliteStateStore;

fn ctx_fixture<'a>(
    artifacts_dir: &'a std::path::Path,
    env: &'a EnvSnapshot,
    settings: &'a Settings,
    connectors: &'a Connectors<'a>,
    state: &'a SqliteStateStore,
) -> StepRunContext<'a> {
    StepRunContext {
        run_id: "run1",
        flow_id: "flow1",
        job_id: "job1",
        step_id: "step1",
        artifacts_dir,
        scratch_dir: artifacts_dir,
        manifests_dir: artifacts_dir,
        work_root: artifacts_dir,
        env,
        settings,
        connectors,
        state,
    }
}

#[test]
fn check_success_fails_on_missing_required_file() {
    let work = TempDir::new().unwrap();
    let resources = IndexMap::new();
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let settings = Settings::from_env(&env);
    let connectors = Connectors::new(aetherflow_connectors::builtin_registry(), &resources, &settings);
    let state = SqliteStateStore::open_in_memory();
    let ctx = ctx_fixture(work.path(), &env, &settings, &connectors, &state);

    let mut spec = serde_json::Map::new();
    spec.insert("require_files".to_string(), json!(["output.csv"]));
    let (ok, reason) = check_success(&ctx, &spec).unwrap();
    assert!(!ok);
    assert_eq!(reason.as_deref(), Some("missing_required_file:output.csv"));
}

#[test]
fn check_success_fails_on_forbidden_file_present() {
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("error.flag"), "").unwrap();
    let resources = IndexMap::new();
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let settings = Settings::from_env(&env);
    let connectors = Connectors::new(aetherflow_connectors::builtin_registry(), &resources, &settings);
    let state = SqliteStateStore::open_in_memory();
    let ctx = ctx_fixture(work.path(), &env, &settings, &connectors, &state);

    let mut spec = serde_json::Map::new();
    spec.insert("forbid_files".to_string(), json!(["error.flag"]));
    let (ok, reason) = check_success(&ctx, &spec).unwrap();
    assert!(!ok);
    assert_eq!(reason.as_deref(), Some("forbidden_file_present:error.flag"));
}

#[test]
fn check_success_passes_when_marker_file_exists() {
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("done.marker"), "").unwrap();
    let resources = IndexMap::new();
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let settings = Settings::from_env(&env);
    let connectors = Connectors::new(aetherflow_connectors::builtin_registry(), &resources, &settings);
    let state = SqliteStateStore::open_in_memory();
    let ctx = ctx_fixture(work.path(), &env, &settings, &connectors, &state);

    let mut spec = serde_json::Map::new();
    spec.insert("marker_file".to_string(), json!("done.marker"));
    let (ok, reason) = check_success(&ctx, &spec).unwrap();
    assert!(ok);
    assert!(reason.is_none());
}

#[test]
fn safe_dest_joins_relative_paths_under_dest_dir() {
    let dir = TempDir::new().unwrap();
    let path = safe_dest(dir.path(), "reports/q1.csv").unwrap();
    assert!(path.starts_with(dir.path()));
    assert!(path.ends_with("reports/q1.csv"));
}

#[test]
fn safe_dest_rejects_escaping_paths() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("nested");
    std::fs::create_dir_all(&nested).unwrap();
    let err = safe_dest(&nested, "../../escaped.txt").unwrap_err();
    assert!(matches!(err, StepError::SandboxViolation(_)));
}
