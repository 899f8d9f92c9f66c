// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use aetherflow_core::{DecodeSpec, EnvSnapshot, ProfileSpec, ResourceSpec, WorkspaceSpec};
use serde_json::json;
use tempfile::TempDir;

use super::*;

fn resource(profile: Option<&str>, config: serde_json::Map<String, Value>) -> ResourceSpec {
    ResourceSpec {
        kind: "sftp".to_string(),
        driver: "openssh".to_string(),
        profile: profile.map(str::to_string),
        config,
        options: serde_json::Map::new(),
        decode: DecodeSpec(Value::Null),
    }
}

struct UppercaseSecrets;
impl SecretsProvider for UppercaseSecrets {
    fn decode(&self, value: &str) -> Result<String, String> {
        Ok(value.to_uppercase())
    }
}

// --- build_env_snapshot ------------------------------------------------

#[test]
fn env_files_override_ambient() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "HOST=from-file\n").unwrap();
    let mut ambient = BTreeMap::new();
    ambient.insert("HOST".to_string(), "from-ambient".to_string());
    let ambient = EnvSnapshot::from_map(ambient);

    let specs = vec![aetherflow_core::EnvFileSpec {
        file_type: "dotenv".to_string(),
        path: ".env".to_string(),
        optional: false,
        prefix: String::new(),
    }];

    let snapshot = build_env_snapshot(&ambient, &specs, dir.path(), None, None).unwrap();
    assert_eq!(snapshot.get("HOST"), Some("from-file"));
}

#[test]
fn bundle_injection_overrides_env_files() {
    let dir = TempDir::new().unwrap();
    let ambient = EnvSnapshot::from_map(BTreeMap::new());
    let bundle = BundleInjection { active_dir: Some("/bundles/active".to_string()), ..Default::default() };

    let snapshot = build_env_snapshot(&ambient, &[], dir.path(), Some(&bundle), None).unwrap();
    assert_eq!(snapshot.get("AETHERFLOW_ACTIVE_DIR"), Some("/bundles/active"));
}

#[test]
fn enterprise_mode_drops_ambient_plugin_paths() {
    let dir = TempDir::new().unwrap();
    let mut ambient = BTreeMap::new();
    ambient.insert("AETHERFLOW_PLUGIN_PATHS".to_string(), "/untrusted/plugins".to_string());
    ambient.insert("AETHERFLOW_STRICT_SANDBOX".to_string(), "0".to_string());
    let ambient = EnvSnapshot::from_map(ambient);
    let bundle = BundleInjection { mode: Some("enterprise".to_string()), ..Default::default() };

    let snapshot = build_env_snapshot(&ambient, &[], dir.path(), Some(&bundle), None).unwrap();
    assert_eq!(snapshot.get("AETHERFLOW_PLUGIN_PATHS"), None);
    assert_eq!(snapshot.get("AETHERFLOW_STRICT_SANDBOX"), None);
    assert_eq!(snapshot.get("AETHERFLOW_MODE"), Some("enterprise"));
}

#[test]
fn enterprise_mode_via_mode_enterprise_flag() {
    let dir = TempDir::new().unwrap();
    let mut ambient = BTreeMap::new();
    ambient.insert("AETHERFLOW_PLUGIN_PATHS".to_string(), "/untrusted".to_string());
    let ambient = EnvSnapshot::from_map(ambient);
    let bundle = BundleInjection { mode_enterprise: Some("true".to_string()), ..Default::default() };

    let snapshot = build_env_snapshot(&ambient, &[], dir.path(), Some(&bundle), None).unwrap();
    assert_eq!(snapshot.get("AETHERFLOW_PLUGIN_PATHS"), None);
}

#[test]
fn non_enterprise_bundle_keeps_ambient_plugin_paths() {
    let dir = TempDir::new().unwrap();
    let mut ambient = BTreeMap::new();
    ambient.insert("AETHERFLOW_PLUGIN_PATHS".to_string(), "/trusted".to_string());
    let ambient = EnvSnapshot::from_map(ambient);
    let bundle = BundleInjection { cache_dir: Some("/cache".to_string()), ..Default::default() };

    let snapshot = build_env_snapshot(&ambient, &[], dir.path(), Some(&bundle), None).unwrap();
    assert_eq!(snapshot.get("AETHERFLOW_PLUGIN_PATHS"), Some("/trusted"));
}

struct PrefixStripper;
impl SecretsProvider for PrefixStripper {
    fn decode(&self, value: &str) -> Result<String, String> {
        Ok(value.to_string())
    }

    fn expand_env(&self, env: &EnvSnapshot) -> Option<EnvSnapshot> {
        Some(env.with_overrides([("EXPANDED".to_string(), "yes".to_string())]))
    }
}

#[test]
fn expand_env_hook_applies_last() {
    let dir = TempDir::new().unwrap();
    let ambient = EnvSnapshot::from_map(BTreeMap::new());
    let snapshot = build_env_snapshot(&ambient, &[], dir.path(), None, Some(&PrefixStripper)).unwrap();
    assert_eq!(snapshot.get("EXPANDED"), Some("yes"));
}

#[test]
fn missing_required_env_file_propagates_error() {
    let dir = TempDir::new().unwrap();
    let ambient = EnvSnapshot::from_map(BTreeMap::new());
    let specs = vec![aetherflow_core::EnvFileSpec {
        file_type: "dotenv".to_string(),
        path: "missing.env".to_string(),
        optional: false,
        prefix: String::new(),
    }];
    let err = build_env_snapshot(&ambient, &specs, dir.path(), None, None).unwrap_err();
    assert!(matches!(err, StepError::InvalidInput { .. }));
}

// --- materialize_resources ----------------------------------------------

#[test]
fn resource_without_profile_renders_against_env() {
    let mut env = BTreeMap::new();
    env.insert("SFTP_HOST".to_string(), "sftp.example.com".to_string());
    let env = EnvSnapshot::from_map(env);

    let mut config = serde_json::Map::new();
    config.insert("host".to_string(), json!("{{env.SFTP_HOST}}"));
    let mut resources = IndexMap::new();
    resources.insert("drop".to_string(), resource(None, config));

    let out = materialize_resources(&resources, &IndexMap::new(), &env, None).unwrap();
    assert_eq!(out["drop"].config["host"], json!("sftp.example.com"));
}

#[test]
fn profile_supplies_defaults_resource_wins_on_conflict() {
    let env = EnvSnapshot::from_map(BTreeMap::new());

    let mut profile_config = serde_json::Map::new();
    profile_config.insert("port".to_string(), json!(22));
    profile_config.insert("timeout".to_string(), json!(30));
    let profile = ProfileSpec { config: profile_config, options: serde_json::Map::new(), decode: DecodeSpec(Value::Null) };
    let mut profiles = IndexMap::new();
    profiles.insert("default".to_string(), profile);

    let mut resource_config = serde_json::Map::new();
    resource_config.insert("port".to_string(), json!(2222));
    let mut resources = IndexMap::new();
    resources.insert("drop".to_string(), resource(Some("default"), resource_config));

    let out = materialize_resources(&resources, &profiles, &env, None).unwrap();
    assert_eq!(out["drop"].config["port"], json!(2222));
    assert_eq!(out["drop"].config["timeout"], json!(30));
}

#[test]
fn unknown_profile_reference_is_invalid_input() {
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let mut resources = IndexMap::new();
    resources.insert("drop".to_string(), resource(Some("ghost"), serde_json::Map::new()));

    let err = materialize_resources(&resources, &IndexMap::new(), &env, None).unwrap_err();
    assert!(matches!(err, StepError::InvalidInput { field, .. } if field == "profile"));
}

#[test]
fn decode_requests_union_across_profile_and_resource() {
    let env = EnvSnapshot::from_map(BTreeMap::new());

    let mut profile_config = serde_json::Map::new();
    profile_config.insert("password".to_string(), json!("from-profile"));
    let profile = ProfileSpec {
        config: profile_config,
        options: serde_json::Map::new(),
        decode: DecodeSpec(json!({"config": {"password": true}})),
    };
    let mut profiles = IndexMap::new();
    profiles.insert("default".to_string(), profile);

    let mut resource_config = serde_json::Map::new();
    resource_config.insert("token".to_string(), json!("from-resource"));
    let mut spec = resource(Some("default"), resource_config);
    spec.decode = DecodeSpec(json!({"config": {"token": true}}));
    let mut resources = IndexMap::new();
    resources.insert("drop".to_string(), spec);

    let out = materialize_resources(&resources, &profiles, &env, Some(&UppercaseSecrets)).unwrap();
    assert_eq!(out["drop"].config["password"], json!("FROM-PROFILE"));
    assert_eq!(out["drop"].config["token"], json!("FROM-RESOURCE"));
}

#[test]
fn rejects_non_env_roots_in_resource_config() {
    let env = EnvSnapshot::from_map(BTreeMap::new());
    let mut config = serde_json::Map::new();
    config.insert("host".to_string(), json!("{{steps.prev.output}}"));
    let mut resources = IndexMap::new();
    resources.insert("drop".to_string(), resource(None, config));

    let err = materialize_resources(&resources, &IndexMap::new(), &env, None).unwrap_err();
    assert!(matches!(err, StepError::Resolver(_)));
}

// --- job directory layout -----------------------------------------------

#[test]
fn creates_job_dir_tree_with_default_layout() {
    let dir = TempDir::new().unwrap();
    let layout = WorkspaceSpec::default();
    let dirs = create_job_dirs(dir.path(), "flow-a", "job-a", "run123", &layout).unwrap();

    assert!(dirs.artifacts_dir.ends_with("flow-a/job-a/run123/artifacts"));
    assert!(dirs.artifacts_dir.is_dir());
    assert!(dirs.scratch_dir.is_dir());
    assert!(dirs.manifests_dir.is_dir());
}

#[test]
fn creates_job_dir_tree_with_custom_layout() {
    let dir = TempDir::new().unwrap();
    let mut layout = WorkspaceSpec::default();
    layout.layout.insert("artifacts".to_string(), "out".to_string());
    let dirs = create_job_dirs(dir.path(), "flow-a", "job-a", "run123", &layout).unwrap();
    assert!(dirs.artifacts_dir.ends_with("out"));
}

#[test]
fn cleanup_job_dir_removes_tree_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let layout = WorkspaceSpec::default();
    let dirs = create_job_dirs(dir.path(), "flow-a", "job-a", "run123", &layout).unwrap();
    assert!(dirs.job_dir.exists());

    cleanup_job_dir(&dirs.job_dir).unwrap();
    assert!(!dirs.job_dir.exists());
    cleanup_job_dir(&dirs.job_dir).unwrap();
}
