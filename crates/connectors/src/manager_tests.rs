// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::base::{Connector, ConnectorHandle};
use crate::registry::ConnectorRegistry;
use aetherflow_core::{CachePolicy, LogFormat, ResourceSpec, RunMode};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingStub {
    name: String,
    count: Arc<AtomicUsize>,
}

impl Connector for CountingStub {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "db"
    }
    fn driver(&self) -> &str {
        "counter"
    }
}

impl crate::base::DbConnector for CountingStub {
    fn query(&self, _sql: &str, _params: &[serde_json::Value]) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ConnectorError> {
        Ok(Vec::new())
    }
    fn execute(&self, _sql: &str, _params: &[serde_json::Value]) -> Result<u64, ConnectorError> {
        Ok(0)
    }
}

fn settings(cache_default: CachePolicy, disabled: bool) -> aetherflow_core::Settings {
    aetherflow_core::Settings {
        work_root: "/tmp/work".into(),
        state_root: "/tmp/state".into(),
        plugin_paths: vec![],
        plugin_strict: false,
        strict_templates: false,
        log_level: "info".to_string(),
        log_format: LogFormat::Text,
        metrics_module: None,
        connector_cache_default: cache_default,
        connector_cache_disabled: disabled,
        secrets_module: None,
        secrets_path: None,
        mode: RunMode::InternalFast,
        strict_sandbox: true,
        validate_env_strict: false,
        profiles_file: None,
        profiles_json: None,
        env_files_json: None,
    }
}

fn resources_with(name: &str, kind: &str) -> IndexMap<String, ResourceSpec> {
    let mut map = IndexMap::new();
    map.insert(
        name.to_string(),
        ResourceSpec {
            kind: kind.to_string(),
            driver: "counter".to_string(),
            profile: None,
            config: serde_json::Map::new(),
            options: serde_json::Map::new(),
            decode: Default::default(),
        },
    );
    map
}

fn registry_counting(count: Arc<AtomicUsize>) -> ConnectorRegistry {
    let reg = ConnectorRegistry::new();
    reg.register("db", "counter", move |init: ConnectorInit| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(ConnectorHandle::Db(Arc::new(CountingStub { name: init.name, count: Arc::new(AtomicUsize::new(0)) }) as Arc<dyn crate::base::DbConnector>))
    });
    reg
}

#[test]
fn run_cache_policy_builds_once_per_run() {
    let count = Arc::new(AtomicUsize::new(0));
    let reg = registry_counting(count.clone());
    let resources = resources_with("primary", "db");
    let settings = settings(CachePolicy::Run, false);
    let manager = Connectors::new(reg, &resources, &settings);

    let _ = manager.get("db", "primary", None).unwrap();
    let _ = manager.get("db", "primary", None).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn none_cache_policy_builds_fresh_each_call() {
    let count = Arc::new(AtomicUsize::new(0));
    let reg = registry_counting(count.clone());
    let resources = resources_with("primary", "db");
    let settings = settings(CachePolicy::None, false);
    let manager = Connectors::new(reg, &resources, &settings);

    let _ = manager.get("db", "primary", None).unwrap();
    let _ = manager.get("db", "primary", None).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn connector_cache_disabled_overrides_the_resource_and_default_policy() {
    let count = Arc::new(AtomicUsize::new(0));
    let reg = registry_counting(count.clone());
    let resources = resources_with("primary", "db");
    let settings = settings(CachePolicy::Run, true);
    let manager = Connectors::new(reg, &resources, &settings);

    let _ = manager.get("db", "primary", None).unwrap();
    let _ = manager.get("db", "primary", None).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn per_call_override_wins_over_every_other_policy() {
    let count = Arc::new(AtomicUsize::new(0));
    let reg = registry_counting(count.clone());
    let resources = resources_with("primary", "db");
    let settings = settings(CachePolicy::Run, false);
    let manager = Connectors::new(reg, &resources, &settings);

    let _ = manager.get("db", "primary", Some(CachePolicy::None)).unwrap();
    let _ = manager.get("db", "primary", Some(CachePolicy::None)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn kind_mismatch_is_rejected_before_construction() {
    let count = Arc::new(AtomicUsize::new(0));
    let reg = registry_counting(count.clone());
    let resources = resources_with("primary", "rest");
    let settings = settings(CachePolicy::Run, false);
    let manager = Connectors::new(reg, &resources, &settings);

    let err = manager.get("db", "primary", None).unwrap_err();
    assert!(matches!(err, ConnectorError::KindMismatch { .. }));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_resource_name_is_rejected() {
    let count = Arc::new(AtomicUsize::new(0));
    let reg = registry_counting(count);
    let resources = resources_with("primary", "db");
    let settings = settings(CachePolicy::Run, false);
    let manager = Connectors::new(reg, &resources, &settings);

    let err = manager.get("db", "nope", None).unwrap_err();
    assert!(matches!(err, ConnectorError::UnknownResource { .. }));
}
