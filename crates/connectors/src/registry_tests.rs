// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::base::{Connector, ConnectorHandle};
use std::sync::Arc;

struct Stub {
    name: String,
}

impl Connector for Stub {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "db"
    }
    fn driver(&self) -> &str {
        "stub"
    }
}

impl crate::base::DbConnector for Stub {
    fn query(&self, _sql: &str, _params: &[serde_json::Value]) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ConnectorError> {
        Ok(Vec::new())
    }
    fn execute(&self, _sql: &str, _params: &[serde_json::Value]) -> Result<u64, ConnectorError> {
        Ok(0)
    }
}

fn init(name: &str) -> ConnectorInit {
    ConnectorInit {
        name: name.to_string(),
        kind: "db".to_string(),
        driver: "stub".to_string(),
        config: serde_json::Map::new(),
        options: serde_json::Map::new(),
    }
}

#[test]
fn creates_a_registered_kind_driver_pair() {
    let reg = ConnectorRegistry::new();
    reg.register("db", "stub", |init: ConnectorInit| {
        Ok(ConnectorHandle::Db(Arc::new(Stub { name: init.name }) as Arc<dyn crate::base::DbConnector>))
    });
    let handle = reg.create(init("primary")).unwrap();
    assert_eq!(handle.name(), "primary");
    assert_eq!(handle.kind(), "db");
}

#[test]
fn unregistered_kind_driver_pair_lists_what_is_loaded() {
    let reg = ConnectorRegistry::new();
    reg.register("db", "stub", |init: ConnectorInit| {
        Ok(ConnectorHandle::Db(Arc::new(Stub { name: init.name }) as Arc<dyn crate::base::DbConnector>))
    });
    let err = reg.create(init_with_kind("db", "missing")).unwrap_err();
    match err {
        ConnectorError::Unregistered { kind, driver, loaded } => {
            assert_eq!(kind, "db");
            assert_eq!(driver, "missing");
            assert_eq!(loaded, vec!["db:stub".to_string()]);
        }
        other => panic!("expected Unregistered, got {other:?}"),
    }
}

fn init_with_kind(kind: &str, driver: &str) -> ConnectorInit {
    ConnectorInit {
        name: "x".to_string(),
        kind: kind.to_string(),
        driver: driver.to_string(),
        config: serde_json::Map::new(),
        options: serde_json::Map::new(),
    }
}

#[test]
fn builtin_registry_has_at_least_one_driver_per_kind() {
    let reg = builtin_registry();
    let entries = reg.list();
    for kind in ["db", "rest", "sftp", "smb", "mail", "archive"] {
        assert!(
            entries.iter().any(|e| e.starts_with(&format!("{kind}:"))),
            "expected at least one driver registered for kind `{kind}`, got {entries:?}"
        );
    }
}
