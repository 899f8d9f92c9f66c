// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry + factory keyed by `(kind, driver)` (§4.5 "Connector registry").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::base::{ConnectorHandle, ConnectorInit};
use crate::error::ConnectorError;

type Factory = Arc<dyn Fn(ConnectorInit) -> Result<ConnectorHandle, ConnectorError> + Send + Sync>;

#[derive(Clone)]
pub struct ConnectorRegistry {
    items: Arc<RwLock<HashMap<(String, String), Factory>>>,
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self { items: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn register<F>(&self, kind: impl Into<String>, driver: impl Into<String>, factory: F)
    where
        F: Fn(ConnectorInit) -> Result<ConnectorHandle, ConnectorError> + Send + Sync + 'static,
    {
        self.items.write().insert((kind.into(), driver.into()), Arc::new(factory));
    }

    pub fn list(&self) -> Vec<String> {
        let mut out: Vec<String> = self.items.read().keys().map(|(k, d)| format!("{k}:{d}")).collect();
        out.sort();
        out
    }

    pub fn create(&self, init: ConnectorInit) -> Result<ConnectorHandle, ConnectorError> {
        let key = (init.kind.clone(), init.driver.clone());
        let factory = {
            let guard = self.items.read();
            guard.get(&key).cloned()
        };
        match factory {
            Some(f) => f(init),
            None => Err(ConnectorError::Unregistered { kind: key.0, driver: key.1, loaded: self.list() }),
        }
    }
}

/// Builds a registry with the built-in reference drivers preloaded
/// (§4.5 "at least one driver per kind"). Plugin-supplied drivers register
/// into the same registry via the plugin loader (see `aetherflow-engine`).
pub fn builtin_registry() -> ConnectorRegistry {
    let reg = ConnectorRegistry::new();
    crate::drivers::db::register(&reg);
    crate::drivers::rest::register(&reg);
    crate::drivers::archive::register(&reg);
    crate::drivers::sftp::register(&reg);
    crate::drivers::smb::register(&reg);
    crate::drivers::mail::register(&reg);
    reg
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
