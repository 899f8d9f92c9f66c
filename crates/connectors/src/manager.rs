// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-run connector accessor (§4.5 "Cache policies").
//!
//! Caching policy precedence, highest first:
//!   1. an explicit `cache` argument to a single `get()` call
//!   2. `Settings.connector_cache_disabled` forcing `none`
//!   3. the resource's own `cache`/`options.cache` field
//!   4. `Settings.connector_cache_default`

use std::collections::HashMap;

use aetherflow_core::{CachePolicy, ResourceSpec, Settings};
use parking_lot::Mutex;
use tracing::warn;

use crate::base::{ConnectorHandle, ConnectorInit};
use crate::error::ConnectorError;
use crate::registry::ConnectorRegistry;

type CacheKey = (String, String, String);

static PROCESS_CACHE: std::sync::LazyLock<Mutex<HashMap<CacheKey, ConnectorHandle>>> =
    std::sync::LazyLock::new(|| Mutex::new(HashMap::new()));

pub struct Connectors<'a> {
    registry: ConnectorRegistry,
    resources: &'a indexmap::IndexMap<String, ResourceSpec>,
    settings: &'a Settings,
    run_cache: Mutex<HashMap<CacheKey, ConnectorHandle>>,
}

impl<'a> Connectors<'a> {
    pub fn new(registry: ConnectorRegistry, resources: &'a indexmap::IndexMap<String, ResourceSpec>, settings: &'a Settings) -> Self {
        Self { registry, resources, settings, run_cache: Mutex::new(HashMap::new()) }
    }

    fn policy_for(&self, resource: &ResourceSpec, cache: Option<CachePolicy>) -> CachePolicy {
        if let Some(c) = cache {
            return c;
        }
        if self.settings.connector_cache_disabled {
            return CachePolicy::None;
        }
        let from_options = resource.options.get("cache").and_then(|v| v.as_str());
        match from_options {
            Some("process") => CachePolicy::Process,
            Some("none") => CachePolicy::None,
            Some("run") => CachePolicy::Run,
            _ => self.settings.connector_cache_default,
        }
    }

    pub fn get(&self, kind: &str, name: &str, cache: Option<CachePolicy>) -> Result<ConnectorHandle, ConnectorError> {
        let resource = self.resources.get(name).ok_or_else(|| ConnectorError::UnknownResource {
            name: name.to_string(),
            known: self.resources.keys().cloned().collect(),
        })?;
        if resource.kind != kind {
            return Err(ConnectorError::KindMismatch {
                name: name.to_string(),
                actual: resource.kind.clone(),
                requested: kind.to_string(),
            });
        }

        let policy = self.policy_for(resource, cache);
        let key = (kind.to_string(), resource.driver.clone(), name.to_string());

        let build = || {
            self.registry.create(ConnectorInit {
                name: name.to_string(),
                kind: kind.to_string(),
                driver: resource.driver.clone(),
                config: resource.config.clone(),
                options: resource.options.clone(),
            })
        };

        match policy {
            CachePolicy::None => build(),
            CachePolicy::Process => {
                let mut cache = PROCESS_CACHE.lock();
                if let Some(c) = cache.get(&key) {
                    return Ok(c.clone());
                }
                let inst = build()?;
                cache.insert(key, inst.clone());
                Ok(inst)
            }
            CachePolicy::Run => {
                let mut cache = self.run_cache.lock();
                if let Some(c) = cache.get(&key) {
                    return Ok(c.clone());
                }
                let inst = build()?;
                cache.insert(key, inst.clone());
                Ok(inst)
            }
        }
    }

    pub fn db(&self, name: &str) -> Result<ConnectorHandle, ConnectorError> {
        self.get("db", name, None)
    }

    pub fn rest(&self, name: &str) -> Result<ConnectorHandle, ConnectorError> {
        self.get("rest", name, None)
    }

    pub fn sftp(&self, name: &str) -> Result<ConnectorHandle, ConnectorError> {
        self.get("sftp", name, None)
    }

    pub fn smb(&self, name: &str) -> Result<ConnectorHandle, ConnectorError> {
        self.get("smb", name, None)
    }

    pub fn mail(&self, name: &str) -> Result<ConnectorHandle, ConnectorError> {
        self.get("mail", name, None)
    }

    pub fn archive(&self, name: &str) -> Result<ConnectorHandle, ConnectorError> {
        self.get("archive", name, None)
    }

    /// Close run-scoped connectors; process-scoped ones outlive the run.
    pub fn close_all(&self) {
        let mut cache = self.run_cache.lock();
        for (_, conn) in cache.drain() {
            if let Err(e) = conn.close() {
                warn!(error = %e, "connector close failed; continuing");
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
