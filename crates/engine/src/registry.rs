// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The step registry (§9 "registry polymorphism"): populated once via an
//! explicit `register(type, step)` call per built-in and plugin type, then
//! treated as read-only for the lifetime of the process — the same shape
//! `aetherflow_connectors::ConnectorRegistry` uses for connectors.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use aetherflow_connectors::Connectors;
use aetherflow_core::{EnvSnapshot, Settings};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::StepError;
use crate::sandbox::AllowedRoots;
use crate::state::StateStore;

/// What a step returns on success: either it completed with data (outputs
/// feed `jobs.<id>.outputs.*` once the StepSpec's own `outputs` template is
/// rendered against them) or it was skipped (e.g. `marker` idempotency
/// already satisfied, or a `db.extract` that found zero rows).
pub enum StepOutcome {
    Success(Map<String, Value>),
    Skipped { reason: String },
}

/// Everything a step needs beyond its already-rendered `inputs` (§4.3 step
/// runtime context item 2: `{env, steps, job.outputs, jobs, run_id,
/// flow_id, result}` plus the directories/connectors/state the built-ins
/// actually touch).
pub struct StepRunContext<'a> {
    pub run_id: &'a str,
    pub flow_id: &'a str,
    pub job_id: &'a str,
    pub step_id: &'a str,
    pub artifacts_dir: &'a Path,
    pub scratch_dir: &'a Path,
    pub manifests_dir: &'a Path,
    pub work_root: &'a Path,
    pub env: &'a EnvSnapshot,
    pub settings: &'a Settings,
    pub connectors: &'a Connectors<'a>,
    pub state: &'a dyn StateStore,
}

impl<'a> StepRunContext<'a> {
    pub fn allowed_roots(&self) -> AllowedRoots<'_> {
        AllowedRoots {
            artifacts_dir: self.artifacts_dir,
            work_root: if self.settings.mode.is_enterprise() { None } else { Some(self.work_root) },
        }
    }

    pub fn resolve(&self, user_path: &str) -> Result<std::path::PathBuf, StepError> {
        crate::sandbox::resolve_path(user_path, &self.allowed_roots(), self.settings.strict_sandbox)
    }
}

/// A built-in or plugin-registered step type (§4.3 "validate() then run()").
pub trait Step: Send + Sync {
    /// Step-specific semantic checks beyond "is this type registered"
    /// (validator stage 6). Returns validation issues, not a `Result`,
    /// mirroring `aetherflow_validate::StepTypeCatalog::validate_step`.
    fn validate(&self, inputs: &Map<String, Value>, loc: &str) -> Vec<aetherflow_validate::Issue>;

    /// Execute against already-rendered `inputs`. `registry` is handed in
    /// so `with_lock` can dispatch straight to its wrapped step without
    /// re-entering the template/validator pipeline (§9 Open Question).
    fn run(&self, inputs: &Map<String, Value>, ctx: &StepRunContext, registry: &StepRegistry) -> Result<StepOutcome, StepError>;
}

#[derive(Clone)]
pub struct StepRegistry {
    items: Arc<RwLock<HashMap<String, Arc<dyn Step>>>>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self { items: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn register(&self, step_type: impl Into<String>, step: Arc<dyn Step>) {
        self.items.write().insert(step_type.into(), step);
    }

    pub fn get(&self, step_type: &str) -> Option<Arc<dyn Step>> {
        self.items.read().get(step_type).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        let mut out: Vec<String> = self.items.read().keys().cloned().collect();
        out.sort();
        out
    }
}

impl aetherflow_validate::StepTypeCatalog for StepRegistry {
    fn is_registered(&self, step_type: &str) -> bool {
        self.items.read().contains_key(step_type)
    }

    fn validate_step(&self, step: &aetherflow_core::StepSpec, loc: &str) -> Vec<aetherflow_validate::Issue> {
        match self.get(&step.step_type) {
            Some(s) => s.validate(&step.inputs, loc),
            None => Vec::new(),
        }
    }
}

/// A registry with the reference step catalog preloaded (§C "Built-in
/// steps"). Plugin-supplied types register into the same registry via the
/// plugin loader (`crate::plugins`).
pub fn builtin_registry() -> StepRegistry {
    let reg = StepRegistry::new();
    reg.register("external.process", Arc::new(crate::steps::external_process::ExternalProcessStep));
    reg.register("db.extract", Arc::new(crate::steps::db_extract::DbExtractStep));
    reg.register("fs.zip", Arc::new(crate::steps::archive::ZipStep));
    reg.register("fs.unzip", Arc::new(crate::steps::archive::UnzipStep));
    reg.register("transfer.upload", Arc::new(crate::steps::transfer::UploadStep));
    reg.register("transfer.download", Arc::new(crate::steps::transfer::DownloadStep));
    reg.register("with_lock", Arc::new(crate::steps::with_lock::WithLockStep));
    reg
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
