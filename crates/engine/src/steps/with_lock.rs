// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `with_lock` (§9 Open Question): a meta-step that acquires a TTL lock
//! from the state store's `locks` table, runs a nested step, and releases
//! the lock on every exit path.
//!
//! The inner step's `type`/`inputs` are plain JSON nested under this
//! step's own already-rendered `inputs.step` — dispatch goes straight to
//! the registry rather than re-entering the template/validator pipeline,
//! per the spec's own resolution of this open question.

use serde_json::{Map, Value};

use aetherflow_validate::Issue;

use crate::error::StepError;
use crate::registry::{Step, StepOutcome, StepRegistry, StepRunContext};

fn str_field(v: &Map<String, Value>, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct WithLockStep;

impl Step for WithLockStep {
    fn validate(&self, inputs: &Map<String, Value>, loc: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        if inputs.get("key").and_then(Value::as_str).is_none() {
            issues.push(Issue::new("missing_input", format!("{loc}.inputs.key"), "with_lock requires `key`"));
        }
        match inputs.get("step") {
            Some(Value::Object(inner)) => {
                if inner.get("type").and_then(Value::as_str).is_none() {
                    issues.push(Issue::new("missing_input", format!("{loc}.inputs.step.type"), "with_lock's nested step requires `type`"));
                }
            }
            _ => issues.push(Issue::new("missing_input", format!("{loc}.inputs.step"), "with_lock requires a nested `step` object")),
        }
        issues
    }

    fn run(&self, inputs: &Map<String, Value>, ctx: &StepRunContext, registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        let key = str_field(inputs, "key").ok_or_else(|| StepError::MissingInput("key".into()))?;
        let ttl_seconds = inputs.get("ttl_seconds").and_then(Value::as_u64).unwrap_or(3600);
        let owner = str_field(inputs, "owner").unwrap_or_else(|| format!("{}/{}", ctx.job_id, ctx.step_id));

        let inner = inputs
            .get("step")
            .and_then(Value::as_object)
            .ok_or_else(|| StepError::MissingInput("step".into()))?;
        let inner_type = str_field(inner, "type").ok_or_else(|| StepError::MissingInput("step.type".into()))?;
        let inner_inputs = inner.get("inputs").and_then(Value::as_object).cloned().unwrap_or_default();

        let acquired = ctx.state.try_acquire_lock(&key, &owner, ttl_seconds, now_unix())?;
        if !acquired {
            return Err(StepError::LockUnavailable(key));
        }

        let inner_step = registry
            .get(&inner_type)
            .ok_or_else(|| StepError::InvalidInput { field: "step.type".into(), msg: format!("unregistered step type `{inner_type}`") })?;

        let result = inner_step.run(&inner_inputs, ctx, registry);
        ctx.state.release_lock(&key, &owner)?;
        result
    }
}

#[cfg(test)]
#[path = "with_lock_tests.rs"]
mod tests;
