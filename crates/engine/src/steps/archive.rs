// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fs.zip` / `fs.unzip` (§C): archive connector-backed steps, one
//! `Step` impl per direction sharing the `resource` lookup + path
//! resolution pattern the transfer steps also use.

use serde_json::{Map, Value};

use aetherflow_validate::Issue;

use crate::error::StepError;
use crate::registry::{Step, StepOutcome, StepRegistry, StepRunContext};

fn str_field(v: &Map<String, Value>, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn require_fields(inputs: &Map<String, Value>, loc: &str, fields: &[&str], step_type: &str) -> Vec<Issue> {
    fields
        .iter()
        .filter(|f| inputs.get(**f).is_none())
        .map(|f| Issue::new("missing_input", format!("{loc}.inputs.{f}"), format!("{step_type} requires `{f}`")))
        .collect()
}

pub struct ZipStep;

impl Step for ZipStep {
    fn validate(&self, inputs: &Map<String, Value>, loc: &str) -> Vec<Issue> {
        require_fields(inputs, loc, &["resource", "src_dir", "dest_zip"], "fs.zip")
    }

    fn run(&self, inputs: &Map<String, Value>, ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        let resource = str_field(inputs, "resource").ok_or_else(|| StepError::MissingInput("resource".into()))?;
        let src_dir = ctx.resolve(&str_field(inputs, "src_dir").ok_or_else(|| StepError::MissingInput("src_dir".into()))?)?;
        let dest_zip = ctx.resolve(&str_field(inputs, "dest_zip").ok_or_else(|| StepError::MissingInput("dest_zip".into()))?)?;

        let handle = ctx.connectors.archive(&resource)?;
        let archive = handle.as_archive().ok_or_else(|| StepError::InvalidInput { field: "resource".into(), msg: format!("`{resource}` is not an archive connector") })?;
        archive.zip(&src_dir, &dest_zip)?;

        let mut output = Map::new();
        output.insert("dest_zip".to_string(), Value::String(dest_zip.display().to_string()));
        Ok(StepOutcome::Success(output))
    }
}

pub struct UnzipStep;

impl Step for UnzipStep {
    fn validate(&self, inputs: &Map<String, Value>, loc: &str) -> Vec<Issue> {
        require_fields(inputs, loc, &["resource", "src_zip", "dest_dir"], "fs.unzip")
    }

    fn run(&self, inputs: &Map<String, Value>, ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        let resource = str_field(inputs, "resource").ok_or_else(|| StepError::MissingInput("resource".into()))?;
        let src_zip = ctx.resolve(&str_field(inputs, "src_zip").ok_or_else(|| StepError::MissingInput("src_zip".into()))?)?;
        let dest_dir = ctx.resolve(&str_field(inputs, "dest_dir").ok_or_else(|| StepError::MissingInput("dest_dir".into()))?)?;

        let handle = ctx.connectors.archive(&resource)?;
        let archive = handle.as_archive().ok_or_else(|| StepError::InvalidInput { field: "resource".into(), msg: format!("`{resource}` is not an archive connector") })?;
        archive.unzip(&src_zip, &dest_dir)?;

        let mut output = Map::new();
        output.insert("dest_dir".to_string(), Value::String(dest_dir.display().to_string()));
        Ok(StepOutcome::Success(output))
    }
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
