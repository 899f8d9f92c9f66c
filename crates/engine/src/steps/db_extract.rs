// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `db.extract` (§C): stream a query's result set to TSV/JSONL via an
//! atomic tmp-file + rename, raising `ReportTooLarge` once `rows_threshold`
//! is exceeded.
//!
//! Grounded in the original `DbExtract` builtin's "write to a temp path,
//! rename into place" pattern — the same shape `external.process`'s
//! `atomic_dir` idempotency strategy uses, applied here to a single file.

use std::io::Write;

use serde_json::{Map, Value};

use aetherflow_validate::Issue;

use crate::error::StepError;
use crate::registry::{Step, StepOutcome, StepRegistry, StepRunContext};

pub struct DbExtractStep;

const FORMATS: [&str; 2] = ["tsv", "jsonl"];

fn str_field(v: &Map<String, Value>, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn tsv_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\t', "\\t").replace('\n', "\\n")
}

fn scalar_to_tsv(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => tsv_escape(s),
        other => tsv_escape(&other.to_string()),
    }
}

impl Step for DbExtractStep {
    fn validate(&self, inputs: &Map<String, Value>, loc: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        if inputs.get("resource").and_then(Value::as_str).is_none() {
            issues.push(Issue::new("missing_input", format!("{loc}.inputs.resource"), "db.extract requires `resource`"));
        }
        if inputs.get("sql").and_then(Value::as_str).is_none() {
            issues.push(Issue::new("missing_input", format!("{loc}.inputs.sql"), "db.extract requires `sql`"));
        }
        if inputs.get("output_path").and_then(Value::as_str).is_none() {
            issues.push(Issue::new("missing_input", format!("{loc}.inputs.output_path"), "db.extract requires `output_path`"));
        }
        if let Some(fmt) = str_field(inputs, "format") {
            if !FORMATS.contains(&fmt.as_str()) {
                issues.push(Issue::new("invalid_input", format!("{loc}.inputs.format"), format!("`{fmt}` is not one of {FORMATS:?}")));
            }
        }
        issues
    }

    fn run(&self, inputs: &Map<String, Value>, ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        let resource = str_field(inputs, "resource").ok_or_else(|| StepError::MissingInput("resource".into()))?;
        let sql = str_field(inputs, "sql").ok_or_else(|| StepError::MissingInput("sql".into()))?;
        let output_path = str_field(inputs, "output_path").ok_or_else(|| StepError::MissingInput("output_path".into()))?;
        let format = str_field(inputs, "format").unwrap_or_else(|| "tsv".to_string());
        let rows_threshold = inputs.get("rows_threshold").and_then(Value::as_u64);
        let params: Vec<Value> = match inputs.get("params") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let handle = ctx.connectors.db(&resource)?;
        let db = handle.as_db().ok_or_else(|| StepError::InvalidInput { field: "resource".into(), msg: format!("`{resource}` is not a db connector") })?;
        let rows = db.query(&sql, &params)?;

        if let Some(threshold) = rows_threshold {
            if rows.len() as u64 > threshold {
                return Err(StepError::ReportTooLarge { rows: rows.len() as u64, threshold });
            }
        }

        let dest = ctx.resolve(&output_path)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = dest.with_extension(format!("{}.tmp", dest.extension().and_then(|e| e.to_str()).unwrap_or("part")));

        {
            let mut f = std::fs::File::create(&tmp)?;
            match format.as_str() {
                "jsonl" => {
                    for row in &rows {
                        serde_json::to_writer(&mut f, row)?;
                        f.write_all(b"\n")?;
                    }
                }
                _ => {
                    let mut columns: Vec<String> = Vec::new();
                    if let Some(first) = rows.first() {
                        columns = first.keys().cloned().collect();
                        writeln!(f, "{}", columns.join("\t"))?;
                    }
                    for row in &rows {
                        let line = columns.iter().map(|c| scalar_to_tsv(row.get(c).unwrap_or(&Value::Null))).collect::<Vec<_>>().join("\t");
                        writeln!(f, "{line}")?;
                    }
                }
            }
        }
        std::fs::rename(&tmp, &dest)?;

        let mut output = Map::new();
        output.insert("rows".to_string(), Value::from(rows.len() as u64));
        output.insert("output_path".to_string(), Value::String(dest.display().to_string()));
        Ok(StepOutcome::Success(output))
    }
}

#[cfg(test)]
#[path = "db_extract_tests.rs"]
mod tests;
