// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single validation pipeline invoked from every entrypoint (§4.2).
//!
//! Stage order matches the spec: schema (handled by the caller via serde
//! before this runs) → structural semantic → template scan → resource
//! decode-concat scan → enterprise archive-allowlist scan → step-specific
//! semantic.

use std::collections::{HashMap, HashSet};

use aetherflow_core::{BundleArchiveDriver, EnvSnapshot, FlowSpec, JobSpec, Settings};
use aetherflow_resolver::{self as resolver, Section};
use serde_json::Value;

use crate::report::{Issue, Report};
use crate::step_catalog::StepTypeCatalog;
use crate::when_ast;

pub struct ValidationInput<'a> {
    pub flow: &'a FlowSpec,
    pub flow_yaml: &'a str,
    pub env: &'a EnvSnapshot,
    pub settings: &'a Settings,
    pub catalog: &'a dyn StepTypeCatalog,
    /// Present only when validating in the context of a bundle manifest
    /// (§4.2 stage 5 only applies then).
    pub manifest_zip_drivers: Option<&'a HashSet<BundleArchiveDriver>>,
}

pub fn validate(input: ValidationInput) -> Report {
    let mut report = Report::new(input.flow_yaml);

    structural_semantic(input.flow, &mut report);
    template_scan(input.flow, input.env, input.settings, &mut report);
    decode_concat_scan(input.flow, &mut report);
    enterprise_archive_scan(input.flow, input.settings, input.manifest_zip_drivers, &mut report);
    step_specific_semantic(input.flow, input.catalog, &mut report);

    report
}

// ---------------------------------------------------------------------
// Stage 2: structural semantic
// ---------------------------------------------------------------------

fn structural_semantic(flow: &FlowSpec, report: &mut Report) {
    let mut seen_jobs: HashSet<&str> = HashSet::new();
    let mut prior_jobs: HashSet<&str> = HashSet::new();

    for (i, job) in flow.jobs.iter().enumerate() {
        let loc = format!("jobs[{i}]");
        if !seen_jobs.insert(job.id.as_str()) {
            report.push_error(Issue::new("E_DUP_JOB_ID", &loc, format!("duplicate job id `{}`", job.id)));
        }

        for dep in &job.depends_on {
            if !prior_jobs.contains(dep.as_str()) {
                report.push_error(Issue::new(
                    "E_FORWARD_DEPENDS_ON",
                    format!("{loc}.depends_on"),
                    format!("job `{}` depends_on `{dep}` which is not a prior job in declaration order", job.id),
                ));
            }
        }

        if let Some(when) = &job.when {
            if let Err(e) = when_ast::parse(when) {
                report.push_error(Issue::new("E_WHEN_AST", format!("{loc}.when"), e.to_string()));
            }
        }

        validate_job_steps(job, &loc, report);

        prior_jobs.insert(job.id.as_str());
    }
}

fn validate_job_steps(job: &JobSpec, job_loc: &str, report: &mut Report) {
    let mut seen_steps: HashSet<&str> = HashSet::new();
    for (i, step) in job.steps.iter().enumerate() {
        let loc = format!("{job_loc}.steps[{i}]");
        if !seen_steps.insert(step.id.as_str()) {
            report.push_error(Issue::new(
                "E_DUP_STEP_ID",
                &loc,
                format!("duplicate step id `{}` within job `{}`", step.id, job.id),
            ));
        }
    }
}

// ---------------------------------------------------------------------
// Stage 3: template scan
// ---------------------------------------------------------------------

fn template_scan(flow: &FlowSpec, env: &EnvSnapshot, settings: &Settings, report: &mut Report) {
    for (name, resource) in &flow.resources {
        let loc = format!("resources.{name}");
        scan_templated_value(
            &Value::Object(resource.config.clone()),
            resolver::RESOURCE_ALLOWED_ROOTS,
            env,
            settings,
            &format!("{loc}.config"),
            report,
        );
        scan_templated_value(
            &Value::Object(resource.options.clone()),
            resolver::RESOURCE_ALLOWED_ROOTS,
            env,
            settings,
            &format!("{loc}.options"),
            report,
        );
    }

    scan_templated_value(
        &Value::String(flow.flow.workspace.root.clone()),
        resolver::RESOURCE_ALLOWED_ROOTS,
        env,
        settings,
        "flow.workspace.root",
        report,
    );

    for (ji, job) in flow.jobs.iter().enumerate() {
        for (si, step) in job.steps.iter().enumerate() {
            let loc = format!("jobs[{ji}].steps[{si}]");
            scan_templated_value(
                &Value::Object(step.inputs.clone()),
                resolver::STEP_ALLOWED_ROOTS,
                env,
                settings,
                &format!("{loc}.inputs"),
                report,
            );
            scan_templated_value(
                &Value::Object(step.outputs.clone()),
                resolver::STEP_ALLOWED_ROOTS,
                env,
                settings,
                &format!("{loc}.outputs"),
                report,
            );
        }
    }
}

fn scan_templated_value(
    value: &Value,
    allowed_roots: &[&str],
    env: &EnvSnapshot,
    settings: &Settings,
    loc: &str,
    report: &mut Report,
) {
    match value {
        Value::String(s) => scan_templated_string(s, allowed_roots, env, settings, loc, report),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                scan_templated_value(item, allowed_roots, env, settings, &format!("{loc}[{i}]"), report);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                scan_templated_value(v, allowed_roots, env, settings, &format!("{loc}.{k}"), report);
            }
        }
        _ => {}
    }
}

fn scan_templated_string(
    s: &str,
    allowed_roots: &[&str],
    env: &EnvSnapshot,
    settings: &Settings,
    loc: &str,
    report: &mut Report,
) {
    let tokens = match resolver::scan(s) {
        Ok(t) => t,
        Err(e) => {
            report.push_error(Issue::new("E_TEMPLATE_SYNTAX", loc, e.to_string()));
            return;
        }
    };

    for token in tokens {
        let root = token.path.split('.').next().unwrap_or_default();
        if !allowed_roots.contains(&root) {
            report.push_error(Issue::new(
                "E_TEMPLATE_UNKNOWN_ROOT",
                loc,
                format!("unknown template root `{root}` (allowed: {})", allowed_roots.join(", ")),
            ));
            continue;
        }
        if root == "env" && token.default.is_none() {
            let key = token.path.strip_prefix("env.").unwrap_or(&token.path);
            let missing = env.get(key).map(|v| v.is_empty()).unwrap_or(true);
            if missing {
                let issue = Issue::new(
                    "MISSING_ENV",
                    loc,
                    format!("referenced env key `{key}` is not set"),
                );
                if settings.validate_env_strict {
                    report.push_error(issue);
                } else {
                    report.push_warning(issue);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------
// Stage 4: resource decode-concat scan
// ---------------------------------------------------------------------

fn decode_concat_scan(flow: &FlowSpec, report: &mut Report) {
    for (name, resource) in &flow.resources {
        let loc = format!("resources.{name}.decode");
        let requests = resolver::collect_decode_requests(&resource.decode.0);
        for req in requests {
            let section_map = match req.section {
                Section::Config => &resource.config,
                Section::Options => &resource.options,
            };
            let raw = dotted_lookup(&Value::Object(section_map.clone()), &req.path);
            if let Some(raw) = raw {
                if let Err(e) = resolver::check_standalone_raw(&raw) {
                    report.push_error(Issue::new(
                        "E_DECODE_CONCAT",
                        format!("{loc}.{}.{}", req.section.as_str(), req.path),
                        e.to_string(),
                    ));
                }
            }
        }
    }
}

fn dotted_lookup(value: &Value, path: &str) -> Option<Value> {
    let mut cur = value;
    for seg in path.split('.') {
        cur = cur.get(seg)?;
    }
    Some(cur.clone())
}

// ---------------------------------------------------------------------
// Stage 5: enterprise archive allowlist scan
// ---------------------------------------------------------------------

fn enterprise_archive_scan(
    flow: &FlowSpec,
    settings: &Settings,
    zip_drivers: Option<&HashSet<BundleArchiveDriver>>,
    report: &mut Report,
) {
    if !settings.mode.is_enterprise() {
        return;
    }
    let Some(allowed) = zip_drivers else {
        return;
    };
    for (name, resource) in &flow.resources {
        if resource.kind != "archive" {
            continue;
        }
        let driver_allowed = match resource.driver.as_str() {
            "pyzipper" => allowed.contains(&BundleArchiveDriver::Pyzipper),
            "zipfile" => allowed.contains(&BundleArchiveDriver::Zipfile),
            "os" => allowed.contains(&BundleArchiveDriver::Os),
            "external" => allowed.contains(&BundleArchiveDriver::External),
            _ => false,
        };
        if !driver_allowed {
            report.push_error(Issue::new(
                "E_ENTERPRISE_ARCHIVE_DRIVER",
                format!("resources.{name}.driver"),
                format!("driver `{}` is not in the manifest zip_drivers allowlist under enterprise mode", resource.driver),
            ));
        }
    }
}

// ---------------------------------------------------------------------
// Stage 6: step-specific semantic
// ---------------------------------------------------------------------

fn step_specific_semantic(flow: &FlowSpec, catalog: &dyn StepTypeCatalog, report: &mut Report) {
    for (ji, job) in flow.jobs.iter().enumerate() {
        for (si, step) in job.steps.iter().enumerate() {
            let loc = format!("jobs[{ji}].steps[{si}]");
            if !catalog.is_registered(&step.step_type) {
                report.push_error(Issue::new(
                    "E_UNKNOWN_STEP_TYPE",
                    format!("{loc}.type"),
                    format!("step type `{}` is not registered", step.step_type),
                ));
                continue;
            }
            for issue in catalog.validate_step(step, &loc) {
                report.push_error(issue);
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
