// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entrypoint-shared logic behind every CLI surface (§4.2 "a single
//! validation pipeline for every entrypoint (run / validate / doctor /
//! explain / scheduler)").
//!
//! `main.rs` and `bin/scheduler.rs` both call into this module rather than
//! duplicating the sequence of "load env → build settings → sync bundle
//! (maybe) → load flow → validate → execute", so a scheduled run and an
//! ad-hoc `aetherflow run` invocation can never drift apart.

use std::path::{Path, PathBuf};

use aetherflow_bundles::{bundle_status, sync_bundle, BundleStatus, BundleSyncResult};
use aetherflow_connectors::{builtin_registry as builtin_connector_registry, ConnectorRegistry, Connectors};
use aetherflow_core::{
    BundleManifestSpec, EnvFileSpec, EnvSnapshot, FlowSpec, ProfileSpec, Settings,
};
use aetherflow_engine::{
    build_env_snapshot, builtin_registry as builtin_step_registry, compiled_plugins, load_plugins,
    load_secrets_provider, run_flow, BundleInjection, LogRunObserver, RunDeps, RunObserver, RunOptions,
    RunSummary, StepRegistry,
};
use aetherflow_resolver::SecretsProvider;
use aetherflow_validate::{validate as run_validation, Report, StepTypeCatalog, ValidationInput};
use indexmap::IndexMap;

use crate::error::CliError;

/// Everything needed to validate or run a flow, assembled once per
/// invocation and threaded through every stage that needs it.
pub struct Engines {
    pub connector_registry: ConnectorRegistry,
    pub step_registry: StepRegistry,
    pub secrets: Option<Box<dyn SecretsProvider>>,
}

impl Engines {
    pub fn build(settings: &Settings) -> Result<Self, CliError> {
        let connector_registry = builtin_connector_registry();
        let step_registry = builtin_step_registry();
        load_plugins(
            &settings.plugin_paths,
            settings.plugin_strict,
            &compiled_plugins(),
            &step_registry,
            &connector_registry,
        )
        .map_err(|e| CliError::msg(e.to_string()))?;
        let secrets =
            load_secrets_provider(settings.secrets_module.as_deref(), settings.secrets_path.as_deref())
                .map_err(|e| CliError::msg(e.to_string()))?;
        Ok(Self { connector_registry, step_registry, secrets })
    }

    fn secrets_ref(&self) -> Option<&dyn SecretsProvider> {
        self.secrets.as_deref()
    }
}

/// Read + parse a flow YAML file, returning both the typed spec and the
/// raw text (the validation report embeds the raw text; §4.2 "Output").
pub fn read_flow(path: &Path) -> Result<(FlowSpec, String), CliError> {
    let raw = std::fs::read_to_string(path)?;
    let flow: FlowSpec = serde_yaml::from_str(&raw)?;
    Ok((flow, raw))
}

/// Load the `name -> ProfileSpec` map from exactly one of
/// `AETHERFLOW_PROFILES_FILE`/`AETHERFLOW_PROFILES_JSON` (§6 "Profiles
/// YAML"). Neither set means no profiles are available.
pub fn load_profiles(settings: &Settings) -> Result<IndexMap<String, ProfileSpec>, CliError> {
    match (&settings.profiles_file, &settings.profiles_json) {
        (Some(_), Some(_)) => {
            Err(CliError::msg("exactly one of AETHERFLOW_PROFILES_FILE or AETHERFLOW_PROFILES_JSON may be set"))
        }
        (Some(path), None) => {
            let raw = std::fs::read_to_string(path)?;
            let profiles: IndexMap<String, ProfileSpec> = serde_yaml::from_str(&raw)?;
            Ok(profiles)
        }
        (None, Some(json)) => {
            let profiles: IndexMap<String, ProfileSpec> = serde_json::from_str(json)?;
            Ok(profiles)
        }
        (None, None) => Ok(IndexMap::new()),
    }
}

/// Validate an already-parsed flow against the shared pipeline (§4.2).
/// `manifest_zip_drivers` is `Some` only when validating in the context of
/// a bundle manifest (stage 5, enterprise archive allowlist).
pub fn validate_flow(
    flow: &FlowSpec,
    flow_yaml: &str,
    env: &EnvSnapshot,
    settings: &Settings,
    catalog: &dyn StepTypeCatalog,
    manifest_zip_drivers: Option<&std::collections::HashSet<aetherflow_core::BundleArchiveDriver>>,
) -> Report {
    run_validation(ValidationInput { flow, flow_yaml, env, settings, catalog, manifest_zip_drivers })
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn manifest_env_files(manifest: &BundleManifestSpec) -> Vec<EnvFileSpec> {
    manifest
        .env_files
        .iter()
        .map(|path| EnvFileSpec { file_type: "dotenv".to_string(), path: path.clone(), optional: false, prefix: String::new() })
        .collect()
}

/// The outcome of resolving a flow file directly (no bundle): the parsed
/// flow plus the sealed env snapshot / settings it was resolved against.
pub struct ResolvedFlow {
    pub flow: FlowSpec,
    pub flow_yaml: String,
    pub env: EnvSnapshot,
    pub settings: Settings,
    pub manifest_zip_drivers: Option<std::collections::HashSet<aetherflow_core::BundleArchiveDriver>>,
}

/// Resolve a flow given directly by `--flow-yaml` (no bundle sync): build
/// the sealed env snapshot from the ambient process environment alone.
pub fn resolve_direct_flow(flow_yaml_path: &Path, engines: &Engines) -> Result<ResolvedFlow, CliError> {
    let ambient = EnvSnapshot::from_process_env();
    let base_dir = flow_yaml_path.parent().unwrap_or_else(|| Path::new("."));
    let env = build_env_snapshot(&ambient, &[], base_dir, None, engines.secrets_ref())
        .map_err(|e| CliError::msg(e.to_string()))?;
    let settings = Settings::from_env(&env);
    let (flow, flow_yaml) = read_flow(flow_yaml_path)?;
    Ok(ResolvedFlow { flow, flow_yaml, env, settings, manifest_zip_drivers: None })
}

/// Resolve a flow via a bundle manifest: sync the bundle, seal the env
/// snapshot with the bundle-injected keys, then load `entry_flow` out of
/// the freshly-materialized `active/` directory (§4.3 "Environment
/// snapshot", §4.4).
pub fn resolve_bundle_flow(
    manifest_path: &Path,
    allow_stale_bundle: bool,
    engines: &Engines,
) -> Result<(ResolvedFlow, BundleSyncResult), CliError> {
    let ambient = EnvSnapshot::from_process_env();
    let bootstrap_settings = Settings::from_env(&ambient);
    let manifest = aetherflow_bundles::load_manifest(manifest_path)?;

    let local_root = bootstrap_settings.work_root.join("bundles").join(&manifest.bundle.id);
    let sync_result = sync_bundle(
        &manifest,
        &local_root,
        &ambient,
        &bootstrap_settings,
        &engines.connector_registry,
        engines.secrets_ref(),
        allow_stale_bundle,
        &now_iso(),
    )?;

    let injection = BundleInjection {
        local_root_dir: Some(sync_result.local_root.display().to_string()),
        active_dir: Some(sync_result.active_dir.display().to_string()),
        cache_dir: Some(sync_result.cache_dir.display().to_string()),
        profiles_file: manifest
            .bundle
            .layout
            .profiles_file
            .as_ref()
            .map(|p| sync_result.active_dir.join(p).display().to_string()),
        plugin_paths: manifest
            .bundle
            .layout
            .plugins_dir
            .as_ref()
            .map(|p| sync_result.active_dir.join(p).display().to_string()),
        mode: manifest.mode.clone(),
        mode_enterprise: None,
    };

    let env_files = manifest_env_files(&manifest);
    let env = build_env_snapshot(&ambient, &env_files, &sync_result.active_dir, Some(&injection), engines.secrets_ref())
        .map_err(|e| CliError::msg(e.to_string()))?;
    let settings = Settings::from_env(&env);

    let flow_path = sync_result.active_dir.join(&manifest.bundle.entry_flow);
    let (flow, flow_yaml) = read_flow(&flow_path)?;

    Ok((
        ResolvedFlow { flow, flow_yaml, env, settings, manifest_zip_drivers: Some(manifest.zip_drivers.clone()) },
        sync_result,
    ))
}

/// `aetherflow run` (§6 CLI surface). Validates before executing a single
/// step — no alternate path exists (§4.2 "A run MUST invoke validation
/// before any step executes").
#[allow(clippy::too_many_arguments)]
pub fn run(resolved: &ResolvedFlow, engines: &Engines, run_id: Option<String>, flow_job: Option<String>) -> Result<RunSummary, CliError> {
    let report = validate_flow(
        &resolved.flow,
        &resolved.flow_yaml,
        &resolved.env,
        &resolved.settings,
        &engines.step_registry,
        resolved.manifest_zip_drivers.as_ref(),
    );
    if !report.ok {
        return Err(CliError::ValidationFailed);
    }

    let profiles = load_profiles(&resolved.settings)?;
    let observer: &dyn RunObserver = &LogRunObserver;
    let summary = run_flow(
        &resolved.flow,
        &profiles,
        &resolved.env,
        &resolved.settings,
        RunDeps {
            connector_registry: engines.connector_registry.clone(),
            step_registry: engines.step_registry.clone(),
            secrets: engines.secrets_ref(),
            observer,
        },
        RunOptions { run_id, flow_job },
    )?;
    Ok(summary)
}

/// `aetherflow validate` (§6, §4.2).
pub fn validate(flow_yaml_path: &Path, engines: &Engines) -> Result<Report, CliError> {
    let resolved = resolve_direct_flow(flow_yaml_path, engines)?;
    Ok(validate_flow(
        &resolved.flow,
        &resolved.flow_yaml,
        &resolved.env,
        &resolved.settings,
        &engines.step_registry,
        resolved.manifest_zip_drivers.as_ref(),
    ))
}

/// One resource's best-effort connectivity check for `aetherflow doctor`.
pub struct DoctorResourceCheck {
    pub name: String,
    pub kind: String,
    pub driver: String,
    pub ok: bool,
    pub error: Option<String>,
}

pub struct DoctorReport {
    pub report: Report,
    pub resources: Vec<DoctorResourceCheck>,
}

/// `aetherflow doctor`: validate, then best-effort-probe every declared
/// resource by constructing (and immediately closing) a live connector for
/// it — reporting failures rather than aborting (§C "Diagnostics CLI
/// surface").
pub fn doctor(flow_yaml_path: &Path, engines: &Engines) -> Result<DoctorReport, CliError> {
    let resolved = resolve_direct_flow(flow_yaml_path, engines)?;
    let report = validate_flow(
        &resolved.flow,
        &resolved.flow_yaml,
        &resolved.env,
        &resolved.settings,
        &engines.step_registry,
        resolved.manifest_zip_drivers.as_ref(),
    );

    let profiles = load_profiles(&resolved.settings)?;
    let materialized = aetherflow_engine::materialize_resources(
        &resolved.flow.resources,
        &profiles,
        &resolved.env,
        engines.secrets_ref(),
    );

    let mut resources = Vec::new();
    match materialized {
        Ok(materialized) => {
            let connectors = Connectors::new(engines.connector_registry.clone(), &materialized, &resolved.settings);
            for (name, spec) in &materialized {
                let result = connectors.get(&spec.kind, name, None);
                resources.push(DoctorResourceCheck {
                    name: name.clone(),
                    kind: spec.kind.clone(),
                    driver: spec.driver.clone(),
                    ok: result.is_ok(),
                    error: result.err().map(|e| e.to_string()),
                });
            }
            connectors.close_all();
        }
        Err(e) => {
            for (name, spec) in &resolved.flow.resources {
                resources.push(DoctorResourceCheck {
                    name: name.clone(),
                    kind: spec.kind.clone(),
                    driver: spec.driver.clone(),
                    ok: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(DoctorReport { report, resources })
}

/// One job's execution-plan entry for `aetherflow explain`.
pub struct ExplainJob {
    pub job_id: String,
    pub depends_on: Vec<String>,
    pub when: Option<String>,
    pub steps: Vec<(String, String)>,
}

pub struct ExplainReport {
    pub report: Report,
    pub jobs: Vec<ExplainJob>,
}

/// `aetherflow explain`: validate, then print the execution plan (job
/// order, gating predicates, step list) without running anything.
pub fn explain(flow_yaml_path: &Path, engines: &Engines) -> Result<ExplainReport, CliError> {
    let resolved = resolve_direct_flow(flow_yaml_path, engines)?;
    let report = validate_flow(
        &resolved.flow,
        &resolved.flow_yaml,
        &resolved.env,
        &resolved.settings,
        &engines.step_registry,
        resolved.manifest_zip_drivers.as_ref(),
    );
    let jobs = resolved
        .flow
        .jobs
        .iter()
        .map(|job| ExplainJob {
            job_id: job.id.clone(),
            depends_on: job.depends_on.clone(),
            when: job.when.clone(),
            steps: job.steps.iter().map(|s| (s.id.clone(), s.step_type.clone())).collect(),
        })
        .collect();
    Ok(ExplainReport { report, jobs })
}

/// `aetherflow bundle sync` (§6, §4.4).
pub fn bundle_sync(manifest_path: &Path, allow_stale_bundle: bool, engines: &Engines) -> Result<BundleSyncResult, CliError> {
    let (_, sync_result) = resolve_bundle_flow(manifest_path, allow_stale_bundle, engines)?;
    Ok(sync_result)
}

/// `aetherflow bundle status` (§6, §4.4): read-only, never fetches.
pub fn bundle_status_cmd(manifest_path: &Path, engines: &Engines) -> Result<BundleStatus, CliError> {
    let ambient = EnvSnapshot::from_process_env();
    let settings = Settings::from_env(&ambient);
    let manifest = aetherflow_bundles::load_manifest(manifest_path)?;
    let local_root = settings.work_root.join("bundles").join(&manifest.bundle.id);
    let status = bundle_status(&manifest, &local_root, &ambient, &settings, &engines.connector_registry, engines.secrets_ref())?;
    Ok(status)
}

/// Run a single flow file end to end given its own path, used by the
/// scheduler supervisor's dispatch closure (no CLI parsing involved).
pub fn run_scheduled_flow(flow_yaml_path: &Path, flow_job: Option<String>) -> Result<RunSummary, CliError> {
    let engines = Engines::build(&Settings::from_env(&EnvSnapshot::from_process_env()))?;
    let resolved = resolve_direct_flow(flow_yaml_path, &engines)?;
    run(&resolved, &engines, None, flow_job)
}

/// Run a bundle-backed flow end to end, used by the scheduler supervisor.
pub fn run_scheduled_bundle(manifest_path: &Path, allow_stale_bundle: bool, flow_job: Option<String>) -> Result<RunSummary, CliError> {
    let engines = Engines::build(&Settings::from_env(&EnvSnapshot::from_process_env()))?;
    let (resolved, _) = resolve_bundle_flow(manifest_path, allow_stale_bundle, &engines)?;
    run(&resolved, &engines, None, flow_job)
}

pub fn print_validation_text(path: &Path, report: &Report, out: &mut impl std::io::Write) {
    if report.ok {
        let _ = writeln!(out, "OK: {}", path.display());
    } else {
        let _ = writeln!(out, "INVALID: {}", path.display());
    }
    for issue in &report.errors {
        let _ = writeln!(out, "  [error] {} {}: {}", issue.code, issue.loc, issue.msg);
    }
    for issue in &report.warnings {
        let _ = writeln!(out, "  [warning] {} {}: {}", issue.code, issue.loc, issue.msg);
    }
}

/// Resolve a path relative to a base directory (`scheduler.yaml`'s own
/// directory), matching `aetherflow_engine::scheduler::resolve_relative`.
pub fn resolve_relative(base_dir: &Path, raw: &str) -> PathBuf {
    aetherflow_engine::scheduler::resolve_relative(base_dir, raw)
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
