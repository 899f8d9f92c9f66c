// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run context construction (§3 "RunContext"): the sealed environment
//! snapshot, resource materialization (profile deep-merge → render →
//! decode), and the job directory layout every step executes under.

use std::path::{Path, PathBuf};

use aetherflow_core::{EnvFileSpec, EnvSnapshot, ProfileSpec, ResourceSpec, WorkspaceSpec};
use aetherflow_resolver::{
    collect_decode_requests, render_value, DecodeRequest, RenderCtx, Section, SecretsProvider,
    RESOURCE_ALLOWED_ROOTS,
};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::StepError;

// ---------------------------------------------------------------------
// Environment snapshot
// ---------------------------------------------------------------------

/// Env keys the bundle synchronizer injects into a run's snapshot once a
/// manifest-driven sync has completed (§4.3 "Environment snapshot",
/// §6 "Runtime-injected by bundle sync").
#[derive(Debug, Clone, Default)]
pub struct BundleInjection {
    pub local_root_dir: Option<String>,
    pub active_dir: Option<String>,
    pub cache_dir: Option<String>,
    pub profiles_file: Option<String>,
    pub plugin_paths: Option<String>,
    pub mode: Option<String>,
    pub mode_enterprise: Option<String>,
}

fn is_truthy_str(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl BundleInjection {
    fn is_enterprise(&self) -> bool {
        self.mode.as_deref() == Some("enterprise") || self.mode_enterprise.as_deref().map(is_truthy_str).unwrap_or(false)
    }

    fn as_overrides(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut push = |key: &str, value: &Option<String>| {
            if let Some(v) = value {
                out.push((key.to_string(), v.clone()));
            }
        };
        push("AETHERFLOW_LOCAL_ROOT_DIR", &self.local_root_dir);
        push("AETHERFLOW_ACTIVE_DIR", &self.active_dir);
        push("AETHERFLOW_CACHE_DIR", &self.cache_dir);
        push("AETHERFLOW_PROFILES_FILE", &self.profiles_file);
        push("AETHERFLOW_PLUGIN_PATHS", &self.plugin_paths);
        push("AETHERFLOW_MODE", &self.mode);
        push("AETHERFLOW_MODE_ENTERPRISE", &self.mode_enterprise);
        out
    }
}

/// Build the sealed environment snapshot for a run: ambient process env,
/// then declared `env_files` (later files override earlier ones), then
/// bundle-injected keys, then the secrets module's `expand_env` if it
/// supplies one.
///
/// In enterprise mode, ambient `AETHERFLOW_PLUGIN_PATHS` and
/// `AETHERFLOW_STRICT_SANDBOX` are dropped before the bundle's override is
/// applied — only manifest-declared plugin paths are trusted, and the
/// sandbox cannot be disabled, once a bundle runs in enterprise mode.
pub fn build_env_snapshot(
    ambient: &EnvSnapshot,
    env_files: &[EnvFileSpec],
    env_files_base_dir: &Path,
    bundle: Option<&BundleInjection>,
    secrets: Option<&dyn SecretsProvider>,
) -> Result<EnvSnapshot, StepError> {
    let file_overlay = crate::env::load_env_files(env_files, env_files_base_dir)?;
    let mut snapshot = ambient.with_overrides(file_overlay);

    if let Some(bundle) = bundle {
        if bundle.is_enterprise() {
            snapshot = snapshot.without_keys(&["AETHERFLOW_PLUGIN_PATHS", "AETHERFLOW_STRICT_SANDBOX"]);
        }
        snapshot = snapshot.with_overrides(bundle.as_overrides());
    }

    if let Some(provider) = secrets {
        if let Some(expanded) = provider.expand_env(&snapshot) {
            snapshot = expanded;
        }
    }

    Ok(snapshot)
}

// ---------------------------------------------------------------------
// Resource materialization
// ---------------------------------------------------------------------

fn env_roots(env: &EnvSnapshot) -> serde_json::Map<String, Value> {
    let mut env_root = serde_json::Map::new();
    for (k, v) in env.iter() {
        env_root.insert(k.clone(), Value::String(v.clone()));
    }
    let mut roots = serde_json::Map::new();
    roots.insert("env".to_string(), Value::Object(env_root));
    roots
}

/// Deep-merge two JSON object trees; `overlay` wins at every leaf it
/// defines, `base` supplies everything else (§3 "ProfileSpec ... deep
/// merge; resource wins").
fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(b), Value::Object(o)) => {
            let mut out = b.clone();
            for (k, v) in o {
                let merged = match out.get(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v.clone(),
                };
                out.insert(k.clone(), merged);
            }
            Value::Object(out)
        }
        (_, overlay) => overlay.clone(),
    }
}

fn as_object(v: Value) -> serde_json::Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => serde_json::Map::new(),
    }
}

/// Union two decode specs path-wise, profile first so a resource-declared
/// target with the same `(section, path)` isn't duplicated.
fn union_decode_requests(profile: &Value, resource: &Value) -> Vec<DecodeRequest> {
    let mut out = collect_decode_requests(profile);
    for req in collect_decode_requests(resource) {
        if !out.contains(&req) {
            out.push(req);
        }
    }
    out
}

fn apply_decode(resource: &mut ResourceSpec, requests: &[DecodeRequest], provider: &dyn SecretsProvider) -> Result<(), StepError> {
    for req in requests {
        let target = match req.section {
            Section::Config => &mut resource.config,
            Section::Options => &mut resource.options,
        };
        if let Some(Value::String(s)) = target.get(&req.path).cloned() {
            let decoded = provider
                .decode(&s)
                .map_err(|e| StepError::Other(format!("decode failed for {}: {e}", req.path)))?;
            target.insert(req.path.clone(), Value::String(decoded));
        }
    }
    Ok(())
}

/// Resolve a flow's resources against its declared profiles (§4.3
/// "Resource materialization"): deep-merge profile under resource, render
/// against the sealed env snapshot (env-only scope), union decode targets,
/// then decode.
pub fn materialize_resources(
    resources: &IndexMap<String, ResourceSpec>,
    profiles: &IndexMap<String, ProfileSpec>,
    env: &EnvSnapshot,
    secrets: Option<&dyn SecretsProvider>,
) -> Result<IndexMap<String, ResourceSpec>, StepError> {
    let roots = env_roots(env);
    let ctx = RenderCtx { roots: &roots, allowed_roots: RESOURCE_ALLOWED_ROOTS };

    let mut out = IndexMap::new();
    for (name, spec) in resources {
        let mut merged = spec.clone();
        let mut decode_requests = collect_decode_requests(&spec.decode.0);

        if let Some(profile_name) = &spec.profile {
            let profile = profiles.get(profile_name).ok_or_else(|| StepError::InvalidInput {
                field: "profile".to_string(),
                msg: format!("resource `{name}` references unknown profile `{profile_name}`"),
            })?;
            merged.config = as_object(deep_merge(&Value::Object(profile.config.clone()), &Value::Object(spec.config.clone())));
            merged.options =
                as_object(deep_merge(&Value::Object(profile.options.clone()), &Value::Object(spec.options.clone())));
            decode_requests = union_decode_requests(&profile.decode.0, &spec.decode.0);
        }

        merged.config = as_object(render_value(&Value::Object(merged.config.clone()), &ctx)?);
        merged.options = as_object(render_value(&Value::Object(merged.options.clone()), &ctx)?);

        if let Some(provider) = secrets {
            apply_decode(&mut merged, &decode_requests, provider)?;
        } else if !decode_requests.is_empty() {
            tracing::warn!(
                resource = %name,
                "decode targets declared but no secrets module configured; leaving rendered values unchanged"
            );
        }

        out.insert(name.clone(), merged);
    }
    Ok(out)
}

// ---------------------------------------------------------------------
// Job directory layout
// ---------------------------------------------------------------------

/// The per-job directory tree a run executes under (§3 "Derived
/// directories: job_dir = work_root/flow_id/job_id/run_id").
pub struct JobDirs {
    pub job_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub manifests_dir: PathBuf,
}

fn layout_child(job_dir: &Path, layout: &WorkspaceSpec, key: &str, default: &str) -> PathBuf {
    job_dir.join(layout.layout.get(key).map(String::as_str).unwrap_or(default))
}

/// Create `work_root/flow_id/job_id/run_id` and its `artifacts`/`scratch`/
/// `manifests` children (names taken from `WorkspaceSpec.layout`).
pub fn create_job_dirs(
    work_root: &Path,
    flow_id: &str,
    job_id: &str,
    run_id: &str,
    layout: &WorkspaceSpec,
) -> Result<JobDirs, StepError> {
    let job_dir = work_root.join(flow_id).join(job_id).join(run_id);
    let artifacts_dir = layout_child(&job_dir, layout, "artifacts", "artifacts");
    let scratch_dir = layout_child(&job_dir, layout, "scratch", "scratch");
    let manifests_dir = layout_child(&job_dir, layout, "manifests", "manifests");
    for dir in [&artifacts_dir, &scratch_dir, &manifests_dir] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(JobDirs { job_dir, artifacts_dir, scratch_dir, manifests_dir })
}

/// Remove a job's directory tree per `cleanup_policy` (§4.3 "Cleanup policy").
pub fn cleanup_job_dir(job_dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(job_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
