// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap resource materialization for bundle manifests (§4.4).
//!
//! Manifest resources exist so a bundle can be fetched before any flow-level
//! profile resolution happens, so unlike a flow's resources they may not
//! reference a `profile` — only `env` is in scope. `config`/`options` are
//! rendered against an env-only context, then decoded through the caller's
//! secrets provider.

use aetherflow_core::{EnvSnapshot, ResourceSpec};
use aetherflow_resolver::{
    collect_decode_requests, render_value, RenderCtx, Section, SecretsProvider, RESOURCE_ALLOWED_ROOTS,
};
use serde_json::Value;

use crate::error::BundleError;

fn env_roots(env: &EnvSnapshot) -> serde_json::Map<String, Value> {
    let mut env_root = serde_json::Map::new();
    for (k, v) in env.iter() {
        env_root.insert(k.clone(), Value::String(v.clone()));
    }
    let mut roots = serde_json::Map::new();
    roots.insert("env".to_string(), Value::Object(env_root));
    roots
}

fn apply_decode(resource: &mut ResourceSpec, provider: &dyn SecretsProvider) -> Result<(), BundleError> {
    let requests = collect_decode_requests(&resource.decode.0.clone());
    for req in requests {
        let target = match req.section {
            Section::Config => &mut resource.config,
            Section::Options => &mut resource.options,
        };
        if let Some(Value::String(s)) = target.get(&req.path).cloned() {
            let decoded = provider
                .decode(&s)
                .map_err(|e| BundleError::Manifest(format!("decode failed for {}: {e}", req.path)))?;
            target.insert(req.path, Value::String(decoded));
        }
    }
    Ok(())
}

/// Resolve a manifest's bootstrap resources: no profile merge, `env`-only
/// template scope, `decode()` applied last.
pub fn materialize_resources(
    resources: &indexmap::IndexMap<String, ResourceSpec>,
    env: &EnvSnapshot,
    secrets: Option<&dyn SecretsProvider>,
) -> Result<indexmap::IndexMap<String, ResourceSpec>, BundleError> {
    let roots = env_roots(env);
    let ctx = RenderCtx { roots: &roots, allowed_roots: RESOURCE_ALLOWED_ROOTS };

    let mut out = indexmap::IndexMap::new();
    for (name, spec) in resources {
        let mut rendered = spec.clone();
        if let Value::Object(m) = render_value(&Value::Object(spec.config.clone()), &ctx)? {
            rendered.config = m;
        }
        if let Value::Object(m) = render_value(&Value::Object(spec.options.clone()), &ctx)? {
            rendered.options = m;
        }
        if let Some(provider) = secrets {
            apply_decode(&mut rendered, provider)?;
        }
        out.insert(name.clone(), rendered);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod tests;
