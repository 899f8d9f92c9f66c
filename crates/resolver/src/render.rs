// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering: lookup against an allowed-root context, typed passthrough
//! for standalone tokens, string concatenation otherwise (§4.1).

use aetherflow_core::json_to_string_lossy;
use serde_json::Value;

use crate::error::ResolverError;
use crate::grammar::{self, Token};

/// The phase-scoped context a render call is evaluated against: a mapping
/// from root name (e.g. `env`, `steps`, `jobs`) to its current value, plus
/// the set of root names this phase permits (§4.1 "Phases and allowed roots").
pub struct RenderCtx<'a> {
    pub roots: &'a serde_json::Map<String, Value>,
    pub allowed_roots: &'a [&'static str],
}

/// Resource/flow-meta render phase: only `env` is reachable.
pub const RESOURCE_ALLOWED_ROOTS: &[&str] = &["env"];
/// Step render phase: the full runtime context.
pub const STEP_ALLOWED_ROOTS: &[&str] =
    &["env", "steps", "job", "jobs", "run_id", "flow_id", "result"];

fn is_empty_value(v: &Value) -> bool {
    matches!(v, Value::String(s) if s.is_empty())
}

fn resolve_token(token: &Token, ctx: &RenderCtx) -> Result<Value, ResolverError> {
    let mut parts = token.path.split('.');
    // scan() guarantees at least one identifier segment.
    let root = parts.next().unwrap_or_default();
    if !ctx.allowed_roots.contains(&root) {
        return Err(ResolverError::unknown_root(root, ctx.allowed_roots));
    }

    let missing = || match &token.default {
        Some(default) => Ok(Value::String(default.clone())),
        None => Err(ResolverError::missing_key(&token.path)),
    };

    let mut current = match ctx.roots.get(root) {
        Some(v) => v,
        None => return missing(),
    };
    for seg in parts {
        current = match current {
            Value::Object(map) => match map.get(seg) {
                Some(v) => v,
                None => return missing(),
            },
            _ => return missing(),
        };
    }

    if is_empty_value(current) {
        missing()
    } else {
        Ok(current.clone())
    }
}

/// Render a single string according to the typed-passthrough rule: a
/// standalone token returns its native type; a mixed string always
/// returns a string.
pub fn render_string(s: &str, ctx: &RenderCtx) -> Result<Value, ResolverError> {
    let tokens = grammar::scan(s)?;
    if tokens.is_empty() {
        return Ok(Value::String(s.to_string()));
    }
    if let Some(token) = grammar::standalone_token(s)? {
        return resolve_token(&token, ctx);
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0usize;
    for token in &tokens {
        out.push_str(&s[last..token.span.0]);
        let value = resolve_token(token, ctx)?;
        out.push_str(&json_to_string_lossy(&value));
        last = token.span.1;
    }
    out.push_str(&s[last..]);
    Ok(Value::String(out))
}

/// Recursively render every string leaf of a JSON value tree (mappings,
/// sequences, and scalars pass through unchanged except for strings).
pub fn render_value(value: &Value, ctx: &RenderCtx) -> Result<Value, ResolverError> {
    match value {
        Value::String(s) => render_string(s, ctx),
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|v| render_value(v, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(rendered))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), render_value(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
