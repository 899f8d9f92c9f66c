// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn roots(json_obj: Value) -> serde_json::Map<String, Value> {
    match json_obj {
        Value::Object(m) => m,
        _ => panic!("expected object"),
    }
}

#[test]
fn typed_passthrough_returns_native_type() {
    let roots = roots(json!({"env": {"X": 42}}));
    let ctx = RenderCtx { roots: &roots, allowed_roots: RESOURCE_ALLOWED_ROOTS };
    let v = render_string("{{env.X}}", &ctx).unwrap();
    assert_eq!(v, json!(42));
}

#[test]
fn mixed_string_always_returns_string() {
    let roots = roots(json!({"env": {"X": 42}}));
    let ctx = RenderCtx { roots: &roots, allowed_roots: RESOURCE_ALLOWED_ROOTS };
    let v = render_string("prefix {{env.X}}", &ctx).unwrap();
    assert_eq!(v, json!("prefix 42"));
}

#[test]
fn empty_string_value_is_treated_as_missing_and_uses_default() {
    let roots = roots(json!({"env": {"K": ""}}));
    let ctx = RenderCtx { roots: &roots, allowed_roots: RESOURCE_ALLOWED_ROOTS };
    let v = render_string("{{env.K:D}}", &ctx).unwrap();
    assert_eq!(v, json!("D"));
}

#[test]
fn missing_key_without_default_errors() {
    let roots = roots(json!({"env": {}}));
    let ctx = RenderCtx { roots: &roots, allowed_roots: RESOURCE_ALLOWED_ROOTS };
    let err = render_string("{{env.MISSING}}", &ctx).unwrap_err();
    assert_eq!(err, ResolverError::missing_key("env.MISSING"));
}

#[test]
fn unknown_root_is_rejected() {
    let roots = roots(json!({"env": {}}));
    let ctx = RenderCtx { roots: &roots, allowed_roots: RESOURCE_ALLOWED_ROOTS };
    let err = render_string("{{steps.s1.output}}", &ctx).unwrap_err();
    assert!(matches!(err, ResolverError::UnknownRoot { .. }));
}

#[test]
fn render_value_recurses_through_mappings_and_lists() {
    let roots = roots(json!({"env": {"X": "v"}}));
    let ctx = RenderCtx { roots: &roots, allowed_roots: RESOURCE_ALLOWED_ROOTS };
    let input = json!({"a": ["{{env.X}}", "literal"], "b": {"c": "{{env.X}}"}});
    let out = render_value(&input, &ctx).unwrap();
    assert_eq!(out, json!({"a": ["v", "literal"], "b": {"c": "v"}}));
}

#[test]
fn step_roots_allow_jobs_and_steps() {
    let roots = roots(json!({
        "env": {}, "steps": {}, "job": {}, "jobs": {}, "run_id": "abc", "flow_id": "f", "result": {}
    }));
    let ctx = RenderCtx { roots: &roots, allowed_roots: STEP_ALLOWED_ROOTS };
    let v = render_string("{{run_id}}", &ctx).unwrap();
    assert_eq!(v, json!("abc"));
}
