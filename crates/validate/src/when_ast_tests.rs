// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn simple_equality_parses_and_evaluates() {
    let expr = parse("jobs.probe.outputs.has_data == true").unwrap();
    let jobs = json!({"probe": {"outputs": {"has_data": true}}});
    assert!(evaluate(&expr, &jobs));

    let jobs_false = json!({"probe": {"outputs": {"has_data": false}}});
    assert!(!evaluate(&expr, &jobs_false));
}

#[test]
fn and_or_not_compose() {
    let expr = parse("jobs.a.outputs.x == 1 and not jobs.a.outputs.y == 2").unwrap();
    let jobs = json!({"a": {"outputs": {"x": 1, "y": 3}}});
    assert!(evaluate(&expr, &jobs));
}

#[test]
fn only_jobs_root_is_allowed() {
    let err = parse("env.SOMETHING == true").unwrap_err();
    assert!(err.0.contains("jobs"));
}

#[test]
fn arbitrary_python_like_constructs_are_rejected() {
    assert!(parse("__import__('os')").is_err());
    assert!(parse("jobs.a.outputs.x if True else False").is_err());
}

#[test]
fn numeric_comparisons_work() {
    let expr = parse("jobs.a.outputs.count >= 3").unwrap();
    assert!(evaluate(&expr, &json!({"a": {"outputs": {"count": 5}}})));
    assert!(!evaluate(&expr, &json!({"a": {"outputs": {"count": 1}}})));
}

#[test]
fn missing_attribute_path_is_falsy() {
    let expr = parse("jobs.missing.outputs.x == true").unwrap();
    assert!(!evaluate(&expr, &json!({})));
}

#[test]
fn string_literal_constants_parse() {
    let expr = parse("jobs.a.outputs.status == 'done'").unwrap();
    assert!(evaluate(&expr, &json!({"a": {"outputs": {"status": "done"}}})));
}
