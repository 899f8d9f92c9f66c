//! `aetherflow validate` (§4.2, §6, §7 exit codes).

use crate::prelude::*;

#[test]
fn valid_flow_prints_ok_and_exits_zero() {
    let project = Project::empty();
    let flow = project.minimal_flow("valid-flow");

    aetherflow()
        .args(&["validate", "--flow-yaml", flow.to_str().unwrap()])
        .passes()
        .stdout_has("OK:");
}

#[test]
fn invalid_flow_prints_invalid_and_exits_two() {
    let project = Project::empty();
    let flow = project.invalid_flow("bad-flow");

    aetherflow()
        .args(&["validate", "--flow-yaml", flow.to_str().unwrap()])
        .finish()
        .code_eq(2)
        .stdout_has("INVALID:");
}

#[test]
fn invalid_flow_json_reports_ok_false() {
    let project = Project::empty();
    let flow = project.invalid_flow("bad-flow-json");

    let result = aetherflow()
        .args(&["validate", "--flow-yaml", flow.to_str().unwrap(), "--json"])
        .finish()
        .code_eq(2);
    let stdout = result.stdout();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON report");
    assert_eq!(parsed["ok"], serde_json::Value::Bool(false));
    assert!(!parsed["errors"].as_array().unwrap().is_empty());
}

#[test]
fn missing_flow_file_fails() {
    let project = Project::empty();
    let missing = project.path().join("does-not-exist.yaml");

    aetherflow().args(&["validate", "--flow-yaml", missing.to_str().unwrap()]).fails();
}
