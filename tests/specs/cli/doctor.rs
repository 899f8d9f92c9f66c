//! `aetherflow doctor` (§C "Diagnostics CLI surface"): validate, then
//! best-effort-probe every declared resource.

use crate::prelude::*;

#[test]
fn doctor_on_resourceless_flow_reports_ok() {
    let project = Project::empty();
    let flow = project.minimal_flow("doctor-flow");

    aetherflow().args(&["doctor", "--flow-yaml", flow.to_str().unwrap()]).passes().stdout_has("OK:");
}

#[test]
fn doctor_on_invalid_flow_exits_two() {
    let project = Project::empty();
    let flow = project.invalid_flow("doctor-invalid-flow");

    aetherflow().args(&["doctor", "--flow-yaml", flow.to_str().unwrap()]).finish().code_eq(2);
}

#[test]
fn doctor_json_reports_empty_resource_list_for_resourceless_flow() {
    let project = Project::empty();
    let flow = project.minimal_flow("doctor-json-flow");

    let result = aetherflow().args(&["doctor", "--flow-yaml", flow.to_str().unwrap(), "--json"]).passes();
    let parsed: serde_json::Value = serde_json::from_str(&result.stdout()).expect("valid JSON");
    assert_eq!(parsed["ok"], serde_json::Value::Bool(true));
    assert!(parsed["resources"].as_array().unwrap().is_empty());
}
