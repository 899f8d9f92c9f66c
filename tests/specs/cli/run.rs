//! `aetherflow run` (§4.3, §6): validation precedes execution, exit codes.

use crate::prelude::*;

#[test]
fn runs_a_minimal_flow_end_to_end() {
    let project = Project::empty();
    let flow = project.minimal_flow("run-flow");

    aetherflow()
        .args(&["run", "--flow-yaml", flow.to_str().unwrap()])
        .passes()
        .stdout_has("flow_id: run-flow")
        .stdout_has("only-job");
}

#[test]
fn run_json_reports_job_outcomes() {
    let project = Project::empty();
    let flow = project.minimal_flow("run-flow-json");

    let result = aetherflow().args(&["run", "--flow-yaml", flow.to_str().unwrap(), "--json"]).passes();
    let parsed: serde_json::Value = serde_json::from_str(&result.stdout()).expect("valid JSON summary");
    assert_eq!(parsed["flow_id"], serde_json::Value::String("run-flow-json".to_string()));
    assert_eq!(parsed["jobs"][0]["job_id"], serde_json::Value::String("only-job".to_string()));
}

#[test]
fn run_rejects_invalid_flow_with_exit_two() {
    let project = Project::empty();
    let flow = project.invalid_flow("run-invalid-flow");

    aetherflow().args(&["run", "--flow-yaml", flow.to_str().unwrap()]).finish().code_eq(2);
}

#[test]
fn run_requires_exactly_one_flow_source() {
    aetherflow().args(&["run"]).fails().stderr_has("exactly one");
}

#[test]
fn run_rejects_both_flow_yaml_and_bundle_manifest() {
    let project = Project::empty();
    let flow = project.minimal_flow("both-sources");

    aetherflow()
        .args(&["run", "--flow-yaml", flow.to_str().unwrap(), "--bundle-manifest", "manifest.yaml"])
        .fails()
        .stderr_has("exactly one");
}
