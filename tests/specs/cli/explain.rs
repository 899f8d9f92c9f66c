//! `aetherflow explain` (§C): prints the execution plan without running it.

use crate::prelude::*;

#[test]
fn explain_lists_job_and_step_without_executing() {
    let project = Project::empty();
    let flow = project.minimal_flow("explain-flow");

    aetherflow()
        .args(&["explain", "--flow-yaml", flow.to_str().unwrap()])
        .passes()
        .stdout_has("only-job")
        .stdout_has("only-step:external.process");

    assert!(!project.path().join("work").exists(), "explain must never create the workspace");
}

#[test]
fn explain_json_carries_depends_on_and_when() {
    let project = Project::empty();
    let work_root = project.path().join("work2");
    let state_path = project.path().join("state2.sqlite");
    let flow = project.file(
        "flow.yaml",
        &format!(
            r#"
version: 1
flow:
  id: explain-json-flow
  workspace:
    root: "{work_root}"
  state:
    backend: sqlite
    path: "{state_path}"
jobs:
  - id: first
    steps:
      - id: s1
        type: external.process
        inputs:
          command: ["true"]
  - id: second
    depends_on: ["first"]
    when: "{{{{steps.s1.status == 'success'}}}}"
    steps:
      - id: s2
        type: external.process
        inputs:
          command: ["true"]
"#,
            work_root = work_root.display(),
            state_path = state_path.display(),
        ),
    );

    let result = aetherflow().args(&["explain", "--flow-yaml", flow.to_str().unwrap(), "--json"]).passes();
    let parsed: serde_json::Value = serde_json::from_str(&result.stdout()).expect("valid JSON");
    assert_eq!(parsed["jobs"][1]["depends_on"][0], serde_json::Value::String("first".to_string()));
    assert!(parsed["jobs"][1]["when"].is_string());
}
