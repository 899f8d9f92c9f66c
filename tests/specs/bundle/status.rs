//! `aetherflow bundle status` (§4.4): read-only, never fetches.

use crate::prelude::*;

#[test]
fn status_before_any_sync_reports_not_present() {
    let project = Project::empty();
    let manifest = project.filesystem_bundle("status-bundle");

    aetherflow()
        .args(&["bundle", "status", "--bundle-manifest", manifest.to_str().unwrap()])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes()
        .stdout_has("active present: false");
}

#[test]
fn status_after_sync_reports_present_and_matching_fingerprint() {
    let project = Project::empty();
    let manifest = project.filesystem_bundle("status-bundle-synced");

    aetherflow()
        .args(&["bundle", "sync", "--bundle-manifest", manifest.to_str().unwrap()])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes();

    aetherflow()
        .args(&["bundle", "status", "--bundle-manifest", manifest.to_str().unwrap()])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes()
        .stdout_has("active present: true")
        .stdout_has("would change: false");
}

#[test]
fn status_json_reports_bundle_id() {
    let project = Project::empty();
    let manifest = project.filesystem_bundle("status-bundle-json");

    let result = aetherflow()
        .args(&["bundle", "status", "--bundle-manifest", manifest.to_str().unwrap(), "--json"])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes();
    let parsed: serde_json::Value = serde_json::from_str(&result.stdout()).expect("valid JSON");
    assert_eq!(parsed["bundle_id"], serde_json::Value::String("status-bundle-json".to_string()));
    assert_eq!(parsed["active_present"], serde_json::Value::Bool(false));
}
