//! `aetherflow bundle sync` (§4.4): filesystem source, atomic activation.

use crate::prelude::*;

#[test]
fn sync_activates_a_filesystem_bundle() {
    let project = Project::empty();
    let manifest = project.filesystem_bundle("sync-bundle");

    let result = aetherflow()
        .args(&["bundle", "sync", "--bundle-manifest", manifest.to_str().unwrap()])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes();
    result.stdout_has("changed: true").stdout_has("fetched_files: 1").stdout_has("entry.yaml");

    let active_entry = project.work_root().join("bundles").join("sync-bundle").join("active").join("entry.yaml");
    assert!(active_entry.exists(), "sync should materialize active/entry.yaml");
}

#[test]
fn second_sync_with_unchanged_source_reports_no_change() {
    let project = Project::empty();
    let manifest = project.filesystem_bundle("sync-bundle-repeat");

    aetherflow()
        .args(&["bundle", "sync", "--bundle-manifest", manifest.to_str().unwrap()])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes();

    aetherflow()
        .args(&["bundle", "sync", "--bundle-manifest", manifest.to_str().unwrap()])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes()
        .stdout_has("changed: false");
}

#[test]
fn sync_print_local_root_emits_only_the_path() {
    let project = Project::empty();
    let manifest = project.filesystem_bundle("sync-bundle-print");

    let result = aetherflow()
        .args(&["bundle", "sync", "--bundle-manifest", manifest.to_str().unwrap(), "--print-local-root"])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes();

    let expected = project.work_root().join("bundles").join("sync-bundle-print");
    assert_eq!(result.stdout().trim(), expected.to_str().unwrap());
}

#[test]
fn run_with_bundle_manifest_executes_the_synced_entry_flow() {
    let project = Project::empty();
    let manifest = project.filesystem_bundle("sync-bundle-run");

    aetherflow()
        .args(&["run", "--bundle-manifest", manifest.to_str().unwrap()])
        .env("AETHERFLOW_WORK_ROOT", project.work_root())
        .passes()
        .stdout_has("flow_id: sync-bundle-run-flow");
}
