//! `--help` surfaces for every subcommand (§6 CLI surface).

use crate::prelude::*;

#[test]
fn top_level_help_lists_subcommands() {
    aetherflow()
        .args(&["--help"])
        .passes()
        .stdout_has("run")
        .stdout_has("validate")
        .stdout_has("doctor")
        .stdout_has("explain")
        .stdout_has("bundle");
}

#[test]
fn run_help_shows_flow_yaml_flag() {
    aetherflow().args(&["run", "--help"]).passes().stdout_has("--flow-yaml").stdout_has("--bundle-manifest");
}

#[test]
fn bundle_help_lists_sync_and_status() {
    aetherflow().args(&["bundle", "--help"]).passes().stdout_has("sync").stdout_has("status");
}

#[test]
fn version_flag_prints_version() {
    aetherflow().args(&["--version"]).passes().stdout_has("aetherflow");
}

#[test]
fn scheduler_help_shows_run_subcommand() {
    scheduler().args(&["--help"]).passes().stdout_has("run");
}
