// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use aetherflow_validate::StepTypeCatalog;

use super::*;

#[test]
fn builtin_registry_registers_the_reference_catalog() {
    let reg = builtin_registry();
    for step_type in [
        "external.process",
        "db.extract",
        "fs.zip",
        "fs.unzip",
        "transfer.upload",
        "transfer.download",
        "with_lock",
    ] {
        assert!(reg.is_registered(step_type), "{step_type} should be registered");
    }
    assert!(!reg.is_registered("nonexistent.step"));
}

#[test]
fn list_is_sorted_and_deduplicated() {
    let reg = builtin_registry();
    let listed = reg.list();
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed, sorted);
}
