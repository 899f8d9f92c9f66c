// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn snap(pairs: &[(&str, &str)]) -> EnvSnapshot {
    EnvSnapshot::from_map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn overrides_win_over_existing_keys() {
    let base = snap(&[("A", "1")]);
    let next = base.with_overrides([("A".to_string(), "2".to_string())]);
    assert_eq!(next.get("A"), Some("2"));
    // original is untouched
    assert_eq!(base.get("A"), Some("1"));
}

#[test]
fn without_keys_removes_entries() {
    let base = snap(&[("A", "1"), ("B", "2")]);
    let next = base.without_keys(&["A"]);
    assert_eq!(next.get("A"), None);
    assert_eq!(next.get("B"), Some("2"));
}

#[test]
fn clone_is_cheap_and_shares_data_until_mutated() {
    let base = snap(&[("A", "1")]);
    let cloned = base.clone();
    assert_eq!(cloned.get("A"), Some("1"));
}
