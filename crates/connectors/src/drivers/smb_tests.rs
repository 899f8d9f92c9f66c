// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn splits_share_prefixed_remote_paths() {
    let (share, rest) = split_share_path("BUNDLES:/flows/demo.yaml");
    assert_eq!(share, Some("BUNDLES"));
    assert_eq!(rest, "flows/demo.yaml");
}

#[test]
fn treats_a_path_with_no_share_prefix_as_share_relative() {
    let (share, rest) = split_share_path("/flows/demo.yaml");
    assert_eq!(share, None);
    assert_eq!(rest, "flows/demo.yaml");
}

#[test]
fn parses_a_dir_listing_line_into_remote_file_meta() {
    let line = "  demo.yaml                          A      128  Mon Jan  1 00:00:00 2026";
    let meta = parse_dir_line(line, "BUNDLES", "flows").unwrap();
    assert_eq!(meta.name.as_deref(), Some("demo.yaml"));
    assert_eq!(meta.path.as_deref(), Some("BUNDLES:/flows/demo.yaml"));
    assert!(!meta.is_dir);
}

#[test]
fn parses_a_directory_entry() {
    let line = "  plugins                            D        0  Mon Jan  1 00:00:00 2026";
    let meta = parse_dir_line(line, "BUNDLES", "").unwrap();
    assert!(meta.is_dir);
}

#[test]
fn registered_via_builtin_registry() {
    let reg = crate::registry::builtin_registry();
    let init = ConnectorInit {
        name: "smb1".to_string(),
        kind: "smb".to_string(),
        driver: "smbclient".to_string(),
        config: serde_json::Map::new(),
        options: serde_json::Map::new(),
    };
    let handle = reg.create(init).unwrap();
    assert_eq!(handle.kind(), "smb");
    assert!(handle.as_smb().is_some());
}
