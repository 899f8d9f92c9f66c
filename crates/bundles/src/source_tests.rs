// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use aetherflow_core::BundleSourceType;
use tempfile::tempdir;

use super::*;

#[test]
fn filesystem_source_lists_relative_paths() {
    let dir = tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("flows")).expect("mkdir");
    std::fs::write(dir.path().join("flows/demo.yaml"), b"flow: {}").expect("write");
    std::fs::write(dir.path().join("profiles.yaml"), b"profiles: {}").expect("write");

    let source = FilesystemSource::new(dir.path());
    let mut files = source.list_files().expect("list");
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].rel_path.as_deref(), Some("flows/demo.yaml"));
    assert_eq!(files[1].rel_path.as_deref(), Some("profiles.yaml"));
    assert!(files.iter().all(|f| f.size.is_some()));
}

#[test]
fn filesystem_source_reads_bytes() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("a.txt"), b"hello").expect("write");
    let source = FilesystemSource::new(dir.path());
    assert_eq!(source.read_bytes("a.txt").expect("read"), b"hello");
}

#[test]
fn join_remote_path_is_plain_posix_for_sftp() {
    assert_eq!(join_remote_path(BundleSourceType::Sftp, "/srv/bundles", "flows/demo.yaml"), "/srv/bundles/flows/demo.yaml");
    assert_eq!(join_remote_path(BundleSourceType::Sftp, "/srv/bundles/", "/flows/demo.yaml"), "/srv/bundles/flows/demo.yaml");
}

#[test]
fn join_remote_path_preserves_smb_share_prefix() {
    assert_eq!(
        join_remote_path(BundleSourceType::Smb, "DATA:/bundles/prod", "flows/demo.yaml"),
        "DATA:/bundles/prod/flows/demo.yaml"
    );
    assert_eq!(join_remote_path(BundleSourceType::Smb, "DATA:/", "flows/demo.yaml"), "DATA:/flows/demo.yaml");
}

#[test]
fn join_remote_path_falls_back_to_posix_without_share_prefix() {
    assert_eq!(join_remote_path(BundleSourceType::Smb, "/bundles/prod", "demo.yaml"), "/bundles/prod/demo.yaml");
}
