// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use aetherflow_resolver::SecretsProvider;
use tempfile::tempdir;

use super::*;

#[test]
fn no_module_returns_none() {
    let result = load_secrets_provider(None, None).unwrap();
    assert!(result.is_none());
}

#[test]
fn unknown_module_errors() {
    let err = load_secrets_provider(Some("vault"), None).unwrap_err();
    assert!(err.to_string().contains("unknown secrets module"));
}

#[test]
fn file_module_without_path_errors() {
    let err = load_secrets_provider(Some("file"), None).unwrap_err();
    assert!(err.to_string().contains("AETHERFLOW_SECRETS_PATH"));
}

#[test]
fn file_module_decodes_known_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secrets.json");
    std::fs::write(&path, r#"{"db_password": "hunter2"}"#).unwrap();

    let provider = load_secrets_provider(Some("file"), Some(path.as_path())).unwrap().unwrap();
    assert_eq!(provider.decode("db_password").unwrap(), "hunter2");
}

#[test]
fn file_module_errors_on_unknown_entry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secrets.json");
    std::fs::write(&path, r#"{"db_password": "hunter2"}"#).unwrap();

    let provider = FileSecretsProvider::load(&path).unwrap();
    assert!(provider.decode("missing").is_err());
}
