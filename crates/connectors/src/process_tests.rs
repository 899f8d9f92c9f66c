// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::process::Command;

#[test]
fn captures_stdout_of_a_fast_command() {
    let mut cmd = Command::new("echo");
    cmd.arg("hello");
    let out = run_with_timeout(cmd, Duration::from_secs(5), "test", "echo").unwrap();
    assert_eq!(out.status, 0);
    assert_eq!(out.stdout.trim(), "hello");
}

#[test]
fn kills_a_slow_command_past_the_deadline() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let err = run_with_timeout(cmd, Duration::from_millis(100), "test", "sleep").unwrap_err();
    assert!(matches!(err, ConnectorError::Timeout { .. }));
}
