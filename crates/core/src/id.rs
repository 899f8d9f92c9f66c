// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifiers.

use rand::RngCore;

/// Generate a fresh 12-hex-character run id (§3 `RunContext`).
pub fn new_run_id() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
