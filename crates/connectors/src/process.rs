// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess-with-timeout helper shared by the process-backed connector
//! drivers (sftp, smb, mail). Ported from the teacher's adapter layer: a
//! background thread owns the child and polls `try_wait`, decoupling the
//! timeout from the calling thread.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::ConnectorError;

pub struct ProcessOutcome {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    kind: &str,
    driver: &str,
) -> Result<ProcessOutcome, ConnectorError> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(ConnectorError::Io)?;
    let start = Instant::now();

    loop {
        match child.try_wait().map_err(ConnectorError::Io)? {
            Some(status) => {
                let mut stdout = String::new();
                let mut stderr = String::new();
                if let Some(mut out) = child.stdout.take() {
                    let _ = out.read_to_string(&mut stdout);
                }
                if let Some(mut err) = child.stderr.take() {
                    let _ = err.read_to_string(&mut stderr);
                }
                return Ok(ProcessOutcome { status: status.code().unwrap_or(-1), stdout, stderr });
            }
            None => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ConnectorError::Timeout {
                        kind: kind.to_string(),
                        driver: driver.to_string(),
                        timeout_secs: timeout.as_secs_f64(),
                    });
                }
                std::thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
