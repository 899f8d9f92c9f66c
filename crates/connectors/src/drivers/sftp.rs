// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sftp:openssh` — a reference SFTP driver (§4.5) that shells out to the
//! system `sftp`/`scp` binaries under a batch-mode transcript, mirroring
//! the archive `os` driver's subprocess approach rather than linking an
//! SSH library.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use aetherflow_core::RemoteFileMeta;

use crate::base::{Connector, ConnectorHandle, ConnectorInit, SftpConnector};
use crate::error::ConnectorError;
use crate::process::run_with_timeout;
use crate::registry::ConnectorRegistry;

use super::opt_str;

pub struct OpenSshSftp {
    name: String,
    driver: String,
    host: String,
    port: u16,
    user: String,
    timeout: Duration,
}

impl OpenSshSftp {
    fn open(init: ConnectorInit) -> Result<Self, ConnectorError> {
        let host = opt_str(&init.config, "host").unwrap_or_default();
        let user = opt_str(&init.config, "user").unwrap_or_default();
        let port = init.config.get("port").and_then(|v| v.as_u64()).unwrap_or(22) as u16;
        let timeout_secs = init.config.get("timeout_seconds").and_then(|v| v.as_f64()).unwrap_or(60.0);
        Ok(Self {
            name: init.name,
            driver: init.driver,
            host,
            port,
            user,
            timeout: Duration::from_secs_f64(timeout_secs),
        })
    }

    fn target(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }

    fn run_batch(&self, batch: &str) -> Result<String, ConnectorError> {
        // Batch commands are fed via a transcript file rather than stdin so
        // `run_with_timeout`'s spawn-and-poll contract stays uniform across
        // drivers (no separate writer thread feeding the child's stdin).
        let tmp = std::env::temp_dir().join(format!("aetherflow-sftp-batch-{}", uuid_like()));
        std::fs::write(&tmp, batch).map_err(ConnectorError::Io)?;
        let mut cmd = Command::new("sftp");
        cmd.arg("-P").arg(self.port.to_string()).arg("-b").arg(&tmp).arg(self.target());
        let out = run_with_timeout(cmd, self.timeout, "sftp", &self.driver);
        let _ = std::fs::remove_file(&tmp);
        let out = out?;
        if out.status != 0 {
            return Err(ConnectorError::Driver { kind: "sftp".into(), driver: self.driver.clone(), msg: out.stderr });
        }
        Ok(out.stdout)
    }
}

fn uuid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos().to_string()).unwrap_or_default()
}

impl Connector for OpenSshSftp {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "sftp"
    }
    fn driver(&self) -> &str {
        &self.driver
    }
}

/// Parse `ls -l`-style lines emitted by `sftp`'s `ls -l` command into
/// [`RemoteFileMeta`]. Only the fields the synchronizer's reuse algorithm
/// needs (size, is_dir) are extracted; mtime/sha are left for the caller
/// to fill in when `strict_fingerprint` requires it.
fn parse_ls_line(line: &str, dir: &str) -> Option<RemoteFileMeta> {
    let mut parts = line.split_whitespace();
    let perms = parts.next()?;
    // skip link-count, owner, group
    let _ = parts.next()?;
    let _ = parts.next()?;
    let _ = parts.next()?;
    let size: u64 = parts.next()?.parse().ok()?;
    // month, day, time/year
    let _ = parts.next();
    let _ = parts.next();
    let _ = parts.next();
    let name: String = parts.collect::<Vec<_>>().join(" ");
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    let is_dir = perms.starts_with('d');
    let rel = format!("{}/{}", dir.trim_end_matches('/'), name);
    Some(RemoteFileMeta {
        rel_path: Some(rel.trim_start_matches('/').to_string()),
        path: Some(rel),
        name: Some(name),
        is_dir,
        size: Some(size),
        mtime_ms: None,
        sha256: None,
    })
}

impl SftpConnector for OpenSshSftp {
    fn list(&self, remote_dir: &str) -> Result<Vec<RemoteFileMeta>, ConnectorError> {
        let out = self.run_batch(&format!("ls -l {remote_dir}\n"))?;
        Ok(out.lines().filter_map(|l| parse_ls_line(l, remote_dir)).collect())
    }

    fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<(), ConnectorError> {
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent).map_err(ConnectorError::Io)?;
        }
        self.run_batch(&format!("get {remote_path} {}\n", local_path.display()))?;
        Ok(())
    }

    fn put(&self, local_path: &Path, remote_path: &str) -> Result<(), ConnectorError> {
        self.run_batch(&format!("put {} {remote_path}\n", local_path.display()))?;
        Ok(())
    }
}

pub fn register(registry: &ConnectorRegistry) {
    registry.register("sftp", "openssh", |init: ConnectorInit| {
        Ok(ConnectorHandle::Sftp(Arc::new(OpenSshSftp::open(init)?) as Arc<dyn SftpConnector>))
    });
}

#[cfg(test)]
#[path = "sftp_tests.rs"]
mod tests;
