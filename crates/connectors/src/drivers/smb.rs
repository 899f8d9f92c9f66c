// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `smb:smbclient` — a reference SMB driver (§4.5) that shells out to the
//! system `smbclient` binary, mirroring the `sftp:openssh` driver's
//! batch-transcript approach. Remote paths keep the `SHARE:/…` prefix
//! convention the bundle synchronizer's path composer expects (§4.4
//! "Remote path composition").

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use aetherflow_core::RemoteFileMeta;

use crate::base::{Connector, ConnectorHandle, ConnectorInit, SmbConnector};
use crate::error::ConnectorError;
use crate::process::run_with_timeout;
use crate::registry::ConnectorRegistry;

use super::opt_str;

pub struct SmbClient {
    name: String,
    driver: String,
    server: String,
    share: String,
    user: String,
    password: Option<String>,
    timeout: Duration,
}

/// Split a `SHARE:/path/to/thing` remote path into the share name and the
/// path within that share, preserving the spec's `SHARE:/…` convention.
fn split_share_path(path: &str) -> (Option<&str>, &str) {
    match path.split_once(":/") {
        Some((share, rest)) => (Some(share), rest),
        None => (None, path.trim_start_matches('/')),
    }
}

impl SmbClient {
    fn open(init: ConnectorInit) -> Result<Self, ConnectorError> {
        let server = opt_str(&init.config, "server").unwrap_or_default();
        let share = opt_str(&init.config, "share").unwrap_or_default();
        let user = opt_str(&init.config, "user").unwrap_or_default();
        let password = opt_str(&init.config, "password");
        let timeout_secs = init.config.get("timeout_seconds").and_then(|v| v.as_f64()).unwrap_or(60.0);
        Ok(Self { name: init.name, driver: init.driver, server, share, user, password, timeout: Duration::from_secs_f64(timeout_secs) })
    }

    fn unc(&self, share: Option<&str>) -> String {
        format!("//{}/{}", self.server, share.unwrap_or(&self.share))
    }

    fn run_command(&self, share: Option<&str>, smb_cmd: &str) -> Result<String, ConnectorError> {
        let mut cmd = Command::new("smbclient");
        cmd.arg(self.unc(share)).arg("-U").arg(&self.user).arg("-c").arg(smb_cmd);
        if let Some(pw) = &self.password {
            cmd.env("PASSWD", pw);
        } else {
            cmd.arg("-N");
        }
        let out = run_with_timeout(cmd, self.timeout, "smb", &self.driver)?;
        if out.status != 0 {
            return Err(ConnectorError::Driver { kind: "smb".into(), driver: self.driver.clone(), msg: out.stderr });
        }
        Ok(out.stdout)
    }
}

impl Connector for SmbClient {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "smb"
    }
    fn driver(&self) -> &str {
        &self.driver
    }
}

fn parse_dir_line(line: &str, share: &str, dir: &str) -> Option<RemoteFileMeta> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        return None;
    }
    // smbclient `dir` output: "  name   D   0  Mon Jan  1 00:00:00 2026"
    let mut tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    let is_dir = tokens.iter().any(|t| *t == "D");
    // name is everything up to the attribute flag (A/D/H/S/R); reconstruct
    // conservatively by taking the leading tokens before the first flag.
    let flag_idx = tokens.iter().position(|t| matches!(*t, "A" | "D" | "H" | "S" | "R" | "N"));
    let name = match flag_idx {
        Some(idx) => tokens.drain(..idx).collect::<Vec<_>>().join(" "),
        None => return None,
    };
    if name.is_empty() {
        return None;
    }
    let rel = format!("{}/{}", dir.trim_matches('/'), name);
    Some(RemoteFileMeta {
        rel_path: Some(rel.trim_start_matches('/').to_string()),
        path: Some(format!("{share}:/{}", rel.trim_start_matches('/'))),
        name: Some(name),
        is_dir,
        size: None,
        mtime_ms: None,
        sha256: None,
    })
}

impl SmbConnector for SmbClient {
    fn list(&self, remote_dir: &str) -> Result<Vec<RemoteFileMeta>, ConnectorError> {
        let (share, dir) = split_share_path(remote_dir);
        let out = self.run_command(share, &format!("cd \\{dir}; dir"))?;
        let share_name = share.unwrap_or(&self.share).to_string();
        Ok(out.lines().filter_map(|l| parse_dir_line(l, &share_name, dir)).collect())
    }

    fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<(), ConnectorError> {
        let (share, file) = split_share_path(remote_path);
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent).map_err(ConnectorError::Io)?;
        }
        self.run_command(share, &format!("get \\{file} {}", local_path.display()))?;
        Ok(())
    }

    fn put(&self, local_path: &Path, remote_path: &str) -> Result<(), ConnectorError> {
        let (share, file) = split_share_path(remote_path);
        self.run_command(share, &format!("put {} \\{file}", local_path.display()))?;
        Ok(())
    }
}

pub fn register(registry: &ConnectorRegistry) {
    registry.register("smb", "smbclient", |init: ConnectorInit| {
        Ok(ConnectorHandle::Smb(Arc::new(SmbClient::open(init)?) as Arc<dyn SmbConnector>))
    });
}

#[cfg(test)]
#[path = "smb_tests.rs"]
mod tests;
