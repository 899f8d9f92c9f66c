// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `archive:zipfile` and `archive:os` — zip/unzip drivers (§4.5, §4.2
//! enterprise archive-allowlist scan), grounded on the Python original's
//! `StdZipfileArchive` and `OsZipArchive` connectors.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipArchive;

use crate::base::{ArchiveConnector, Connector, ConnectorHandle, ConnectorInit};
use crate::error::ConnectorError;
use crate::process::run_with_timeout;
use crate::registry::ConnectorRegistry;

pub struct ZipfileArchive {
    name: String,
    driver: String,
}

impl Connector for ZipfileArchive {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "archive"
    }
    fn driver(&self) -> &str {
        &self.driver
    }
}

fn safe_relpath(entry: &Path, base_dir: &Path) -> Result<PathBuf, ConnectorError> {
    entry
        .strip_prefix(base_dir)
        .map(Path::to_path_buf)
        .map_err(|_| ConnectorError::Driver { kind: "archive".into(), driver: "zipfile".into(), msg: format!("{entry:?} escapes {base_dir:?}") })
}

impl ArchiveConnector for ZipfileArchive {
    fn zip(&self, src_dir: &Path, dest_zip: &Path) -> Result<(), ConnectorError> {
        let file = File::create(dest_zip).map_err(ConnectorError::Io)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for entry in WalkDir::new(src_dir).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let rel = safe_relpath(path, src_dir)?;
            writer
                .start_file(rel.to_string_lossy(), options)
                .map_err(|e| ConnectorError::Driver { kind: "archive".into(), driver: "zipfile".into(), msg: e.to_string() })?;
            let mut buf = Vec::new();
            File::open(path).map_err(ConnectorError::Io)?.read_to_end(&mut buf).map_err(ConnectorError::Io)?;
            writer.write_all(&buf).map_err(ConnectorError::Io)?;
        }
        writer
            .finish()
            .map_err(|e| ConnectorError::Driver { kind: "archive".into(), driver: "zipfile".into(), msg: e.to_string() })?;
        Ok(())
    }

    fn unzip(&self, src_zip: &Path, dest_dir: &Path) -> Result<(), ConnectorError> {
        let file = File::open(src_zip).map_err(ConnectorError::Io)?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| ConnectorError::Driver { kind: "archive".into(), driver: "zipfile".into(), msg: e.to_string() })?;
        std::fs::create_dir_all(dest_dir).map_err(ConnectorError::Io)?;
        let dest_dir = dest_dir.canonicalize().map_err(ConnectorError::Io)?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| ConnectorError::Driver { kind: "archive".into(), driver: "zipfile".into(), msg: e.to_string() })?;
            let Some(enclosed) = entry.enclosed_name() else {
                return Err(ConnectorError::Driver {
                    kind: "archive".into(),
                    driver: "zipfile".into(),
                    msg: format!("zip slip attempt in entry {}", entry.name()),
                });
            };
            let out_path = dest_dir.join(enclosed);
            if !out_path.starts_with(&dest_dir) {
                return Err(ConnectorError::Driver {
                    kind: "archive".into(),
                    driver: "zipfile".into(),
                    msg: format!("entry {} escapes destination directory", entry.name()),
                });
            }
            if entry.is_dir() {
                std::fs::create_dir_all(&out_path).map_err(ConnectorError::Io)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(ConnectorError::Io)?;
            }
            let mut out_file = File::create(&out_path).map_err(ConnectorError::Io)?;
            std::io::copy(&mut entry, &mut out_file).map_err(ConnectorError::Io)?;
        }
        Ok(())
    }
}

/// Shells out to the system `zip`/`unzip` binaries rather than an in-process
/// library, matching the Python original's `OsZipArchive` subprocess driver.
pub struct OsArchive {
    name: String,
    driver: String,
    timeout: Duration,
}

impl Connector for OsArchive {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "archive"
    }
    fn driver(&self) -> &str {
        &self.driver
    }
}

impl ArchiveConnector for OsArchive {
    fn zip(&self, src_dir: &Path, dest_zip: &Path) -> Result<(), ConnectorError> {
        let mut cmd = Command::new("zip");
        cmd.arg("-r").arg(dest_zip).arg(".").current_dir(src_dir);
        let out = run_with_timeout(cmd, self.timeout, "archive", &self.driver)?;
        if out.status != 0 {
            return Err(ConnectorError::Driver { kind: "archive".into(), driver: self.driver.clone(), msg: out.stderr });
        }
        Ok(())
    }

    fn unzip(&self, src_zip: &Path, dest_dir: &Path) -> Result<(), ConnectorError> {
        std::fs::create_dir_all(dest_dir).map_err(ConnectorError::Io)?;
        let mut cmd = Command::new("unzip");
        cmd.arg("-o").arg(src_zip).arg("-d").arg(dest_dir);
        let out = run_with_timeout(cmd, self.timeout, "archive", &self.driver)?;
        if out.status != 0 {
            return Err(ConnectorError::Driver { kind: "archive".into(), driver: self.driver.clone(), msg: out.stderr });
        }
        Ok(())
    }
}

pub fn register(registry: &ConnectorRegistry) {
    registry.register("archive", "zipfile", |init: ConnectorInit| {
        Ok(ConnectorHandle::Archive(Arc::new(ZipfileArchive { name: init.name, driver: init.driver }) as Arc<dyn ArchiveConnector>))
    });
    registry.register("archive", "os", |init: ConnectorInit| {
        Ok(ConnectorHandle::Archive(
            Arc::new(OsArchive { name: init.name, driver: init.driver, timeout: Duration::from_secs(120) }) as Arc<dyn ArchiveConnector>,
        ))
    });
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
