// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The connector contract (§4.5 "Duck-typed kind contracts").
//!
//! A connector is a thin, reusable wrapper around a concrete transport
//! (DB driver, HTTP client, SFTP session, SMB share, SMTP relay, archive
//! tool). Kind-specific behavior is exposed through a kind trait
//! (`DbConnector`, `RestConnector`, ...); `Connector` is the common base
//! every driver implements regardless of kind. The registry hands back a
//! [`ConnectorHandle`] rather than a bare `Arc<dyn Connector>` so callers
//! get the kind trait directly, with no downcasting.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ConnectorError;

/// What a registry entry is constructed from — one resolved resource.
#[derive(Debug, Clone)]
pub struct ConnectorInit {
    pub name: String,
    pub kind: String,
    pub driver: String,
    pub config: Map<String, Value>,
    pub options: Map<String, Value>,
}

/// Every connector, regardless of kind, honors this lifecycle.
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> &str;
    fn driver(&self) -> &str;

    /// Best-effort close; run-scoped connectors are closed when the run
    /// finishes, process-scoped ones outlive it (§4.5 "Cache policies").
    fn close(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

pub trait DbConnector: Connector {
    /// Execute `sql` and return rows as JSON objects keyed by column name.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Map<String, Value>>, ConnectorError>;
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, ConnectorError>;
}

pub trait RestConnector: Connector {
    fn get(&self, path: &str, query: &[(String, String)]) -> Result<RestResponse, ConnectorError>;
    fn post(&self, path: &str, body: &Value) -> Result<RestResponse, ConnectorError>;
}

#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub body: Value,
}

pub trait SftpConnector: Connector {
    fn list(&self, remote_dir: &str) -> Result<Vec<aetherflow_core::RemoteFileMeta>, ConnectorError>;
    fn fetch(&self, remote_path: &str, local_path: &std::path::Path) -> Result<(), ConnectorError>;
    fn put(&self, local_path: &std::path::Path, remote_path: &str) -> Result<(), ConnectorError>;
}

pub trait SmbConnector: Connector {
    fn list(&self, remote_dir: &str) -> Result<Vec<aetherflow_core::RemoteFileMeta>, ConnectorError>;
    fn fetch(&self, remote_path: &str, local_path: &std::path::Path) -> Result<(), ConnectorError>;
    fn put(&self, local_path: &std::path::Path, remote_path: &str) -> Result<(), ConnectorError>;
}

/// §4.5 mail kind contract: `send_plaintext`/`send_html`, both taking the
/// same optional `from_addr`/`cc`/`bcc` overrides.
pub struct MailMessage<'a> {
    pub to: &'a [String],
    pub subject: &'a str,
    pub body: &'a str,
    pub from_addr: Option<&'a str>,
    pub cc: &'a [String],
    pub bcc: &'a [String],
    pub attachments: &'a [std::path::PathBuf],
}

pub trait MailConnector: Connector {
    fn send_plaintext(&self, msg: &MailMessage) -> Result<(), ConnectorError>;
    fn send_html(&self, msg: &MailMessage) -> Result<(), ConnectorError>;
}

pub trait ArchiveConnector: Connector {
    fn zip(&self, src_dir: &std::path::Path, dest_zip: &std::path::Path) -> Result<(), ConnectorError>;
    fn unzip(&self, src_zip: &std::path::Path, dest_dir: &std::path::Path) -> Result<(), ConnectorError>;
}

/// A connector handed back from the registry/manager, already typed to
/// its kind contract. `kind()`/`close()` dispatch through the common base
/// without requiring the caller to know the concrete driver type.
#[derive(Clone)]
pub enum ConnectorHandle {
    Db(Arc<dyn DbConnector>),
    Rest(Arc<dyn RestConnector>),
    Sftp(Arc<dyn SftpConnector>),
    Smb(Arc<dyn SmbConnector>),
    Mail(Arc<dyn MailConnector>),
    Archive(Arc<dyn ArchiveConnector>),
}

impl ConnectorHandle {
    pub fn name(&self) -> &str {
        match self {
            ConnectorHandle::Db(c) => c.name(),
            ConnectorHandle::Rest(c) => c.name(),
            ConnectorHandle::Sftp(c) => c.name(),
            ConnectorHandle::Smb(c) => c.name(),
            ConnectorHandle::Mail(c) => c.name(),
            ConnectorHandle::Archive(c) => c.name(),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ConnectorHandle::Db(c) => c.kind(),
            ConnectorHandle::Rest(c) => c.kind(),
            ConnectorHandle::Sftp(c) => c.kind(),
            ConnectorHandle::Smb(c) => c.kind(),
            ConnectorHandle::Mail(c) => c.kind(),
            ConnectorHandle::Archive(c) => c.kind(),
        }
    }

    pub fn close(&self) -> Result<(), ConnectorError> {
        match self {
            ConnectorHandle::Db(c) => c.close(),
            ConnectorHandle::Rest(c) => c.close(),
            ConnectorHandle::Sftp(c) => c.close(),
            ConnectorHandle::Smb(c) => c.close(),
            ConnectorHandle::Mail(c) => c.close(),
            ConnectorHandle::Archive(c) => c.close(),
        }
    }

    pub fn as_db(&self) -> Option<&Arc<dyn DbConnector>> {
        match self {
            ConnectorHandle::Db(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_rest(&self) -> Option<&Arc<dyn RestConnector>> {
        match self {
            ConnectorHandle::Rest(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_sftp(&self) -> Option<&Arc<dyn SftpConnector>> {
        match self {
            ConnectorHandle::Sftp(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_smb(&self) -> Option<&Arc<dyn SmbConnector>> {
        match self {
            ConnectorHandle::Smb(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_mail(&self) -> Option<&Arc<dyn MailConnector>> {
        match self {
            ConnectorHandle::Mail(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_archive(&self) -> Option<&Arc<dyn ArchiveConnector>> {
        match self {
            ConnectorHandle::Archive(c) => Some(c),
            _ => None,
        }
    }
}
