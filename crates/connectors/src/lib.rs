// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aetherflow-connectors: the connector manager, registry, and kind
//! contracts (§4.5), plus reference drivers for each built-in kind.
//!
//! Real transports (an actual SFTP/SMB session, a production mail relay)
//! are out of this crate's scope per spec.md §1 — what's normative here is
//! the *contract* each driver of a kind must satisfy, and a reference
//! driver sufficient to exercise that contract end to end. The sftp/smb/
//! mail reference drivers shell out to system tools (`sftp`, `smbclient`,
//! `sendmail`) through the same subprocess-with-timeout helper, mirroring
//! how the archive `os` driver shells out to `zip`/`unzip`.

pub mod base;
pub mod drivers;
pub mod error;
pub mod manager;
mod process;
pub mod registry;

pub use base::{
    ArchiveConnector, Connector, ConnectorHandle, ConnectorInit, DbConnector, MailConnector,
    MailMessage, RestConnector, RestResponse, SftpConnector, SmbConnector,
};
pub use error::ConnectorError;
pub use manager::Connectors;
pub use registry::{builtin_registry, ConnectorRegistry};
