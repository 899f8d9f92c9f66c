// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! aetherflow-cli: the CLI surface (§6) shared between the `aetherflow`
//! binary and the `aetherflow-scheduler` supervisor binary.
//!
//! `ops` carries the entrypoint-shared sequence (§4.2 "a single validation
//! pipeline for every entrypoint") so both binaries — and tests — drive
//! the exact same path from a flow/manifest file to a [`aetherflow_engine::RunSummary`].

pub mod color;
pub mod error;
pub mod ops;
pub mod output;
pub mod table;

pub use error::CliError;
