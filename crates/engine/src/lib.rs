// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The AetherFlow run executor (§4.3): step registry, built-in steps,
//! resource materialization, and the scheduler supervisor (§4.6).

pub mod context;
pub mod env;
pub mod error;
pub mod executor;
pub mod observer;
pub mod plugins;
pub mod registry;
pub mod sandbox;
pub mod scheduler;
pub mod secrets;
pub mod state;
pub mod steps;

pub use context::{build_env_snapshot, cleanup_job_dir, create_job_dirs, materialize_resources, BundleInjection, JobDirs};
pub use error::{ExecuteError, StateError, StepError};
pub use executor::{run_flow, JobOutcome, RunOptions, RunSummary, StepOutcomeRecord};
pub use observer::{LogRunObserver, NullRunObserver, RunObserver};
pub use plugins::{compiled_plugins, load_plugins, Plugin};
pub use registry::{builtin_registry, Step, StepOutcome, StepRegistry, StepRunContext};
pub use sandbox::{resolve_path, AllowedRoots};
pub use scheduler::{run_scheduler, ScheduledItem, Scheduler, SchedulerItemSpec};
pub use secrets::load_secrets_provider;
pub use state::{open_state_store, StateStore};
