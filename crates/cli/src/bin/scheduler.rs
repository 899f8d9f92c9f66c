// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aetherflow-scheduler` — the cron-driven supervisor binary (§4.6, §6
//! `scheduler run <scheduler.yaml>`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use aetherflow_cli::ops;
use aetherflow_core::{EnvSnapshot, LogFormat, Settings};
use aetherflow_engine::{run_scheduler, SchedulerItemSpec};
use clap::{Parser, Subcommand};
use tracing::error;

#[derive(Parser)]
#[command(name = "aetherflow-scheduler", version, about = "AetherFlow scheduler supervisor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the supervisor loop against a `scheduler.yaml` document until killed.
    Run {
        scheduler_yaml: PathBuf,
    },
}

fn init_tracing(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log_format {
        LogFormat::Json => {
            let _ = subscriber.json().try_init();
        }
        LogFormat::Text => {
            let _ = subscriber.try_init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let boot_settings = Settings::from_env(&EnvSnapshot::from_process_env());
    init_tracing(&boot_settings);

    let Command::Run { scheduler_yaml } = cli.command;
    match run(&scheduler_yaml) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(scheduler_yaml: &Path) -> Result<(), String> {
    let raw = std::fs::read_to_string(scheduler_yaml).map_err(|e| e.to_string())?;
    let base_dir = scheduler_yaml.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

    let dispatch: Arc<dyn Fn(&SchedulerItemSpec) + Send + Sync> = Arc::new(move |item: &SchedulerItemSpec| {
        let outcome = if let Some(flow_yaml) = &item.flow_yaml {
            let path = ops::resolve_relative(&base_dir, flow_yaml);
            ops::run_scheduled_flow(&path, item.flow_job.clone())
        } else if let Some(bundle_manifest) = &item.bundle_manifest {
            let path = ops::resolve_relative(&base_dir, bundle_manifest);
            ops::run_scheduled_bundle(&path, item.allow_stale_bundle, item.flow_job.clone())
        } else {
            unreachable!("scheduler item validated to have exactly one of flow_yaml/bundle_manifest")
        };

        match outcome {
            Ok(summary) => {
                tracing::info!(
                    id = %item.id,
                    run_id = %summary.run_id,
                    duration_ms = summary.duration_ms,
                    "scheduled run completed"
                );
            }
            Err(err) => {
                error!(id = %item.id, error = %err, "scheduled run failed");
            }
        }
    });

    run_scheduler(&raw, Duration::from_secs(1), None, dispatch).map_err(|e| e.to_string())
}
