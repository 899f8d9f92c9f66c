// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aetherflow` — the run/validate/doctor/explain/bundle CLI (§6).

use std::path::PathBuf;
use std::process::ExitCode;

use aetherflow_cli::error::CliError;
use aetherflow_cli::ops::{self, Engines};
use aetherflow_cli::output::print_json;
use aetherflow_cli::table::{Align, CellStyle, Column, Table};
use aetherflow_core::{EnvSnapshot, LogFormat, Settings};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "aetherflow", version, about = "AetherFlow workflow execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a flow (§4.3).
    Run {
        #[arg(long)]
        flow_yaml: Option<PathBuf>,
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long)]
        flow_job: Option<String>,
        #[arg(long)]
        bundle_manifest: Option<PathBuf>,
        #[arg(long)]
        allow_stale_bundle: bool,
        #[arg(long)]
        json: bool,
    },
    /// Validate a flow without executing it (§4.2).
    Validate {
        #[arg(long)]
        flow_yaml: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Validate a flow and best-effort-probe each declared resource.
    Doctor {
        #[arg(long)]
        flow_yaml: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the execution plan without running anything.
    Explain {
        #[arg(long)]
        flow_yaml: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Bundle synchronizer operations (§4.4).
    Bundle {
        #[command(subcommand)]
        command: BundleCommand,
    },
}

#[derive(Subcommand)]
enum BundleCommand {
    /// Fetch and activate a bundle's declared source.
    Sync {
        #[arg(long)]
        bundle_manifest: PathBuf,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        print_local_root: bool,
        #[arg(long)]
        allow_stale_bundle: bool,
    },
    /// Read-only: report what the next sync would do.
    Status {
        #[arg(long)]
        bundle_manifest: PathBuf,
        #[arg(long)]
        json: bool,
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

    let ambient = EnvSnapshot::from_process_env();
    let boot_settings = Settings::from_env(&ambient);
    init_tracing(&boot_settings);

    match dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            exit_code(err.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn dispatch(command: Command) -> Result<ExitCode, CliError> {
    match command {
        Command::Run { flow_yaml, run_id, flow_job, bundle_manifest, allow_stale_bundle, json } => {
            run_cmd(flow_yaml, run_id, flow_job, bundle_manifest, allow_stale_bundle, json)
        }
        Command::Validate { flow_yaml, json } => validate_cmd(&flow_yaml, json),
        Command::Doctor { flow_yaml, json } => doctor_cmd(&flow_yaml, json),
        Command::Explain { flow_yaml, json } => explain_cmd(&flow_yaml, json),
        Command::Bundle { command } => match command {
            BundleCommand::Sync { bundle_manifest, json, print_local_root, allow_stale_bundle } => {
                bundle_sync_cmd(&bundle_manifest, allow_stale_bundle, json, print_local_root)
            }
            BundleCommand::Status { bundle_manifest, json } => bundle_status_cmd(&bundle_manifest, json),
        },
    }
}

fn build_engines() -> Result<Engines, CliError> {
    let settings = Settings::from_env(&EnvSnapshot::from_process_env());
    Engines::build(&settings)
}

#[allow(clippy::too_many_arguments)]
fn run_cmd(
    flow_yaml: Option<PathBuf>,
    run_id: Option<String>,
    flow_job: Option<String>,
    bundle_manifest: Option<PathBuf>,
    allow_stale_bundle: bool,
    json: bool,
) -> Result<ExitCode, CliError> {
    let engines = build_engines()?;
    let resolved = match (&flow_yaml, &bundle_manifest) {
        (Some(path), None) => ops::resolve_direct_flow(path, &engines)?,
        (None, Some(manifest)) => {
            let (resolved, _sync) = ops::resolve_bundle_flow(manifest, allow_stale_bundle, &engines)?;
            resolved
        }
        _ => return Err(CliError::msg("exactly one of --flow-yaml or --bundle-manifest must be given")),
    };

    let summary = ops::run(&resolved, &engines, run_id, flow_job)?;
    print_run_summary(&summary, json)?;

    let failed = summary.status_counts.get("failed").copied().unwrap_or(0);
    Ok(if failed > 0 { exit_code(1) } else { ExitCode::SUCCESS })
}

fn validate_cmd(flow_yaml: &PathBuf, json: bool) -> Result<ExitCode, CliError> {
    let engines = build_engines()?;
    let report = ops::validate(flow_yaml, &engines)?;
    if json {
        print_json(&report)?;
    } else {
        ops::print_validation_text(flow_yaml, &report, &mut std::io::stdout());
    }
    Ok(if report.ok { ExitCode::SUCCESS } else { exit_code(2) })
}

#[derive(Serialize)]
struct DoctorJson {
    ok: bool,
    errors: usize,
    warnings: usize,
    resources: Vec<DoctorResourceJson>,
}

#[derive(Serialize)]
struct DoctorResourceJson {
    name: String,
    kind: String,
    driver: String,
    ok: bool,
    error: Option<String>,
}

fn doctor_cmd(flow_yaml: &PathBuf, json: bool) -> Result<ExitCode, CliError> {
    let engines = build_engines()?;
    let doctor = ops::doctor(flow_yaml, &engines)?;

    if json {
        let out = DoctorJson {
            ok: doctor.report.ok,
            errors: doctor.report.errors.len(),
            warnings: doctor.report.warnings.len(),
            resources: doctor
                .resources
                .iter()
                .map(|r| DoctorResourceJson {
                    name: r.name.clone(),
                    kind: r.kind.clone(),
                    driver: r.driver.clone(),
                    ok: r.ok,
                    error: r.error.clone(),
                })
                .collect(),
        };
        print_json(&out)?;
    } else {
        ops::print_validation_text(flow_yaml, &doctor.report, &mut std::io::stdout());
        let mut table = Table::new(vec![
            Column::left("RESOURCE"),
            Column::left("KIND"),
            Column::left("DRIVER"),
            Column { name: "STATUS", align: Align::Left, style: CellStyle::Status, min_width: None, max_width: None },
            Column::muted("DETAIL").with_max(80),
        ]);
        for r in &doctor.resources {
            table.row(vec![
                r.name.clone(),
                r.kind.clone(),
                r.driver.clone(),
                if r.ok { "success".to_string() } else { "failed".to_string() },
                r.error.clone().unwrap_or_default(),
            ]);
        }
        table.render(&mut std::io::stdout());
    }

    let all_ok = doctor.report.ok && doctor.resources.iter().all(|r| r.ok);
    Ok(if all_ok { ExitCode::SUCCESS } else { exit_code(2) })
}

#[derive(Serialize)]
struct ExplainJson {
    ok: bool,
    jobs: Vec<ExplainJobJson>,
}

#[derive(Serialize)]
struct ExplainJobJson {
    job_id: String,
    depends_on: Vec<String>,
    when: Option<String>,
    steps: Vec<ExplainStepJson>,
}

#[derive(Serialize)]
struct ExplainStepJson {
    step_id: String,
    step_type: String,
}

fn explain_cmd(flow_yaml: &PathBuf, json: bool) -> Result<ExitCode, CliError> {
    let engines = build_engines()?;
    let explain = ops::explain(flow_yaml, &engines)?;

    if json {
        let out = ExplainJson {
            ok: explain.report.ok,
            jobs: explain
                .jobs
                .iter()
                .map(|j| ExplainJobJson {
                    job_id: j.job_id.clone(),
                    depends_on: j.depends_on.clone(),
                    when: j.when.clone(),
                    steps: j.steps.iter().map(|(id, t)| ExplainStepJson { step_id: id.clone(), step_type: t.clone() }).collect(),
                })
                .collect(),
        };
        print_json(&out)?;
    } else {
        ops::print_validation_text(flow_yaml, &explain.report, &mut std::io::stdout());
        let mut table = Table::new(vec![
            Column::left("JOB"),
            Column::left("DEPENDS_ON"),
            Column::muted("WHEN"),
            Column::left("STEPS"),
        ]);
        for j in &explain.jobs {
            let steps = j.steps.iter().map(|(id, t)| format!("{id}:{t}")).collect::<Vec<_>>().join(", ");
            table.row(vec![j.job_id.clone(), j.depends_on.join(","), j.when.clone().unwrap_or_default(), steps]);
        }
        table.render(&mut std::io::stdout());
    }

    Ok(if explain.report.ok { ExitCode::SUCCESS } else { exit_code(2) })
}

fn bundle_sync_cmd(manifest: &PathBuf, allow_stale_bundle: bool, json: bool, print_local_root: bool) -> Result<ExitCode, CliError> {
    let engines = build_engines()?;
    let result = ops::bundle_sync(manifest, allow_stale_bundle, &engines)?;

    if print_local_root {
        println!("{}", result.local_root.display());
    } else if json {
        #[derive(Serialize)]
        struct SyncJson<'a> {
            local_root: String,
            active_dir: String,
            cache_dir: String,
            fingerprints_dir: String,
            fingerprint: &'a str,
            changed: bool,
            fetched_files: &'a [String],
        }
        print_json(&SyncJson {
            local_root: result.local_root.display().to_string(),
            active_dir: result.active_dir.display().to_string(),
            cache_dir: result.cache_dir.display().to_string(),
            fingerprints_dir: result.fingerprints_dir.display().to_string(),
            fingerprint: &result.fingerprint,
            changed: result.changed,
            fetched_files: &result.fetched_files,
        })?;
    } else {
        println!("fingerprint: {}", result.fingerprint);
        println!("changed: {}", result.changed);
        println!("fetched_files: {}", result.fetched_files.len());
        for rel in &result.fetched_files {
            println!("  {rel}");
        }
        println!("active: {}", result.active_dir.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn bundle_status_cmd(manifest: &PathBuf, json: bool) -> Result<ExitCode, CliError> {
    let engines = build_engines()?;
    let status = ops::bundle_status_cmd(manifest, &engines)?;

    if json {
        #[derive(Serialize)]
        struct StatusJson<'a> {
            bundle_id: &'a str,
            active_dir: String,
            active_present: bool,
            recorded_fingerprint: &'a Option<String>,
            current_fingerprint: &'a Option<String>,
            would_change: Option<bool>,
            last_error: &'a Option<String>,
        }
        print_json(&StatusJson {
            bundle_id: &status.bundle_id,
            active_dir: status.active_dir.display().to_string(),
            active_present: status.active_present,
            recorded_fingerprint: &status.recorded_fingerprint,
            current_fingerprint: &status.current_fingerprint,
            would_change: status.would_change,
            last_error: &status.last_error,
        })?;
    } else {
        println!("bundle: {}", status.bundle_id);
        println!("active present: {}", status.active_present);
        println!("recorded fingerprint: {}", status.recorded_fingerprint.as_deref().unwrap_or("<none>"));
        match status.would_change {
            Some(changed) => println!("would change: {changed}"),
            None => println!("would change: <unknown, strict_fingerprint>"),
        }
        if let Some(err) = &status.last_error {
            println!("last error: {err}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_run_summary(summary: &aetherflow_engine::RunSummary, json: bool) -> Result<(), CliError> {
    if json {
        print_json(summary)?;
    } else {
        println!("flow_id: {}  run_id: {}  duration_ms: {}", summary.flow_id, summary.run_id, summary.duration_ms);
        let mut table = Table::new(vec![
            Column::left("JOB"),
            Column { name: "STATUS", align: Align::Left, style: CellStyle::Status, min_width: None, max_width: None },
            Column::right("DURATION_MS"),
            Column::muted("SKIP_REASON"),
        ]);
        for job in &summary.jobs {
            table.row(vec![
                job.job_id.clone(),
                job.status.as_str().to_string(),
                job.duration_ms.to_string(),
                job.skip_reason.clone().unwrap_or_default(),
            ]);
        }
        table.render(&mut std::io::stdout());
    }
    Ok(())
}
