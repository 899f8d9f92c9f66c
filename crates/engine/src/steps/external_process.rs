// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `external.process` (§C): spawn a command, optionally through a shell,
//! with idempotency (`marker`/`atomic_dir`), success criteria, and a
//! retry/backoff loop around timeout and exit-code escalation.
//!
//! Grounded in the original `ExternalProcess` builtin, simplified from its
//! per-line streaming-thread log capture to the synchronous
//! capture-after-exit shape `aetherflow-connectors`' `process::run_with_timeout`
//! already uses for the process-backed connector drivers.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::{Map, Value};

use aetherflow_validate::Issue;

use crate::error::StepError;
use crate::registry::{Step, StepOutcome, StepRegistry, StepRunContext};

use super::check_success;

pub struct ExternalProcessStep;

const LOG_MODES: [&str; 4] = ["inherit", "capture", "file", "discard"];

fn obj<'a>(v: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    v.get(key).and_then(Value::as_object)
}

fn str_field(v: &Map<String, Value>, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(v: &Map<String, Value>, key: &str, default: bool) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn f64_field(v: &Map<String, Value>, key: &str, default: f64) -> f64 {
    v.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn u32_field(v: &Map<String, Value>, key: &str, default: u32) -> u32 {
    v.get(key).and_then(Value::as_u64).map(|n| n as u32).unwrap_or(default)
}

fn i64_list(v: &Map<String, Value>, key: &str, default: &[i64]) -> Vec<i64> {
    match v.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
        _ => default.to_vec(),
    }
}

fn command_parts(inputs: &Map<String, Value>) -> Result<Vec<String>, StepError> {
    let mut parts = match inputs.get("command") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => out.push(s.to_string()),
                    None => return Err(StepError::InvalidInput { field: "command".into(), msg: "array entries must be strings".into() }),
                }
            }
            out
        }
        _ => return Err(StepError::MissingInput("command".into())),
    };
    if let Some(Value::Array(args)) = inputs.get("args") {
        for a in args {
            if let Some(s) = a.as_str() {
                parts.push(s.to_string());
            }
        }
    }
    if parts.is_empty() {
        return Err(StepError::InvalidInput { field: "command".into(), msg: "command must not be empty".into() });
    }
    Ok(parts)
}

/// Mimic `shlex.quote`: wrap in single quotes, escaping embedded ones.
fn shell_quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || "@%_-+=:,./".contains(c)) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

struct RunOutcome {
    exit_code: i32,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

fn spawn_and_wait(
    mut cmd: Command,
    timeout: Option<Duration>,
    kill_grace: Duration,
    capture_stdout: bool,
    capture_stderr: bool,
) -> Result<RunOutcome, StepError> {
    if capture_stdout {
        cmd.stdout(Stdio::piped());
    }
    if capture_stderr {
        cmd.stderr(Stdio::piped());
    }
    let mut child = cmd.spawn()?;
    let start = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            let mut stdout = String::new();
            let mut stderr = String::new();
            if let Some(mut out) = child.stdout.take() {
                use std::io::Read;
                let _ = out.read_to_string(&mut stdout);
            }
            if let Some(mut err) = child.stderr.take() {
                use std::io::Read;
                let _ = err.read_to_string(&mut stderr);
            }
            return Ok(RunOutcome { exit_code: status.code().unwrap_or(-1), stdout, stderr, timed_out: false });
        }
        if let Some(timeout) = timeout {
            if start.elapsed() >= timeout {
                let _ = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM);
                let grace_start = Instant::now();
                loop {
                    if child.try_wait()?.is_some() {
                        break;
                    }
                    if grace_start.elapsed() >= kill_grace {
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
                return Ok(RunOutcome { exit_code: -1, stdout: String::new(), stderr: String::new(), timed_out: true });
            }
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

fn backoff_delay(attempt: u32, backoff_seconds: f64, multiplier: f64, max_backoff: Option<f64>) -> Duration {
    let exp = attempt.saturating_sub(1) as i32;
    let mut delay = backoff_seconds * multiplier.powi(exp);
    if let Some(max) = max_backoff {
        delay = delay.min(max);
    }
    Duration::from_secs_f64(delay.max(0.0))
}

impl Step for ExternalProcessStep {
    fn validate(&self, inputs: &Map<String, Value>, loc: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        match inputs.get("command") {
            None => issues.push(Issue::new("missing_input", format!("{loc}.inputs.command"), "external.process requires `command`")),
            Some(Value::String(_)) | Some(Value::Array(_)) => {}
            Some(_) => issues.push(Issue::new("invalid_input", format!("{loc}.inputs.command"), "`command` must be a string or list of strings")),
        }

        if let Some(log) = obj(inputs, "log") {
            for stream in ["stdout", "stderr"] {
                if let Some(mode) = str_field(log, stream) {
                    if !LOG_MODES.contains(&mode.as_str()) {
                        issues.push(Issue::new(
                            "invalid_input",
                            format!("{loc}.inputs.log.{stream}"),
                            format!("`{mode}` is not one of {LOG_MODES:?}"),
                        ));
                    }
                }
            }
        }

        if let Some(idem) = obj(inputs, "idempotency") {
            if str_field(idem, "strategy").as_deref() == Some("atomic_dir")
                && (idem.get("temp_output_dir").is_none() || idem.get("final_output_dir").is_none())
            {
                issues.push(Issue::new(
                    "invalid_input",
                    format!("{loc}.inputs.idempotency"),
                    "`atomic_dir` idempotency requires both `temp_output_dir` and `final_output_dir`",
                ));
            }
        }
        issues
    }

    fn run(&self, inputs: &Map<String, Value>, ctx: &StepRunContext, _registry: &StepRegistry) -> Result<StepOutcome, StepError> {
        let empty = Map::new();
        let success_spec = obj(inputs, "success").unwrap_or(&empty);
        let idem_spec = obj(inputs, "idempotency").unwrap_or(&empty);
        let strategy = str_field(idem_spec, "strategy").unwrap_or_else(|| "none".to_string());

        if strategy == "marker" {
            let mut spec = success_spec.clone();
            if let Some(marker) = idem_spec.get("marker_path").cloned() {
                spec.insert("marker_file".to_string(), marker);
            }
            let (ok, _) = check_success(ctx, &spec)?;
            if ok {
                return Ok(StepOutcome::Skipped { reason: "marker_present".to_string() });
            }
        }

        let (temp_dir, final_dir) = if strategy == "atomic_dir" {
            let temp = ctx.resolve(&str_field(idem_spec, "temp_output_dir").ok_or_else(|| StepError::MissingInput("idempotency.temp_output_dir".into()))?)?;
            let fin = ctx.resolve(&str_field(idem_spec, "final_output_dir").ok_or_else(|| StepError::MissingInput("idempotency.final_output_dir".into()))?)?;
            if temp.exists() {
                std::fs::remove_dir_all(&temp)?;
            }
            std::fs::create_dir_all(&temp)?;
            (Some(temp), Some(fin))
        } else {
            (None, None)
        };

        let parts = command_parts(inputs)?;
        let shell = bool_field(inputs, "shell", false);
        let cwd = match inputs.get("cwd").and_then(Value::as_str) {
            Some(p) => ctx.resolve(p)?,
            None => ctx.artifacts_dir.to_path_buf(),
        };

        let inherit_env = bool_field(inputs, "inherit_env", true);
        let mut env_vars: Vec<(String, String)> = if inherit_env {
            ctx.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        } else {
            Vec::new()
        };
        env_vars.push(("AETHERFLOW_FLOW_ID".to_string(), ctx.flow_id.to_string()));
        env_vars.push(("AETHERFLOW_RUN_ID".to_string(), ctx.run_id.to_string()));
        if let Some(temp) = &temp_dir {
            env_vars.push(("AETHERFLOW_OUTPUT_DIR".to_string(), temp.display().to_string()));
        }
        if let Some(Value::Object(overrides)) = inputs.get("env") {
            for (k, v) in overrides {
                let s = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                env_vars.push((k.clone(), s));
            }
        }

        let log_spec = obj(inputs, "log").unwrap_or(&empty);
        let stdout_mode = str_field(log_spec, "stdout").unwrap_or_else(|| "inherit".to_string());
        let stderr_mode = str_field(log_spec, "stderr").unwrap_or_else(|| "inherit".to_string());
        let capture_stdout = stdout_mode != "inherit";
        let capture_stderr = stderr_mode != "inherit";
        let max_capture_bytes = (f64_field(log_spec, "max_capture_kb", 1024.0) * 1024.0) as usize;

        let timeout = inputs.get("timeout_seconds").and_then(Value::as_f64).map(Duration::from_secs_f64);
        let kill_grace = Duration::from_secs_f64(f64_field(inputs, "kill_grace_seconds", 15.0));

        let max_attempts = u32_field(obj(inputs, "retry").unwrap_or(&empty), "max_attempts", 1).max(1);
        let retry_spec = obj(inputs, "retry").unwrap_or(&empty);
        let backoff_seconds = f64_field(retry_spec, "backoff_seconds", 0.0);
        let backoff_multiplier = f64_field(retry_spec, "backoff_multiplier", 2.0);
        let max_backoff = retry_spec.get("max_backoff_seconds").and_then(Value::as_f64);
        let retry_on_timeout = bool_field(retry_spec, "retry_on_timeout", false);
        let retry_on_exit_codes = i64_list(retry_spec, "retry_on_exit_codes", &[]);
        let success_exit_codes = i64_list(success_spec, "exit_codes", &[0]);

        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            let mut cmd = if shell {
                let joined = parts.iter().map(|p| shell_quote(p)).collect::<Vec<_>>().join(" ");
                let mut c = Command::new("sh");
                c.arg("-c").arg(joined);
                c
            } else {
                let mut c = Command::new(&parts[0]);
                c.args(&parts[1..]);
                c
            };
            cmd.current_dir(&cwd);
            cmd.env_clear();
            cmd.envs(env_vars.iter().cloned());

            let run = spawn_and_wait(cmd, timeout, kill_grace, capture_stdout, capture_stderr)?;

            if run.timed_out {
                if retry_on_timeout && attempt < max_attempts {
                    std::thread::sleep(backoff_delay(attempt, backoff_seconds, backoff_multiplier, max_backoff));
                    continue;
                }
                return Err(StepError::Timeout(timeout.map(|t| t.as_secs_f64()).unwrap_or(0.0)));
            }

            if success_exit_codes.contains(&(run.exit_code as i64)) {
                break run;
            }
            let retryable = retry_on_exit_codes.contains(&(run.exit_code as i64));
            if retryable && attempt < max_attempts {
                std::thread::sleep(backoff_delay(attempt, backoff_seconds, backoff_multiplier, max_backoff));
                continue;
            }
            return Err(StepError::NonZeroExit(run.exit_code));
        };

        let (ok, reason) = check_success(ctx, success_spec)?;
        if !ok {
            return Err(StepError::SuccessCriteria(reason.unwrap_or_default()));
        }

        if let (Some(temp), Some(fin)) = (&temp_dir, &final_dir) {
            let atomic_rename = bool_field(idem_spec, "atomic_rename", true);
            if let Some(parent) = fin.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if fin.exists() {
                std::fs::remove_dir_all(fin)?;
            }
            if atomic_rename {
                std::fs::rename(temp, fin)?;
            } else {
                copy_dir_recursive(temp, fin)?;
                std::fs::remove_dir_all(temp)?;
            }
        }

        let mut output = Map::new();
        output.insert("exit_code".to_string(), Value::from(outcome.exit_code));
        output.insert("attempts".to_string(), Value::from(attempt));
        if capture_stdout {
            output.insert("stdout".to_string(), Value::String(truncate_utf8(&outcome.stdout, max_capture_bytes)));
        }
        if capture_stderr {
            output.insert("stderr".to_string(), Value::String(truncate_utf8(&outcome.stderr, max_capture_bytes)));
        }
        if stdout_mode == "file" || stderr_mode == "file" {
            if let Some(path) = str_field(log_spec, "file_path") {
                let log_file = ctx.resolve(&path)?;
                if let Some(parent) = log_file.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut combined = String::new();
                combined.push_str(&outcome.stdout);
                combined.push_str(&outcome.stderr);
                std::fs::write(&log_file, combined)?;
                output.insert("log_file".to_string(), Value::String(log_file.display().to_string()));
            }
        }
        if let Some(Value::Object(literal)) = inputs.get("outputs") {
            for (k, v) in literal {
                output.insert(k.clone(), v.clone());
            }
        }

        Ok(StepOutcome::Success(output))
    }
}

fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn copy_dir_recursive(src: &std::path::Path, dst: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &to)?;
        } else {
            std::fs::copy(entry.path(), to)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "external_process_tests.rs"]
mod tests;
