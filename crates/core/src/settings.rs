// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed settings derived exclusively from an [`EnvSnapshot`] (§6 "Env vars
//! recognized", §9 "No global mutable config").
//!
//! The reference implementation reads `enterprise_mode`/`sandbox` as loose
//! string lookups directly off the env snapshot inside step code, and the
//! `Settings` model never actually carries them (see DESIGN.md, Open
//! Question (c)). Here they are promoted to real typed fields so the rest
//! of the crate can match on them instead of re-parsing strings.

use std::path::PathBuf;

use crate::env_snapshot::EnvSnapshot;
use crate::status::CachePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    InternalFast,
    Enterprise,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::InternalFast
    }
}

impl RunMode {
    pub fn is_enterprise(&self) -> bool {
        matches!(self, RunMode::Enterprise)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub work_root: PathBuf,
    pub state_root: PathBuf,
    pub plugin_paths: Vec<PathBuf>,
    pub plugin_strict: bool,
    pub strict_templates: bool,
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_module: Option<String>,
    pub connector_cache_default: CachePolicy,
    pub connector_cache_disabled: bool,
    pub secrets_module: Option<String>,
    pub secrets_path: Option<PathBuf>,
    pub mode: RunMode,
    pub strict_sandbox: bool,
    pub validate_env_strict: bool,
    pub profiles_file: Option<PathBuf>,
    pub profiles_json: Option<String>,
    pub env_files_json: Option<String>,
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Settings {
    /// Build settings from a sealed env snapshot. Never reads ambient
    /// `std::env`; the snapshot is the only source of truth.
    pub fn from_env(env: &EnvSnapshot) -> Self {
        let work_root = env
            .get("AETHERFLOW_WORK_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp/aetherflow/work"));
        let state_root = env
            .get("AETHERFLOW_STATE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp/aetherflow/state"));
        let plugin_paths = env
            .get("AETHERFLOW_PLUGIN_PATHS")
            .map(|raw| raw.split(',').filter(|s| !s.is_empty()).map(PathBuf::from).collect())
            .unwrap_or_default();
        let mode = match env.get("AETHERFLOW_MODE") {
            Some("enterprise") => RunMode::Enterprise,
            _ => RunMode::InternalFast,
        };
        let mode_enterprise_flag = env
            .get("AETHERFLOW_MODE_ENTERPRISE")
            .map(parse_bool)
            .unwrap_or(false);
        let mode = if mode_enterprise_flag { RunMode::Enterprise } else { mode };

        let connector_cache_default = match env.get("AETHERFLOW_CONNECTOR_CACHE_DEFAULT") {
            Some("process") => CachePolicy::Process,
            Some("none") => CachePolicy::None,
            _ => CachePolicy::Run,
        };

        let log_format = match env.get("AETHERFLOW_LOG_FORMAT") {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        // Enterprise mode clears the sandbox-disable override: only a
        // non-enterprise flow may turn the sandbox off.
        let strict_sandbox = if mode.is_enterprise() {
            true
        } else {
            env.get("AETHERFLOW_STRICT_SANDBOX").map(parse_bool).unwrap_or(true)
        };

        Self {
            work_root,
            state_root,
            plugin_paths,
            plugin_strict: env.get("AETHERFLOW_PLUGIN_STRICT").map(parse_bool).unwrap_or(false),
            strict_templates: env.get("AETHERFLOW_STRICT_TEMPLATES").map(parse_bool).unwrap_or(false),
            log_level: env.get("AETHERFLOW_LOG_LEVEL").unwrap_or("info").to_string(),
            log_format,
            metrics_module: env.get("AETHERFLOW_METRICS_MODULE").map(str::to_string),
            connector_cache_default,
            connector_cache_disabled: env
                .get("AETHERFLOW_CONNECTOR_CACHE_DISABLED")
                .map(parse_bool)
                .unwrap_or(false),
            secrets_module: env.get("AETHERFLOW_SECRETS_MODULE").map(str::to_string),
            secrets_path: env.get("AETHERFLOW_SECRETS_PATH").map(PathBuf::from),
            mode,
            strict_sandbox,
            validate_env_strict: env
                .get("AETHERFLOW_VALIDATE_ENV_STRICT")
                .map(parse_bool)
                .unwrap_or(false),
            profiles_file: env.get("AETHERFLOW_PROFILES_FILE").map(PathBuf::from),
            profiles_json: env.get("AETHERFLOW_PROFILES_JSON").map(str::to_string),
            env_files_json: env.get("AETHERFLOW_ENV_FILES_JSON").map(str::to_string),
        }
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
