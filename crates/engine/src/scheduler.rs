// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cron-driven scheduler supervisor (§4.6), grounded in the original's
//! `scheduler.py` (APScheduler `BackgroundScheduler` + `CronTrigger`,
//! `max_instances=1`, `coalesce=True`, `misfire_grace_time`).
//!
//! APScheduler has no Rust counterpart in this workspace's dependency
//! stack, so the cron grammar (5-field, `*`/list/range/step) and the
//! per-tick matcher are hand-rolled over `chrono`, which the teacher
//! already depends on for every other timestamp in this codebase.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ExecuteError;

// ---------------------------------------------------------------------
// scheduler.yaml document model
// ---------------------------------------------------------------------

fn default_version() -> u32 {
    1
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_misfire_grace() -> u64 {
    300
}

/// One `scheduler.yaml` entry. Exactly one of `flow_yaml`/`bundle_manifest`
/// must be set, mirroring the original's `model_post_init` XOR check.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerItemSpec {
    pub id: String,
    pub cron: String,
    #[serde(default)]
    pub flow_yaml: Option<String>,
    #[serde(default)]
    pub bundle_manifest: Option<String>,
    #[serde(default)]
    pub flow_job: Option<String>,
    #[serde(default)]
    pub allow_stale_bundle: bool,
    #[serde(default = "default_misfire_grace")]
    pub misfire_grace_time: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerFileSpec {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub items: Vec<SchedulerItemSpec>,
}

/// Parse and structurally validate a `scheduler.yaml` document.
pub fn parse_scheduler_file(raw: &str) -> Result<SchedulerFileSpec, ExecuteError> {
    let cfg: SchedulerFileSpec =
        serde_yaml::from_str(raw).map_err(|e| ExecuteError::Other(format!("invalid scheduler file: {e}")))?;
    for item in &cfg.items {
        let have_manifest = item.bundle_manifest.is_some();
        let have_flow = item.flow_yaml.is_some();
        if have_manifest == have_flow {
            return Err(ExecuteError::Other(format!(
                "scheduler item `{}` must set exactly one of `bundle_manifest` or `flow_yaml`",
                item.id
            )));
        }
    }
    Ok(cfg)
}

// ---------------------------------------------------------------------
// cron grammar: 5-field minute/hour/day-of-month/month/day-of-week
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
enum CronField {
    Any,
    Values(Vec<u32>),
}

impl CronField {
    fn matches(&self, v: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Values(vs) => vs.contains(&v),
        }
    }
}

fn parse_bound(raw: &str) -> Result<u32, ExecuteError> {
    raw.parse().map_err(|_| ExecuteError::Other(format!("invalid cron field value `{raw}`")))
}

fn parse_field(raw: &str, min: u32, max: u32) -> Result<CronField, ExecuteError> {
    if raw == "*" {
        return Ok(CronField::Any);
    }
    let mut values = Vec::new();
    for part in raw.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(parse_bound(step)?)),
            None => (part, None),
        };
        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_bound(a)?, parse_bound(b)?)
        } else {
            let v = parse_bound(range)?;
            (v, v)
        };
        let step = step.unwrap_or(1).max(1);
        let mut v = lo;
        while v <= hi {
            values.push(v);
            v += step;
        }
    }
    for v in &values {
        if *v < min || *v > max {
            return Err(ExecuteError::Other(format!("cron field value `{v}` outside range {min}-{max}")));
        }
    }
    Ok(CronField::Values(values))
}

/// A parsed 5-field cron expression, matched at minute granularity.
#[derive(Debug, Clone)]
pub struct CronExpr {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, ExecuteError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ExecuteError::Other(format!(
                "cron expression `{expr}` must have 5 space-separated fields, got {}",
                fields.len()
            )));
        }
        Ok(Self {
            minute: parse_field(fields[0], 0, 59)?,
            hour: parse_field(fields[1], 0, 23)?,
            day_of_month: parse_field(fields[2], 1, 31)?,
            month: parse_field(fields[3], 1, 12)?,
            day_of_week: parse_field(fields[4], 0, 6)?,
        })
    }

    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day_of_month.matches(dt.day())
            && self.month.matches(dt.month())
            && self.day_of_week.matches(dt.weekday().num_days_from_sunday())
    }
}

// ---------------------------------------------------------------------
// supervisor
// ---------------------------------------------------------------------

/// A scheduler item with its cron expression already parsed (parse once
/// at load, matching the restricted `when` AST's own convention).
pub struct ScheduledItem {
    pub spec: SchedulerItemSpec,
    pub cron: CronExpr,
}

impl ScheduledItem {
    pub fn new(spec: SchedulerItemSpec) -> Result<Self, ExecuteError> {
        let cron = CronExpr::parse(&spec.cron)?;
        Ok(Self { spec, cron })
    }
}

/// Supervises a fixed set of scheduled items: cron-gated firing,
/// `max_instances=1` per item (a fire is dropped rather than queued while
/// its predecessor is still running), and `misfire_grace_time` bounding
/// how long a missed minute may still coalesce into a later fire.
pub struct Scheduler {
    items: Vec<ScheduledItem>,
    running: HashMap<String, Arc<AtomicBool>>,
    pending_since: HashMap<String, DateTime<Utc>>,
    last_fired_minute: HashMap<String, i64>,
}

impl Scheduler {
    pub fn new(items: Vec<ScheduledItem>) -> Self {
        let running = items.iter().map(|i| (i.spec.id.clone(), Arc::new(AtomicBool::new(false)))).collect();
        Self { items, running, pending_since: HashMap::new(), last_fired_minute: HashMap::new() }
    }

    /// Evaluate every item against `now`. A due item not already running
    /// is dispatched on its own thread; `dispatch` is expected to block
    /// for the duration of the run it triggers.
    pub fn tick(&mut self, now: DateTime<Utc>, dispatch: Arc<dyn Fn(&SchedulerItemSpec) + Send + Sync>) {
        let minute_key = now.timestamp().div_euclid(60);

        for item in &self.items {
            if item.cron.matches(&now) {
                self.pending_since.entry(item.spec.id.clone()).or_insert(now);
            }
            let Some(first_due) = self.pending_since.get(&item.spec.id).copied() else {
                continue;
            };
            if self.last_fired_minute.get(&item.spec.id) == Some(&minute_key) {
                continue;
            }

            let waited = (now - first_due).num_seconds();
            if waited > item.spec.misfire_grace_time as i64 && !item.cron.matches(&now) {
                warn!(id = %item.spec.id, waited_seconds = waited, "misfire grace window expired; dropping fire");
                self.pending_since.remove(&item.spec.id);
                continue;
            }

            let running = self.running.get(&item.spec.id).expect("initialized in new()").clone();
            if running.swap(true, Ordering::SeqCst) {
                // max_instances=1: a prior fire is still in flight; this
                // one coalesces into whatever the next due tick produces.
                continue;
            }
            self.pending_since.remove(&item.spec.id);
            self.last_fired_minute.insert(item.spec.id.clone(), minute_key);

            info!(id = %item.spec.id, cron = %item.spec.cron, "scheduled item fired");
            let spec = item.spec.clone();
            let dispatch = Arc::clone(&dispatch);
            thread::spawn(move || {
                dispatch(&spec);
                running.store(false, Ordering::SeqCst);
            });
        }
    }
}

/// Run the supervisor loop: parse `scheduler.yaml`, build one
/// [`ScheduledItem`] per entry, and tick every `tick_interval` until
/// `max_ticks` is exhausted (`None` runs forever, matching the original's
/// `while True: time.sleep(1)`).
pub fn run_scheduler(
    scheduler_yaml: &str,
    tick_interval: StdDuration,
    max_ticks: Option<u64>,
    dispatch: Arc<dyn Fn(&SchedulerItemSpec) + Send + Sync>,
) -> Result<(), ExecuteError> {
    let cfg = parse_scheduler_file(scheduler_yaml)?;
    let items = cfg
        .items
        .into_iter()
        .map(ScheduledItem::new)
        .collect::<Result<Vec<_>, _>>()?;

    for item in &items {
        info!(id = %item.spec.id, cron = %item.spec.cron, "scheduled {} -> {}", item.spec.id, item.spec.cron);
    }

    let mut scheduler = Scheduler::new(items);
    let mut ticks = 0u64;
    loop {
        scheduler.tick(Utc::now(), Arc::clone(&dispatch));
        ticks += 1;
        if max_ticks.is_some_and(|max| ticks >= max) {
            return Ok(());
        }
        thread::sleep(tick_interval);
    }
}

/// Load a manifest path reference as a [`PathBuf`], a thin helper kept
/// for CLI callers resolving `flow_yaml`/`bundle_manifest` relative to the
/// scheduler file's own directory.
pub fn resolve_relative(base_dir: &std::path::Path, raw: &str) -> PathBuf {
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() {
        candidate
    } else {
        base_dir.join(candidate)
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
