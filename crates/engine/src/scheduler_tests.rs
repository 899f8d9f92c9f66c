// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{TimeZone, Utc};

use super::*;

#[test]
fn parses_wildcard_and_list_and_step_fields() {
    let cron = CronExpr::parse("*/15 9-17 1,15 * 1-5").unwrap();
    let fire = Utc.with_ymd_and_hms(2026, 7, 1, 9, 15, 0).unwrap(); // Wed
    assert!(cron.matches(&fire));

    let off_minute = Utc.with_ymd_and_hms(2026, 7, 1, 9, 16, 0).unwrap();
    assert!(!cron.matches(&off_minute));

    let weekend = Utc.with_ymd_and_hms(2026, 7, 4, 9, 15, 0).unwrap(); // Sat
    assert!(!cron.matches(&weekend));
}

#[test]
fn rejects_expressions_without_five_fields() {
    assert!(CronExpr::parse("* * *").is_err());
}

#[test]
fn rejects_out_of_range_values() {
    assert!(CronExpr::parse("60 * * * *").is_err());
}

#[test]
fn scheduler_file_requires_exactly_one_target() {
    let both = r#"
version: 1
items:
  - id: a
    cron: "* * * * *"
    flow_yaml: flow.yaml
    bundle_manifest: manifest.yaml
"#;
    assert!(parse_scheduler_file(both).is_err());

    let neither = r#"
version: 1
items:
  - id: a
    cron: "* * * * *"
"#;
    assert!(parse_scheduler_file(neither).is_err());

    let ok = r#"
version: 1
timezone: "Europe/Berlin"
items:
  - id: a
    cron: "* * * * *"
    flow_yaml: flow.yaml
"#;
    let cfg = parse_scheduler_file(ok).unwrap();
    assert_eq!(cfg.items.len(), 1);
    assert_eq!(cfg.timezone, "Europe/Berlin");
}

#[test]
fn tick_fires_due_items_exactly_once_per_minute() {
    let spec = SchedulerItemSpec {
        id: "hourly".to_string(),
        cron: "* * * * *".to_string(),
        flow_yaml: Some("flow.yaml".to_string()),
        bundle_manifest: None,
        flow_job: None,
        allow_stale_bundle: false,
        misfire_grace_time: 300,
    };
    let item = ScheduledItem::new(spec).unwrap();
    let mut scheduler = Scheduler::new(vec![item]);

    let fire_count = Arc::new(AtomicUsize::new(0));
    let dispatch_count = fire_count.clone();
    let dispatch: Arc<dyn Fn(&SchedulerItemSpec) + Send + Sync> =
        Arc::new(move |_spec: &SchedulerItemSpec| {
            dispatch_count.fetch_add(1, Ordering::SeqCst);
        });

    let now = Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap();
    scheduler.tick(now, dispatch.clone());
    // give the spawned dispatch thread a moment to run and release the flag
    std::thread::sleep(StdDuration::from_millis(50));
    scheduler.tick(now, dispatch.clone());
    std::thread::sleep(StdDuration::from_millis(50));

    assert_eq!(fire_count.load(Ordering::SeqCst), 1, "same minute must not refire");
}

#[test]
fn tick_skips_items_not_yet_due() {
    let spec = SchedulerItemSpec {
        id: "midnight".to_string(),
        cron: "0 0 * * *".to_string(),
        flow_yaml: Some("flow.yaml".to_string()),
        bundle_manifest: None,
        flow_job: None,
        allow_stale_bundle: false,
        misfire_grace_time: 300,
    };
    let item = ScheduledItem::new(spec).unwrap();
    let mut scheduler = Scheduler::new(vec![item]);

    let fire_count = Arc::new(AtomicUsize::new(0));
    let dispatch_count = fire_count.clone();
    let dispatch: Arc<dyn Fn(&SchedulerItemSpec) + Send + Sync> =
        Arc::new(move |_spec: &SchedulerItemSpec| {
            dispatch_count.fetch_add(1, Ordering::SeqCst);
        });

    let now = Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap();
    scheduler.tick(now, dispatch);
    std::thread::sleep(StdDuration::from_millis(50));

    assert_eq!(fire_count.load(Ordering::SeqCst), 0);
}

#[test]
fn run_scheduler_honors_max_ticks_and_dispatches() {
    let yaml = r#"
version: 1
items:
  - id: a
    cron: "* * * * *"
    flow_yaml: flow.yaml
"#;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_inner = calls.clone();
    let dispatch: Arc<dyn Fn(&SchedulerItemSpec) + Send + Sync> =
        Arc::new(move |_spec: &SchedulerItemSpec| {
            calls_inner.fetch_add(1, Ordering::SeqCst);
        });

    run_scheduler(yaml, StdDuration::from_millis(10), Some(2), dispatch).unwrap();
    std::thread::sleep(StdDuration::from_millis(50));

    assert!(calls.load(Ordering::SeqCst) >= 1);
}
