// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted state store (§3 "State store", §5 "single-writer
//! discipline ... TTL locks use atomic insert-if-absent semantics and a
//! sweep of expired rows on each acquire attempt").
//!
//! spec.md §1 treats this store as an external collaborator specified only
//! at its interface; this module supplies the concrete implementation a
//! runnable repo needs, in the two shapes `StateSpec.backend` names:
//! `sqlite` (via `rusqlite`, already pulled in by `aetherflow-connectors`'
//! db driver) and `file` (a directory of JSON files, for hosts without a
//! writable sqlite path).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aetherflow_core::{JobStatus, StepStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StateError;

pub trait StateStore: Send + Sync {
    fn get_job_status(&self, job_id: &str, run_id: &str) -> Result<Option<JobStatus>, StateError>;
    fn set_job_status(&self, job_id: &str, run_id: &str, status: JobStatus) -> Result<(), StateError>;

    fn get_step_status(&self, job_id: &str, run_id: &str, step_id: &str) -> Result<Option<StepStatus>, StateError>;
    fn set_step_status(
        &self,
        job_id: &str,
        run_id: &str,
        step_id: &str,
        status: StepStatus,
        output: Option<&Value>,
    ) -> Result<(), StateError>;
    fn get_step_output(&self, job_id: &str, run_id: &str, step_id: &str) -> Result<Option<Value>, StateError>;

    /// Atomic insert-if-absent with a TTL sweep. Returns true if `owner`
    /// now holds the lock (either freshly acquired or already its own).
    fn try_acquire_lock(&self, key: &str, owner: &str, ttl_seconds: u64, now_unix: i64) -> Result<bool, StateError>;
    fn release_lock(&self, key: &str, owner: &str) -> Result<(), StateError>;
}

/// Build the configured backend from `FlowMeta.state` (§3).
pub fn open_state_store(backend: &str, path: &Path) -> Result<Box<dyn StateStore>, StateError> {
    match backend {
        "sqlite" => Ok(Box::new(SqliteStateStore::open(path)?)),
        "file" => Ok(Box::new(FileStateStore::open(path)?)),
        other => Err(StateError::UnknownBackend(other.to_string())),
    }
}

// ---------------------------------------------------------------------
// sqlite backend
// ---------------------------------------------------------------------

pub struct SqliteStateStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStateStore {
    pub fn open(path: &Path) -> Result<Self, StateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS job_runs (
                job_id TEXT NOT NULL, run_id TEXT NOT NULL, status TEXT NOT NULL,
                PRIMARY KEY (job_id, run_id)
            );
            CREATE TABLE IF NOT EXISTS step_runs (
                job_id TEXT NOT NULL, run_id TEXT NOT NULL, step_id TEXT NOT NULL,
                status TEXT NOT NULL, output TEXT,
                PRIMARY KEY (job_id, run_id, step_id)
            );
            CREATE TABLE IF NOT EXISTS locks (
                key TEXT PRIMARY KEY, owner TEXT NOT NULL, expires_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Self {
        let conn = rusqlite::Connection::open_in_memory().expect("in-memory sqlite");
        conn.execute_batch(
            "CREATE TABLE job_runs (job_id TEXT, run_id TEXT, status TEXT, PRIMARY KEY (job_id, run_id));
             CREATE TABLE step_runs (job_id TEXT, run_id TEXT, step_id TEXT, status TEXT, output TEXT, PRIMARY KEY (job_id, run_id, step_id));
             CREATE TABLE locks (key TEXT PRIMARY KEY, owner TEXT, expires_at INTEGER);",
        )
        .expect("create tables");
        Self { conn: Mutex::new(conn) }
    }
}

fn job_status_from_str(s: &str) -> Option<JobStatus> {
    serde_json::from_value(Value::String(s.to_string())).ok()
}

fn step_status_from_str(s: &str) -> Option<StepStatus> {
    serde_json::from_value(Value::String(s.to_string())).ok()
}

fn status_str<T: Serialize>(status: &T) -> String {
    match serde_json::to_value(status) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

impl StateStore for SqliteStateStore {
    fn get_job_status(&self, job_id: &str, run_id: &str) -> Result<Option<JobStatus>, StateError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT status FROM job_runs WHERE job_id = ?1 AND run_id = ?2")?;
        let status: Option<String> = stmt
            .query_row(rusqlite::params![job_id, run_id], |row| row.get(0))
            .ok();
        Ok(status.and_then(|s| job_status_from_str(&s)))
    }

    fn set_job_status(&self, job_id: &str, run_id: &str, status: JobStatus) -> Result<(), StateError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO job_runs (job_id, run_id, status) VALUES (?1, ?2, ?3)
             ON CONFLICT(job_id, run_id) DO UPDATE SET status = excluded.status",
            rusqlite::params![job_id, run_id, status_str(&status)],
        )?;
        Ok(())
    }

    fn get_step_status(&self, job_id: &str, run_id: &str, step_id: &str) -> Result<Option<StepStatus>, StateError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT status FROM step_runs WHERE job_id = ?1 AND run_id = ?2 AND step_id = ?3")?;
        let status: Option<String> = stmt
            .query_row(rusqlite::params![job_id, run_id, step_id], |row| row.get(0))
            .ok();
        Ok(status.and_then(|s| step_status_from_str(&s)))
    }

    fn set_step_status(
        &self,
        job_id: &str,
        run_id: &str,
        step_id: &str,
        status: StepStatus,
        output: Option<&Value>,
    ) -> Result<(), StateError> {
        let conn = self.conn.lock();
        let output_json = output.map(serde_json::to_string).transpose()?;
        conn.execute(
            "INSERT INTO step_runs (job_id, run_id, step_id, status, output) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(job_id, run_id, step_id) DO UPDATE SET status = excluded.status, output = excluded.output",
            rusqlite::params![job_id, run_id, step_id, status_str(&status), output_json],
        )?;
        Ok(())
    }

    fn get_step_output(&self, job_id: &str, run_id: &str, step_id: &str) -> Result<Option<Value>, StateError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT output FROM step_runs WHERE job_id = ?1 AND run_id = ?2 AND step_id = ?3")?;
        let output: Option<Option<String>> = stmt
            .query_row(rusqlite::params![job_id, run_id, step_id], |row| row.get(0))
            .ok();
        match output.flatten() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn try_acquire_lock(&self, key: &str, owner: &str, ttl_seconds: u64, now_unix: i64) -> Result<bool, StateError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM locks WHERE expires_at < ?1", rusqlite::params![now_unix])?;
        let expires_at = now_unix + ttl_seconds as i64;
        conn.execute(
            "INSERT INTO locks (key, owner, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO NOTHING",
            rusqlite::params![key, owner, expires_at],
        )?;
        let held_by: String = conn.query_row("SELECT owner FROM locks WHERE key = ?1", rusqlite::params![key], |r| {
            r.get(0)
        })?;
        Ok(held_by == owner)
    }

    fn release_lock(&self, key: &str, owner: &str) -> Result<(), StateError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM locks WHERE key = ?1 AND owner = ?2", rusqlite::params![key, owner])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------
// file backend: one JSON document per store, guarded by an in-process mutex
// ---------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileStateDoc {
    job_runs: HashMap<String, JobStatus>,
    step_runs: HashMap<String, StepStatus>,
    step_outputs: HashMap<String, Value>,
    locks: HashMap<String, (String, i64)>,
}

pub struct FileStateStore {
    path: PathBuf,
    doc: Mutex<FileStateDoc>,
}

fn job_key(job_id: &str, run_id: &str) -> String {
    format!("{job_id}\u{1}{run_id}")
}

fn step_key(job_id: &str, run_id: &str, step_id: &str) -> String {
    format!("{job_id}\u{1}{run_id}\u{1}{step_id}")
}

impl FileStateStore {
    pub fn open(path: &Path) -> Result<Self, StateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let doc = if path.is_file() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            FileStateDoc::default()
        };
        Ok(Self { path: path.to_path_buf(), doc: Mutex::new(doc) })
    }

    fn persist(&self, doc: &FileStateDoc) -> Result<(), StateError> {
        let raw = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get_job_status(&self, job_id: &str, run_id: &str) -> Result<Option<JobStatus>, StateError> {
        Ok(self.doc.lock().job_runs.get(&job_key(job_id, run_id)).copied())
    }

    fn set_job_status(&self, job_id: &str, run_id: &str, status: JobStatus) -> Result<(), StateError> {
        let mut doc = self.doc.lock();
        doc.job_runs.insert(job_key(job_id, run_id), status);
        self.persist(&doc)
    }

    fn get_step_status(&self, job_id: &str, run_id: &str, step_id: &str) -> Result<Option<StepStatus>, StateError> {
        Ok(self.doc.lock().step_runs.get(&step_key(job_id, run_id, step_id)).copied())
    }

    fn set_step_status(
        &self,
        job_id: &str,
        run_id: &str,
        step_id: &str,
        status: StepStatus,
        output: Option<&Value>,
    ) -> Result<(), StateError> {
        let mut doc = self.doc.lock();
        let key = step_key(job_id, run_id, step_id);
        doc.step_runs.insert(key.clone(), status);
        if let Some(output) = output {
            doc.step_outputs.insert(key, output.clone());
        }
        self.persist(&doc)
    }

    fn get_step_output(&self, job_id: &str, run_id: &str, step_id: &str) -> Result<Option<Value>, StateError> {
        Ok(self.doc.lock().step_outputs.get(&step_key(job_id, run_id, step_id)).cloned())
    }

    fn try_acquire_lock(&self, key: &str, owner: &str, ttl_seconds: u64, now_unix: i64) -> Result<bool, StateError> {
        let mut doc = self.doc.lock();
        doc.locks.retain(|_, (_, expires_at)| *expires_at >= now_unix);
        let held_by = doc
            .locks
            .entry(key.to_string())
            .or_insert_with(|| (owner.to_string(), now_unix + ttl_seconds as i64))
            .0
            .clone();
        self.persist(&doc)?;
        Ok(held_by == owner)
    }

    fn release_lock(&self, key: &str, owner: &str) -> Result<(), StateError> {
        let mut doc = self.doc.lock();
        if doc.locks.get(key).map(|(o, _)| o == owner).unwrap_or(false) {
            doc.locks.remove(key);
        }
        self.persist(&doc)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
