// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `db:sqlite` — a reference DB driver (§4.5), grounded on the Python
//! original's `SQLiteDB` connector but backed by `rusqlite` rather than
//! the stdlib `sqlite3` module.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::base::{Connector, ConnectorHandle, ConnectorInit, DbConnector};
use crate::error::ConnectorError;
use crate::registry::ConnectorRegistry;

use super::opt_str;

pub struct SqliteDb {
    name: String,
    driver: String,
    conn: Mutex<Connection>,
}

impl SqliteDb {
    fn open(init: ConnectorInit) -> Result<Self, ConnectorError> {
        let path = opt_str(&init.config, "path").unwrap_or_else(|| ":memory:".to_string());
        let conn = Connection::open(&path)
            .map_err(|e| ConnectorError::Driver { kind: init.kind.clone(), driver: init.driver.clone(), msg: e.to_string() })?;
        Ok(Self { name: init.name, driver: init.driver, conn: Mutex::new(conn) })
    }
}

impl Connector for SqliteDb {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "db"
    }
    fn driver(&self) -> &str {
        &self.driver
    }
}

fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::ToSql>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::ToSql> {
            match v {
                Value::Null => Box::new(Option::<String>::None),
                Value::Bool(b) => Box::new(*b),
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Box::new(i)
                    } else {
                        Box::new(n.as_f64().unwrap_or(0.0))
                    }
                }
                Value::String(s) => Box::new(s.clone()),
                other => Box::new(other.to_string()),
            }
        })
        .collect()
}

/// Blobs are hex-encoded with a `hex:` prefix so the generic row-as-JSON
/// shape stays a plain string; the bundle DB source (which fetches blob
/// asset columns) decodes that prefix back to raw bytes.
fn column_value(row: &rusqlite::Row, idx: usize) -> Value {
    match row.get_ref(idx) {
        Ok(ValueRef::Null) => Value::Null,
        Ok(ValueRef::Integer(i)) => Value::Number(i.into()),
        Ok(ValueRef::Real(f)) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        Ok(ValueRef::Text(t)) => Value::String(String::from_utf8_lossy(t).to_string()),
        Ok(ValueRef::Blob(b)) => Value::String(format!("hex:{}", hex::encode(b))),
        Err(_) => Value::Null,
    }
}

impl DbConnector for SqliteDb {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Map<String, Value>>, ConnectorError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| ConnectorError::Driver { kind: "db".into(), driver: self.driver.clone(), msg: e.to_string() })?;
        let col_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let bound = bind_params(params);
        let param_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let mut map = Map::new();
                for (i, name) in col_names.iter().enumerate() {
                    map.insert(name.clone(), column_value(row, i));
                }
                Ok(map)
            })
            .map_err(|e| ConnectorError::Driver { kind: "db".into(), driver: self.driver.clone(), msg: e.to_string() })?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConnectorError::Driver { kind: "db".into(), driver: self.driver.clone(), msg: e.to_string() })
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, ConnectorError> {
        let conn = self.conn.lock();
        let bound = bind_params(params);
        let param_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        conn.execute(sql, param_refs.as_slice())
            .map(|n| n as u64)
            .map_err(|e| ConnectorError::Driver { kind: "db".into(), driver: self.driver.clone(), msg: e.to_string() })
    }
}

pub fn register(registry: &ConnectorRegistry) {
    registry.register("db", "sqlite", |init| {
        Ok(ConnectorHandle::Db(Arc::new(SqliteDb::open(init)?) as Arc<dyn DbConnector>))
    });
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
