// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rest:http` — a blocking HTTP client, grounded on the Python original's
//! `HttpxREST` connector but backed by `reqwest`'s blocking client (step
//! execution in this engine is synchronous within its worker task).

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::base::{Connector, ConnectorHandle, ConnectorInit, RestConnector, RestResponse};
use crate::error::ConnectorError;
use crate::registry::ConnectorRegistry;

use super::opt_str;

pub struct HttpRest {
    name: String,
    driver: String,
    base_url: String,
    client: Client,
}

impl HttpRest {
    fn open(init: ConnectorInit) -> Result<Self, ConnectorError> {
        let base_url = opt_str(&init.config, "base_url").unwrap_or_default();
        let timeout_secs = init.config.get("timeout_seconds").and_then(|v| v.as_f64()).unwrap_or(30.0);
        let mut builder = Client::builder().timeout(Duration::from_secs_f64(timeout_secs));
        if let Some(bearer) = opt_str(&init.config, "bearer_token") {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = format!("Bearer {bearer}");
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&value)
                    .map_err(|e| ConnectorError::Driver { kind: "rest".into(), driver: init.driver.clone(), msg: e.to_string() })?,
            );
            builder = builder.default_headers(headers);
        }
        let client = builder
            .build()
            .map_err(|e| ConnectorError::Driver { kind: "rest".into(), driver: init.driver.clone(), msg: e.to_string() })?;
        Ok(Self { name: init.name, driver: init.driver, base_url, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

impl Connector for HttpRest {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "rest"
    }
    fn driver(&self) -> &str {
        &self.driver
    }
}

impl RestConnector for HttpRest {
    fn get(&self, path: &str, query: &[(String, String)]) -> Result<RestResponse, ConnectorError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .map_err(|e| ConnectorError::Driver { kind: "rest".into(), driver: self.driver.clone(), msg: e.to_string() })?;
        to_rest_response(resp, &self.driver)
    }

    fn post(&self, path: &str, body: &Value) -> Result<RestResponse, ConnectorError> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(|e| ConnectorError::Driver { kind: "rest".into(), driver: self.driver.clone(), msg: e.to_string() })?;
        to_rest_response(resp, &self.driver)
    }
}

fn to_rest_response(resp: reqwest::blocking::Response, driver: &str) -> Result<RestResponse, ConnectorError> {
    let status = resp.status().as_u16();
    let body: Value = resp
        .json()
        .map_err(|e| ConnectorError::Driver { kind: "rest".into(), driver: driver.to_string(), msg: e.to_string() })?;
    Ok(RestResponse { status, body })
}

pub fn register(registry: &ConnectorRegistry) {
    registry.register("rest", "http", |init| {
        Ok(ConnectorHandle::Rest(Arc::new(HttpRest::open(init)?) as Arc<dyn RestConnector>))
    });
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
