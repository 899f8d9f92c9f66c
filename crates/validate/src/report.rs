// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The validation report shape (§4.2 "Output").

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Issue {
    pub code: String,
    /// Human-readable dotted path, e.g. `jobs[1].steps[0].inputs.command`.
    pub loc: String,
    pub msg: String,
}

impl Issue {
    pub fn new(code: impl Into<String>, loc: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            loc: loc.into(),
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Report {
    pub ok: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub flow_yaml: String,
}

impl Report {
    pub fn new(flow_yaml: impl Into<String>) -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            flow_yaml: flow_yaml.into(),
        }
    }

    pub fn push_error(&mut self, issue: Issue) {
        self.ok = false;
        self.errors.push(issue);
    }

    pub fn push_warning(&mut self, issue: Issue) {
        self.warnings.push(issue);
    }

    pub fn merge(&mut self, other: Report) {
        if !other.ok {
            self.ok = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
