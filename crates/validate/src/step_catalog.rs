// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seam between the validator and the engine's step registry.
//!
//! The validator must reject unregistered step types and run step-specific
//! semantic checks (§4.2 stage 6) without depending on `aetherflow-engine`
//! (which depends on this crate for schema/template validation). Engine
//! implements this trait over its live step registry and passes it in.

use aetherflow_core::StepSpec;

use crate::report::Issue;

pub trait StepTypeCatalog {
    /// True if `step_type` is a registered step type.
    fn is_registered(&self, step_type: &str) -> bool;

    /// Step-specific semantic checks beyond "is this type registered"
    /// (e.g. `external.process` requires `inputs.command`; log modes are
    /// from a fixed set; `atomic_dir` idempotency requires both
    /// `temp_output_dir` and `final_output_dir`). `loc` is the dotted path
    /// to this step for issue reporting.
    fn validate_step(&self, step: &StepSpec, loc: &str) -> Vec<Issue>;
}

/// A catalog with no built-in step-specific rules; useful for tests that
/// only exercise the structural/template stages.
pub struct EmptyCatalog(pub Vec<String>);

impl StepTypeCatalog for EmptyCatalog {
    fn is_registered(&self, step_type: &str) -> bool {
        self.0.iter().any(|s| s == step_type)
    }

    fn validate_step(&self, _step: &StepSpec, _loc: &str) -> Vec<Issue> {
        Vec::new()
    }
}
