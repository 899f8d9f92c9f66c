// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin loader (§C "Plugin loader").
//!
//! The original loads plugins two ways: Python entry points (package
//! metadata, read once at process start) and a path-scan that
//! `exec_module`s every `.py` file under `plugin_paths`. Neither translates
//! safely to Rust — there is no portable, safe dynamic-library ABI, and
//! `dlopen`ing arbitrary `.so` files defeats the type system this crate
//! otherwise leans on.
//!
//! Instead, a plugin is a Rust type implementing [`Plugin`], compiled into
//! the binary and registered in [`compiled_plugins`]. `plugin_paths`
//! becomes a convention: each directory may contain a `<name>.plugin`
//! marker file naming a compiled-in plugin to activate, mirroring the
//! original's "declare intent via a path, resolve the actual code
//! elsewhere" shape without the unsafe dynamic loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aetherflow_connectors::ConnectorRegistry;
use tracing::warn;

use crate::error::ExecuteError;
use crate::registry::StepRegistry;

/// A compiled-in extension registering additional step types and/or
/// connector drivers into the shared registries (§9 "registry
/// polymorphism").
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn register(&self, steps: &StepRegistry, connectors: &ConnectorRegistry);
}

/// The plugins compiled into this binary. Empty in the reference build —
/// this is the seam a downstream crate extends by constructing its own
/// `Vec<Arc<dyn Plugin>>` and passing it to [`load_plugins`] instead of
/// relying on the default `&[]` discovered via [`compiled_plugins`].
pub fn compiled_plugins() -> Vec<Arc<dyn Plugin>> {
    Vec::new()
}

fn marker_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("plugin") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Activate every plugin named by a `<name>.plugin` marker file under
/// `plugin_paths`, matching it against `available` by [`Plugin::name`].
///
/// A missing directory or an unresolved marker name is an error when
/// `strict` (`Settings.plugin_strict`); otherwise it's logged and skipped,
/// matching the original's `strict=settings.plugin_strict` behavior at
/// both the entry-point and path-scan call sites.
pub fn load_plugins(
    plugin_paths: &[PathBuf],
    strict: bool,
    available: &[Arc<dyn Plugin>],
    steps: &StepRegistry,
    connectors: &ConnectorRegistry,
) -> Result<Vec<String>, ExecuteError> {
    let mut activated = Vec::new();

    for dir in plugin_paths {
        if !dir.exists() {
            if strict {
                return Err(ExecuteError::Other(format!("plugin path not found: {}", dir.display())));
            }
            warn!(path = %dir.display(), "plugin path not found; continuing");
            continue;
        }

        let names = match marker_names(dir) {
            Ok(names) => names,
            Err(e) => {
                if strict {
                    return Err(ExecuteError::Io(e));
                }
                warn!(path = %dir.display(), error = %e, "failed reading plugin path; continuing");
                continue;
            }
        };

        for name in names {
            match available.iter().find(|p| p.name() == name) {
                Some(plugin) => {
                    plugin.register(steps, connectors);
                    activated.push(plugin.name().to_string());
                }
                None => {
                    if strict {
                        return Err(ExecuteError::Other(format!(
                            "plugin `{name}` declared in {} is not compiled into this binary",
                            dir.display()
                        )));
                    }
                    warn!(name, path = %dir.display(), "unknown plugin; continuing");
                }
            }
        }
    }

    Ok(activated)
}

#[cfg(test)]
#[path = "plugins_tests.rs"]
mod tests;
