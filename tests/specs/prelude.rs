//! Test helpers for aetherflow's black-box CLI specifications.
//!
//! Every spec invokes the real `aetherflow`/`aetherflow-scheduler` binaries
//! and asserts on stdout, stderr, and exit codes rather than calling crate
//! internals directly.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Resolve a workspace binary's path. Built binaries always land in
/// `target/debug` (or, under coverage instrumentation, `target/llvm-cov-target/debug`)
/// relative to the workspace root, regardless of which package's test
/// harness is running.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // Fallback: resolve relative to the test binary itself, which lives at
    // target/debug/deps/specs-<hash>.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn aetherflow_binary() -> Command {
    Command::new(binary_path("aetherflow"))
}

fn scheduler_binary() -> Command {
    Command::new(binary_path("aetherflow-scheduler"))
}

/// Fluent builder for a single CLI invocation, mirroring the project's own
/// `--json`/text output split so specs can assert either shape.
pub struct CliBuilder {
    cmd: Command,
}

pub fn aetherflow() -> CliBuilder {
    CliBuilder { cmd: aetherflow_binary() }
}

pub fn scheduler() -> CliBuilder {
    CliBuilder { cmd: scheduler_binary() }
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn dir(mut self, path: impl AsRef<Path>) -> Self {
        self.cmd.current_dir(path);
        self
    }

    fn run(mut self) -> RunAssert {
        let output = self.cmd.output().expect("command should spawn");
        RunAssert { output }
    }

    pub fn passes(self) -> RunAssert {
        let result = self.run();
        assert!(
            result.output.status.success(),
            "expected success, got exit code {:?}\nstdout: {}\nstderr: {}",
            result.output.status.code(),
            result.stdout(),
            result.stderr()
        );
        result
    }

    pub fn fails(self) -> RunAssert {
        let result = self.run();
        assert!(
            !result.output.status.success(),
            "expected failure, but command succeeded\nstdout: {}",
            result.stdout()
        );
        result
    }

    /// Run without asserting the exit status, for checks that need the
    /// exact code (e.g. validation's exit 2).
    pub fn finish(self) -> RunAssert {
        self.run()
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn code(&self) -> Option<i32> {
        self.output.status.code()
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        let out = self.stdout();
        assert!(out.contains(needle), "stdout does not contain '{needle}'\nstdout: {out}");
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        let err = self.stderr();
        assert!(err.contains(needle), "stderr does not contain '{needle}'\nstderr: {err}");
        self
    }

    pub fn code_eq(self, expected: i32) -> Self {
        assert_eq!(self.code(), Some(expected));
        self
    }
}

/// A scratch project directory holding a flow (and, for bundle specs, a
/// manifest plus the bundle's own source tree).
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self { dir: tempfile::tempdir().expect("tempdir") }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the project root, creating parent
    /// directories as needed.
    pub fn file(&self, rel: impl AsRef<Path>, content: &str) -> PathBuf {
        let full = self.dir.path().join(rel.as_ref());
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full, content).unwrap();
        full
    }

    /// Write a minimal, valid flow (one job, one `external.process` step
    /// that runs `true`) with its workspace/state rooted inside this
    /// project so the test never touches `/tmp/aetherflow`.
    pub fn minimal_flow(&self, flow_id: &str) -> PathBuf {
        let work_root = self.dir.path().join("work");
        let state_path = self.dir.path().join("state.sqlite");
        let yaml = format!(
            r#"
version: 1
flow:
  id: {flow_id}
  workspace:
    root: "{work_root}"
  state:
    backend: sqlite
    path: "{state_path}"
jobs:
  - id: only-job
    steps:
      - id: only-step
        type: external.process
        inputs:
          command: ["true"]
"#,
            flow_id = flow_id,
            work_root = work_root.display(),
            state_path = state_path.display(),
        );
        self.file("flow.yaml", &yaml)
    }

    /// Write a flow that references an unregistered step type, used to
    /// exercise the validation-failure path.
    pub fn invalid_flow(&self, flow_id: &str) -> PathBuf {
        let yaml = format!(
            r#"
version: 1
flow:
  id: {flow_id}
jobs:
  - id: only-job
    steps:
      - id: only-step
        type: nonexistent.type
"#,
        );
        self.file("flow.yaml", &yaml)
    }

    /// Write a filesystem-sourced bundle manifest whose `bundle_source/`
    /// subdirectory holds a copy of `minimal_flow`'s output, and return the
    /// manifest's path.
    pub fn filesystem_bundle(&self, bundle_id: &str) -> PathBuf {
        let source_dir = self.dir.path().join("bundle_source");
        std::fs::create_dir_all(&source_dir).unwrap();
        let work_root = self.dir.path().join("bundle_work");
        let state_path = self.dir.path().join("bundle_state.sqlite");
        let flow_yaml = format!(
            r#"
version: 1
flow:
  id: {bundle_id}-flow
  workspace:
    root: "{work_root}"
  state:
    backend: sqlite
    path: "{state_path}"
jobs:
  - id: only-job
    steps:
      - id: only-step
        type: external.process
        inputs:
          command: ["true"]
"#,
            bundle_id = bundle_id,
            work_root = work_root.display(),
            state_path = state_path.display(),
        );
        std::fs::write(source_dir.join("entry.yaml"), flow_yaml).unwrap();

        let manifest_yaml = format!(
            r#"
version: 1
bundle:
  id: {bundle_id}
  source:
    type: filesystem
    base_path: "{source_dir}"
  entry_flow: entry.yaml
"#,
            bundle_id = bundle_id,
            source_dir = source_dir.display(),
        );
        self.file("manifest.yaml", &manifest_yaml)
    }

    /// An isolated `AETHERFLOW_WORK_ROOT` for bundle sync specs, so the
    /// bundle cache lives under the project directory rather than the
    /// process-wide default.
    pub fn work_root(&self) -> PathBuf {
        self.dir.path().join("aetherflow-work")
    }
}
