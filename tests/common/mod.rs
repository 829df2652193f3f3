//! Common test utilities for boq integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/boqtrack/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates three temporary directories:
/// - `workspace_dir`: The directory boq runs in
/// - `data_dir`: Holds boq's data (via `BOQ_DATA_DIR`)
/// - `config_dir`: Holds the system config.kdl (via `BOQ_CONFIG_DIR`)
///
/// The `boq()` method sets these per invocation, keeping tests parallel-safe.
pub struct TestEnv {
    pub workspace_dir: TempDir,
    pub data_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            workspace_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize storage.
    pub fn init() -> Self {
        let env = Self::new();
        env.boq().args(["system", "init"]).assert().success();
        env
    }

    /// Initialize storage and create (and select) one project.
    pub fn with_project(job_no: &str) -> Self {
        let env = Self::init();
        env.boq()
            .args(["project", "create", job_no, "Marina Villa"])
            .assert()
            .success();
        env
    }

    /// Get a Command for the boq binary with isolated directories.
    pub fn boq(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_boq"));
        cmd.current_dir(self.workspace_dir.path());
        cmd.env("BOQ_DATA_DIR", self.data_dir.path());
        cmd.env("BOQ_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("BOQ_WORKSPACE");
        cmd.env_remove("BOQ_PROJECT");
        cmd.env_remove("BOQ_LOG");
        cmd
    }

    /// Run boq with `args`, assert success, and parse stdout as JSON.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.boq().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "boq {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        parse_json(&output.stdout)
    }

    /// Get the path to the workspace directory.
    pub fn path(&self) -> &std::path::Path {
        self.workspace_dir.path()
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse JSON output from a command.
pub fn parse_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("Failed to parse JSON output")
}
