//! Shared helpers for tkvd specs

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

pub const LOG_FILE: &str = "state/transactions.log";

/// Scratch directory with a `state/` directory for the daemon
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("state")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.path().join("state")
    }

    /// Write a file relative to the project root
    pub fn file(&self, rel: &str, contents: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path().join(rel)).unwrap()
    }

    /// `tkvd` with its state pinned inside this project
    pub fn tkvd(&self) -> Cli {
        let mut cmd = Command::cargo_bin("tkvd").unwrap();
        cmd.current_dir(self.path())
            .env("TKV_STATE_DIR", self.state_dir())
            .env("TKV_BIND_ADDR", "127.0.0.1:0")
            .env_remove("RUST_LOG");
        Cli { cmd }
    }
}

pub struct Cli {
    cmd: Command,
}

impl Cli {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn passes(mut self) -> Output {
        let output = self.cmd.output().unwrap();
        let out = Output::from(output);
        assert!(out.success, "expected success\n{}", out);
        out
    }

    pub fn fails(mut self) -> Output {
        let output = self.cmd.output().unwrap();
        let out = Output::from(output);
        assert!(!out.success, "expected failure\n{}", out);
        out
    }
}

pub struct Output {
    success: bool,
    stdout: String,
    stderr: String,
}

impl From<std::process::Output> for Output {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--- stdout ---\n{}\n--- stderr ---\n{}", self.stdout, self.stderr)
    }
}

impl Output {
    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout.contains(needle), "stdout missing {:?}\n{}", needle, self);
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr.contains(needle), "stderr missing {:?}\n{}", needle, self);
        self
    }

    pub fn stderr_lacks(self, needle: &str) -> Self {
        assert!(!self.stderr.contains(needle), "stderr has {:?}\n{}", needle, self);
        self
    }
}
