//! # Test Utilities for tagtrace
//!
//! Integration tests write small binary traces into a temporary directory and
//! run the `tagtrace` binary against them.
//!
//! ## Environment Isolation
//!
//! `tagtrace_command` points `TAGTRACE_CONFIG_PATH` at a file inside the
//! fixture directory (absent unless a test writes it) and strips any
//! `TAGTRACE_*` overrides inherited from the developer's shell.
//!
//! ## Snapshots
//!
//! Temporary paths differ per run; `setup_snapshot_settings` replaces them
//! with `[TRACE_DIR]`.

use std::path::{Path, PathBuf};
use std::process::Command;

use insta::Settings;
use tagtrace::trace::record::encode_all;
use tagtrace::trace::{EventKind, TraceRecord};
use tempfile::TempDir;

pub struct TestTrace {
    temp_dir: TempDir,
    path: PathBuf,
}

impl TestTrace {
    /// Write `records` to `trace.data` in a fresh directory.
    pub fn new(records: &[TraceRecord]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("trace.data");
        std::fs::write(&path, encode_all(records)).unwrap();
        Self { temp_dir, path }
    }

    /// Write raw bytes, for truncated or hand-crafted traces.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("trace.data");
        std::fs::write(&path, bytes).unwrap();
        Self { temp_dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir().join("config.toml")
    }

    /// Write an auxiliary input (scheduler trace, maps, config) next to the trace.
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

/// A single request on thread 1 with one in-scope sample.
///
/// Tag 42 is set at 100 µs and released at 120 µs; the sample at 115 µs
/// covers 10 µs and points just past `0x3ed`.
pub fn simple_request() -> Vec<TraceRecord> {
    vec![
        TraceRecord::new(EventKind::TagSet, 100, 1).args(42, 0, 0),
        TraceRecord::new(EventKind::StackSample, 115, 1).args(10_000, 0x3ed, 1),
        TraceRecord::new(EventKind::TagUnset, 120, 1).args(42, 0, 0),
    ]
}

/// Thread 1 serves tag 42 and waits on mutex 0x10, which thread 2 holds.
pub fn contended_request() -> Vec<TraceRecord> {
    vec![
        TraceRecord::new(EventKind::TagSet, 100, 1).args(42, 0, 0),
        TraceRecord::new(EventKind::MutexLock, 102, 2).args(0x10, 0, 0),
        TraceRecord::new(EventKind::MutexWait, 105, 1).args(0x10, 0, 0),
        TraceRecord::new(EventKind::StackSample, 110, 2).args(2_000, 0x2005, 1),
        TraceRecord::new(EventKind::StackSample, 115, 2).args(2_000, 0x2105, 1),
        TraceRecord::new(EventKind::MutexUnlock, 118, 2).args(0x10, 0, 0),
        TraceRecord::new(EventKind::MutexLock, 119, 1).args(0x10, 0, 0),
        TraceRecord::new(EventKind::MutexUnlock, 122, 1).args(0x10, 0, 0),
        TraceRecord::new(EventKind::TagUnset, 130, 1).args(42, 0, 0),
    ]
}

/// `tagtrace` with an isolated configuration.
pub fn tagtrace_command(trace: &TestTrace) -> Command {
    let mut cmd = Command::new(insta_cmd::get_cargo_bin("tagtrace"));
    cmd.current_dir(trace.dir());
    for (key, _) in std::env::vars_os() {
        if key.to_string_lossy().starts_with("TAGTRACE_") {
            cmd.env_remove(&key);
        }
    }
    cmd.env("TAGTRACE_CONFIG_PATH", trace.config_path());
    cmd.env_remove("RUST_LOG");
    cmd.env("NO_COLOR", "1");
    cmd
}

pub fn setup_snapshot_settings(trace: &TestTrace) -> Settings {
    let mut settings = Settings::clone_current();
    settings.add_filter(
        &regex::escape(&trace.dir().display().to_string()),
        "[TRACE_DIR]",
    );
    // macOS tempdirs resolve through /private
    settings.add_filter(r"/private\[TRACE_DIR\]", "[TRACE_DIR]");
    settings
}

pub fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
