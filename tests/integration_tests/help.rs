//! `--help` wording for each subcommand.

use crate::common::{TestTrace, stdout, tagtrace_command};
use rstest::rstest;

fn help(args: &[&str]) -> String {
    let trace = TestTrace::new(&[]);
    let output = tagtrace_command(&trace).args(args).output().unwrap();
    assert!(output.status.success());
    stdout(&output)
}

#[rstest]
#[case::root(&["--help"], "Reconstruct request timelines")]
#[case::analyze(&["analyze", "--help"], "--grace-window-us")]
#[case::latency(&["latency", "--help"], "slowest first")]
#[case::latency_cdf(&["latency", "--help"], "--cdf")]
#[case::summary(&["summary", "--help"], "--from-pct")]
#[case::count(&["count", "--help"], "event kind")]
#[case::dump(&["dump", "--help"], "--thread")]
#[case::config_show(&["config", "show", "--help"], "effective settings")]
fn test_help_mentions(#[case] args: &[&str], #[case] expected: &str) {
    let output = help(args);
    assert!(output.contains(expected), "{expected:?} missing from:\n{output}");
}

#[test]
fn test_analyze_long_help_describes_inputs() {
    let output = help(&["analyze", "--help"]);
    assert!(output.contains("Inputs"));
    assert!(output.contains("perf sched script"));
}

#[test]
fn test_version() {
    let output = help(&["--version"]);
    assert!(output.starts_with("tagtrace "));
}
