use crate::common::{TestTrace, simple_request, stderr, stdout, tagtrace_command};
use insta_cmd::assert_cmd_snapshot;
use tagtrace::trace::{EventKind, TraceRecord};

#[test]
fn test_latency_sorted_slowest_first() {
    let mut records = simple_request();
    records.extend([
        TraceRecord::new(EventKind::TagSet, 105, 2).args(7, 0, 0),
        TraceRecord::new(EventKind::TagUnset, 109, 2).args(7, 0, 0),
        // Handed to thread 3 before thread 2 lets go, finished there
        TraceRecord::new(EventKind::TagSet, 200, 2).args(9, 0, 0),
        TraceRecord::new(EventKind::TagSet, 205, 3).args(9, 0, 0),
        TraceRecord::new(EventKind::TagBlock, 210, 2).args(9, 0, 0),
        TraceRecord::new(EventKind::TagClear, 230, 3),
    ]);
    let trace = TestTrace::new(&records);
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("latency").arg(trace.path());

    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----
    9, 30.000000
    42, 20.000000
    7, 4.000000

    ----- stderr -----
    ");
}

#[test]
fn test_latency_without_releases_warns() {
    let trace = TestTrace::new(&[TraceRecord::new(EventKind::TagSet, 1, 1).args(5, 0, 0)]);
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("latency").arg(trace.path());

    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----

    ----- stderr -----
    🟡 No completed requests in trace
    ");
}

#[test]
fn test_latency_omits_tag_still_carried() {
    let trace = TestTrace::new(&[
        TraceRecord::new(EventKind::TagSet, 0, 1).args(7, 0, 0),
        TraceRecord::new(EventKind::TagSet, 4, 2).args(7, 0, 0),
        TraceRecord::new(EventKind::TagUnset, 10, 1).args(7, 0, 0),
        // Thread 3 never carried tag 7
        TraceRecord::new(EventKind::TagUnset, 500, 3).args(7, 0, 0),
    ]);
    let output = tagtrace_command(&trace)
        .arg("latency")
        .arg(trace.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty(), "{}", stdout(&output));
}

#[test]
fn test_latency_cdf() {
    let mut records = simple_request();
    records.extend([
        TraceRecord::new(EventKind::TagSet, 105, 2).args(7, 0, 0),
        TraceRecord::new(EventKind::TagUnset, 109, 2).args(7, 0, 0),
        TraceRecord::new(EventKind::TagSet, 200, 2).args(9, 0, 0),
        TraceRecord::new(EventKind::TagClear, 230, 2),
    ]);
    let trace = TestTrace::new(&records);
    let output = tagtrace_command(&trace)
        .arg("latency")
        .arg(trace.path())
        .arg("--cdf")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let stdout = stdout(&output);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1001);
    assert_eq!(lines[0], "0.000000, 4.000000");
    assert_eq!(lines[500], "0.500000, 20.000000");
    assert_eq!(lines[1000], "1.000000, 30.000000");
}
