use crate::common::{TestTrace, stderr, tagtrace_command};
use insta_cmd::assert_cmd_snapshot;
use tagtrace::trace::{EventKind, TraceRecord};

fn sample(ts: u64, tid: u32, latency_us: u64, return_addr: u64) -> TraceRecord {
    TraceRecord::new(EventKind::StackSample, ts, tid).args(latency_us * 1_000, return_addr, 1)
}

/// Three requests taking 10, 40 and 100 us, plus one untagged sample.
fn three_requests() -> Vec<TraceRecord> {
    vec![
        TraceRecord::new(EventKind::TagSet, 0, 1).args(1, 0, 0),
        sample(5, 1, 2, 0x1005),
        sample(8, 1, 4, 0x1005),
        TraceRecord::new(EventKind::TagUnset, 10, 1).args(1, 0, 0),
        TraceRecord::new(EventKind::TagSet, 20, 2).args(2, 0, 0),
        sample(30, 2, 6, 0x2005),
        TraceRecord::new(EventKind::TagUnset, 60, 2).args(2, 0, 0),
        sample(70, 3, 1, 0x3005),
        TraceRecord::new(EventKind::TagSet, 100, 1).args(3, 0, 0),
        sample(110, 1, 3, 0x1005),
        TraceRecord::new(EventKind::TagUnset, 200, 1).args(3, 0, 0),
    ]
}

#[test]
fn test_summary_whole_trace() {
    let trace = TestTrace::new(&three_requests());
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("summary").arg(trace.path());

    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----
    ??? (pc=0x2000)
        num_samples: 1
        min: 6.0000
        median: 6.0000
        90p: 6.0000
        99p: 6.0000
        99.9p: 6.0000
        max: 6.0000
    ??? (pc=0x1000)
        num_samples: 3
        min: 2.0000
        median: 3.0000
        90p: 3.0000
        99p: 3.0000
        99.9p: 3.0000
        max: 4.0000
    ??? (pc=0x3000)
        num_samples: 1
        min: 1.0000
        median: 1.0000
        90p: 1.0000
        99p: 1.0000
        99.9p: 1.0000
        max: 1.0000

    ----- stderr -----
    ");
}

#[test]
fn test_summary_latency_band_with_maps() {
    let trace = TestTrace::new(&three_requests());
    let maps = trace.write_file(
        "maps.txt",
        "00000000-00010000 r-xp 00000000 fd:01 42 /usr/bin/server\n",
    );
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("summary")
        .arg(trace.path())
        .arg("--maps")
        .arg(&maps)
        .args(["--from-pct", "0.5", "--to-pct", "1.0"]);

    // Ranks 1..2 of three: only the 40 us request
    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----
    /usr/bin/server+0x2000 (pc=0x2000)
        num_samples: 1
        sum: 6.0000 (0.15)
        median: 6.0000
        90p: 6.0000
        99p: 6.0000
        99.9p: 6.0000
        max: 6.0000

    ----- stderr -----
    ");
}

#[test]
fn test_summary_bias_from_config() {
    let trace = TestTrace::new(&three_requests());
    trace.write_file("config.toml", "return-addr-bias = 0\n");

    let output = tagtrace_command(&trace)
        .arg("summary")
        .arg(trace.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("??? (pc=0x2005)"));
}

#[test]
fn test_summary_empty_band_warns() {
    let trace = TestTrace::new(&three_requests());
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("summary")
        .arg(trace.path())
        .args(["--from-pct", "0.5", "--to-pct", "0.5"]);

    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----

    ----- stderr -----
    🟡 No completed requests between 0.5 and 0.5
    ");
}

#[test]
fn test_summary_rejects_fraction_out_of_range() {
    let trace = TestTrace::new(&three_requests());
    let output = tagtrace_command(&trace)
        .arg("summary")
        .arg(trace.path())
        .args(["--from-pct", "0.5", "--to-pct", "2"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("2 is not between 0.0 and 1.0"));
}
