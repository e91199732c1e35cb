use crate::common::{
    TestTrace, contended_request, setup_snapshot_settings, simple_request, stderr, stdout,
    tagtrace_command,
};
use insta_cmd::assert_cmd_snapshot;
use tagtrace::trace::{EventKind, TraceRecord};

#[test]
fn test_analyze_text() {
    let trace = TestTrace::new(&simple_request());
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("analyze").arg(trace.path()).args(["--tag", "42"]);

    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----
    100.000 (+0.000) [1] TAG_SET
    115.000 (+15.000) [1] STACK_SAMPLE ngen=1, latency=10.000 us, pc=0x3e8(???)
    120.000 (+20.000) [1] TAG_UNSET

    ⚪ Tag 42: 20.000 us, 3 events
      thread 1 (request): 1 sample bar(s) in 1 lane(s), 0 critical section(s)

    ----- stderr -----
    ");
}

#[test]
fn test_analyze_ignores_other_tags() {
    let mut records = simple_request();
    records.extend([
        TraceRecord::new(EventKind::TagSet, 105, 2).args(7, 0, 0),
        TraceRecord::new(EventKind::StackSample, 108, 2).args(1_000, 0x9005, 1),
        TraceRecord::new(EventKind::TagUnset, 109, 2).args(7, 0, 0),
    ]);
    let trace = TestTrace::new(&records);

    let output = tagtrace_command(&trace)
        .arg("analyze")
        .arg(trace.path())
        .args(["-t", "42"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(!stdout.contains("[2]"), "thread 2 leaked into tag 42:\n{stdout}");
    assert!(stdout.contains("3 events"));
}

#[test]
fn test_analyze_missing_tag_warns() {
    let trace = TestTrace::new(&simple_request());
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("analyze").arg(trace.path()).args(["--tag", "7"]);

    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----

    ----- stderr -----
    🟡 No events found for tag 7
    ");
}

#[test]
fn test_analyze_tag_zero_is_rejected() {
    let trace = TestTrace::new(&simple_request());
    let output = tagtrace_command(&trace)
        .arg("analyze")
        .arg(trace.path())
        .args(["--tag", "0"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = stderr(&output);
    assert!(stderr.contains("Tag 0 marks threads with no request"), "{stderr}");
    assert!(stderr.contains("tagtrace latency"));
}

#[test]
fn test_analyze_missing_trace_file() {
    let trace = TestTrace::new(&[]);
    let settings = setup_snapshot_settings(&trace);
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("analyze")
        .arg(trace.dir().join("absent.data"))
        .args(["--tag", "42"]);

    settings.bind(|| {
        let output = cmd.output().unwrap();
        assert_eq!(output.status.code(), Some(1));
        insta::assert_snapshot!(
            stderr(&output).lines().next().unwrap_or_default(),
            @"❌ Cannot read trace [TRACE_DIR]/absent.data: No such file or directory (os error 2)"
        );
    });
}

#[test]
fn test_analyze_truncated_trace() {
    let mut bytes = tagtrace::trace::record::encode_all(&simple_request());
    // Half a record of trailing garbage is dropped silently
    bytes.extend_from_slice(&[0xff; 20]);
    let trace = TestTrace::from_bytes(&bytes);

    let output = tagtrace_command(&trace)
        .arg("analyze")
        .arg(trace.path())
        .args(["--tag", "42"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(stdout(&output).contains("Tag 42: 20.000 us, 3 events"));
}

#[test]
fn test_analyze_json_includes_mutex_holder() {
    let trace = TestTrace::new(&contended_request());
    let output = tagtrace_command(&trace)
        .arg("analyze")
        .arg(trace.path())
        .args(["--tag", "42", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let timeline: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(timeline["tag"], 42);

    let kinds: Vec<(&str, u64)> = timeline["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| (e["kind"].as_str().unwrap(), e["thread_id"].as_u64().unwrap()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("TAG_SET", 1),
            ("MUTEX_WAIT", 1),
            ("MHOLDER_STACK_SAMPLE", 2),
            ("MHOLDER_STACK_SAMPLE", 2),
            ("MUTEX_LOCK", 1),
            ("MUTEX_UNLOCK", 1),
            ("TAG_UNSET", 1),
        ]
    );
    assert_eq!(
        timeline["events"][4]["detail"],
        "mutex=0x10, wait_time=14.000 us"
    );

    let threads = timeline["threads"].as_array().unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0]["thread_id"], 1);
    assert_eq!(threads[0]["role"], "request");
    assert_eq!(threads[0]["critical_sections"], serde_json::json!([[119.0, 122.0]]));
    assert_eq!(threads[1]["thread_id"], 2);
    assert_eq!(threads[1]["role"], "mutex_holder");
    assert_eq!(threads[1]["bars"].as_array().unwrap().len(), 2);
}

#[test]
fn test_analyze_min_holder_samples_from_config() {
    let trace = TestTrace::new(&contended_request());
    trace.write_file("config.toml", "min-holder-samples = 3\n");

    let output = tagtrace_command(&trace)
        .arg("analyze")
        .arg(trace.path())
        .args(["--tag", "42", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let timeline: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    // Holder samples stay in the event list, the panel is dropped
    assert_eq!(timeline["threads"].as_array().unwrap().len(), 1);
    assert!(
        timeline["events"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["kind"] == "MHOLDER_STACK_SAMPLE")
    );
}

#[test]
fn test_analyze_grace_window_override() {
    // The trailing sample at 160 starts at 115, inside the request, and lands
    // within 100 us of the release at 120 but not within 5 us
    let mut records = simple_request();
    records.push(TraceRecord::new(EventKind::StackSample, 160, 1).args(45_000, 0x505, 1));
    let trace = TestTrace::new(&records);

    let run = |extra: &[&str]| {
        let output = tagtrace_command(&trace)
            .arg("analyze")
            .arg(trace.path())
            .args(["--tag", "42"])
            .args(extra)
            .output()
            .unwrap();
        assert!(output.status.success(), "{}", stderr(&output));
        stdout(&output)
    };

    assert!(run(&[]).contains("160.000"));
    assert!(!run(&["--grace-window-us", "5"]).contains("160.000"));
}

#[test]
fn test_analyze_negative_grace_window_is_invalid() {
    let trace = TestTrace::new(&simple_request());
    let output = tagtrace_command(&trace)
        .arg("analyze")
        .arg(trace.path())
        .args(["--tag", "42", "--grace-window-us=-1"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid configuration: grace-window-us"));
}

#[test]
fn test_analyze_with_sched_and_maps() {
    let trace = TestTrace::new(&simple_request());
    let sched = trace.write_file(
        "sched.txt",
        "\
       1 [002] 0.000110000: sched:sched_switch: prev_pid=1 prev_prio=120 prev_state=S ==> next_pid=0 next_prio=120
      77 [000] 0.000111000: sched:sched_waking: pid=78 prio=120 target_cpu=000
       1 [002] 0.000200000: sched:sched_switch: prev_pid=1 prev_prio=120 prev_state=R ==> next_pid=0 next_prio=120
not a scheduler line
",
    );
    let maps = trace.write_file(
        "maps.txt",
        "00000000-00001000 r-xp 00000000 fd:01 42 /usr/bin/server\n",
    );

    let mut cmd = tagtrace_command(&trace);
    cmd.arg("analyze")
        .arg(trace.path())
        .args(["--tag", "42", "--sched"])
        .arg(&sched)
        .arg("--maps")
        .arg(&maps);

    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----
    100.000 (+0.000) [1] TAG_SET
    110.000 (+10.000) [1] SCHED_SWITCH cpu_id=2, prev_pid=1 prev_prio=120 prev_state=S ==> next_pid=0 next_prio=120
    115.000 (+15.000) [1] STACK_SAMPLE ngen=1, latency=10.000 us, pc=0x3e8(/usr/bin/server+0x3e8)
    120.000 (+20.000) [1] TAG_UNSET

    ⚪ Tag 42: 20.000 us, 4 events
      thread 1 (request): 1 sample bar(s) in 1 lane(s), 0 critical section(s)

    ----- stderr -----
    ");
}

#[test]
fn test_analyze_chrome_format() {
    let trace = TestTrace::new(&contended_request());
    let output = tagtrace_command(&trace)
        .arg("analyze")
        .arg(trace.path())
        .args(["--tag", "42", "--format", "chrome"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["displayTimeUnit"], "ns");
    let events = parsed["traceEvents"].as_array().unwrap();
    assert!(
        events
            .iter()
            .any(|e| e["ph"] == "M" && e["args"]["name"] == "tid 2 (mutex holder)")
    );
    assert!(
        events
            .iter()
            .any(|e| e["ph"] == "X" && e["cat"] == "critical-section")
    );
}
