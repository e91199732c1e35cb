use crate::common::{TestTrace, contended_request, tagtrace_command};
use insta_cmd::assert_cmd_snapshot;

#[test]
fn test_count_by_kind() {
    let trace = TestTrace::new(&contended_request());
    let mut cmd = tagtrace_command(&trace);
    cmd.arg("count").arg(trace.path());

    assert_cmd_snapshot!(cmd, @r"
    success: true
    exit_code: 0
    ----- stdout -----
    STACK_SAMPLE 2
    TAG_SET 1
    TAG_BLOCK 0
    TAG_UNSET 1
    TAG_CLEAR 0
    MUTEX_WAIT 1
    MUTEX_LOCK 2
    MUTEX_UNLOCK 2
    JOIN_WAIT 0
    JOIN_JOINED 0
    THREAD_CREATE 0
    THREAD_EXIT 0

    ----- stderr -----
    ");
}

#[test]
fn test_count_reports_unknown_kinds() {
    let mut bytes = tagtrace::trace::record::encode_all(&contended_request());
    let mut unknown = [0u8; 40];
    unknown[0] = 77;
    bytes.extend_from_slice(&unknown);
    let trace = TestTrace::from_bytes(&bytes);

    let output = tagtrace_command(&trace)
        .arg("count")
        .arg(trace.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).ends_with("UNKNOWN(77) 1\n"));
}
