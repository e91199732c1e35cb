//! Chrome Trace Format output for a request timeline.
//!
//! Converts a [`Timeline`] to Chrome Trace Event Format JSON, which can be
//! visualized in chrome://tracing or <https://ui.perfetto.dev>.
//!
//! # Event Types
//!
//! - **Complete events** (`ph: "X"`): sample bars and mutex critical sections
//! - **Instant events** (`ph: "I"`): tag lifecycle, mutex, join and scheduler events
//! - **Metadata events** (`ph: "M"`): thread names, marking mutex holders
//!
//! Request threads live in process 1 and mutex holders in process 2, so the
//! UI groups them separately.
//!
//! # Usage
//!
//! ```bash
//! tagtrace analyze ldb.data --tag 42 --format chrome > trace.json
//! # Then open trace.json in chrome://tracing or https://ui.perfetto.dev
//! ```
//!
//! # Format Reference
//!
//! - [Trace Event Format](https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/)
//! - [Perfetto UI](https://ui.perfetto.dev)

use std::collections::HashMap;

use serde::Serialize;

use super::CausalKind;
use super::timeline::{ThreadRole, Timeline};

const REQUEST_PID: u32 = 1;
const HOLDER_PID: u32 = 2;

/// A Chrome Trace Event in the Trace Event Format.
///
/// Uses `#[serde(skip_serializing_if)]` to emit the correct fields for each phase:
/// - Complete events ("X"): have `dur`, no `s`
/// - Instant events ("I"): have `s` (scope), no `dur`
/// - Metadata events ("M"): neither
#[derive(Debug, Serialize)]
struct TraceEvent {
    name: String,
    ph: &'static str,
    /// Microseconds
    ts: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    dur: Option<f64>,
    /// Scope for instant events: "g" (global), "p" (process), or "t" (thread)
    #[serde(skip_serializing_if = "Option::is_none")]
    s: Option<&'static str>,
    pid: u32,
    tid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cat: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<TraceEventArgs>,
}

/// Custom arguments attached to trace events.
#[derive(Debug, Default, Serialize)]
struct TraceEventArgs {
    /// Thread name (metadata events)
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    /// Stacking lane of a sample bar
    #[serde(skip_serializing_if = "Option::is_none")]
    lane: Option<usize>,
}

/// The top-level Chrome Trace Format structure.
#[derive(Debug, Serialize)]
struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<TraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: &'static str,
    #[serde(rename = "meta_generator")]
    meta_generator: &'static str,
}

fn pid_for(role: ThreadRole) -> u32 {
    match role {
        ThreadRole::Request => REQUEST_PID,
        ThreadRole::MutexHolder => HOLDER_PID,
    }
}

fn category(kind: CausalKind) -> &'static str {
    match kind {
        CausalKind::TagSet | CausalKind::TagUnset | CausalKind::TagBlock | CausalKind::TagClear => {
            "tag"
        }
        CausalKind::MutexWait | CausalKind::MutexLock | CausalKind::MutexUnlock => "mutex",
        kind if kind.is_sched() => "sched",
        _ => "thread",
    }
}

/// Convert a timeline to Chrome Trace Format JSON.
///
/// Returns pretty-printed JSON suitable for chrome://tracing or Perfetto.
pub fn to_chrome_trace(timeline: &Timeline) -> serde_json::Result<String> {
    let mut trace_events = Vec::new();
    let mut roles = HashMap::new();

    for thread in &timeline.threads {
        roles.entry(thread.thread_id).or_insert(thread.role);
        let pid = pid_for(thread.role);
        let name = match thread.role {
            ThreadRole::Request => format!("tid {}", thread.thread_id),
            ThreadRole::MutexHolder => format!("tid {} (mutex holder)", thread.thread_id),
        };
        trace_events.push(TraceEvent {
            name: "thread_name".to_string(),
            ph: "M",
            ts: 0.0,
            dur: None,
            s: None,
            pid,
            tid: thread.thread_id,
            cat: None,
            args: Some(TraceEventArgs {
                name: Some(name),
                ..Default::default()
            }),
        });

        for bar in &thread.bars {
            trace_events.push(TraceEvent {
                name: bar.label.clone(),
                ph: "X", // Complete event (has duration)
                ts: bar.start,
                dur: Some(bar.duration()),
                s: None,
                pid,
                tid: thread.thread_id,
                cat: Some(match thread.role {
                    ThreadRole::Request => "sample",
                    ThreadRole::MutexHolder => "holder-sample",
                }),
                args: Some(TraceEventArgs {
                    lane: Some(bar.lane),
                    ..Default::default()
                }),
            });
        }

        for &(lock, unlock) in &thread.critical_sections {
            trace_events.push(TraceEvent {
                name: "critical section".to_string(),
                ph: "X",
                ts: lock,
                dur: Some(unlock - lock),
                s: None,
                pid,
                tid: thread.thread_id,
                cat: Some("critical-section"),
                args: None,
            });
        }
    }

    for event in timeline.events.iter().filter(|e| !e.kind.is_sample()) {
        // Every request thread has a panel; the rest are holders below the
        // sample threshold
        let pid = roles
            .get(&event.thread_id)
            .map_or(HOLDER_PID, |&role| pid_for(role));
        trace_events.push(TraceEvent {
            name: event.kind.to_string(),
            ph: "I", // Instant event (no duration)
            ts: event.timestamp,
            dur: None,
            s: Some("t"), // Thread scope
            pid,
            tid: event.thread_id,
            cat: Some(category(event.kind)),
            args: (!event.detail.is_empty()).then(|| TraceEventArgs {
                detail: Some(event.detail.clone()),
                ..Default::default()
            }),
        });
    }

    let chrome_trace = ChromeTrace {
        trace_events,
        display_time_unit: "ns",
        meta_generator: "tagtrace analyze",
    };

    serde_json::to_string_pretty(&chrome_trace)
}
