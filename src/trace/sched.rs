//! Kernel scheduler events, merged into a request timeline.
//!
//! The scheduler trace is captured separately (for example with
//! `perf sched record`) and decoded to text with
//! `perf sched script --ns -F -comm`, which prints one event per line:
//!
//! ```text
//!    4242 [003] 12345.678901234: sched:sched_switch: prev_pid=4242 prev_prio=120 prev_state=S ==> next_pid=0 next_prio=120
//!    4250 [001] 12345.678905000: sched:sched_waking: pid=4242 prio=120 target_cpu=003
//! ```
//!
//! Events come in time order, so merging with the (sorted) causal events is a
//! single linear pass.

use std::collections::HashSet;
use std::io::{self, BufRead};

use serde::Serialize;

use super::event::{CausalEvent, CausalKind};
use super::tracker::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SchedKind {
    Switch,
    Waking,
    Migrate,
}

impl SchedKind {
    /// Recognize a tracepoint name such as `sched:sched_switch`.
    pub fn from_tracepoint(name: &str) -> Option<Self> {
        if name.contains("sched_switch") {
            Some(SchedKind::Switch)
        } else if name.contains("sched_waking") {
            Some(SchedKind::Waking)
        } else if name.contains("sched_migrate_task") {
            Some(SchedKind::Migrate)
        } else {
            None
        }
    }

    pub fn causal_kind(self) -> CausalKind {
        match self {
            SchedKind::Switch => CausalKind::SchedSwitch,
            SchedKind::Waking => CausalKind::SchedWaking,
            SchedKind::Migrate => CausalKind::SchedMigrate,
        }
    }
}

/// One scheduler event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedEvent {
    /// Microseconds, same clock as the event trace
    pub timestamp: f64,
    /// Thread the event was recorded under (for wakeups, the *waker*)
    pub thread_id: u32,
    pub kind: SchedKind,
    /// `cpu_id=<n>, <tracepoint fields>`
    pub detail: String,
}

impl SchedEvent {
    /// Does this event concern `thread_id`, directly or through its fields?
    fn mentions(&self, threads: &HashSet<u32>) -> bool {
        threads.contains(&self.thread_id)
            || self.detail.split_whitespace().any(|token| {
                token
                    .strip_prefix("next_pid=")
                    .or_else(|| token.strip_prefix("pid="))
                    .and_then(|tid| tid.parse::<u32>().ok())
                    .is_some_and(|tid| threads.contains(&tid))
            })
    }

    fn into_causal(self) -> CausalEvent {
        CausalEvent::new(
            self.timestamp,
            self.thread_id,
            self.kind.causal_kind(),
            self.detail,
        )
    }
}

/// Where scheduler events come from.
pub trait SchedSource {
    /// All events, in timestamp order.
    fn read_events(self) -> io::Result<Vec<SchedEvent>>;
}

impl SchedSource for Vec<SchedEvent> {
    fn read_events(self) -> io::Result<Vec<SchedEvent>> {
        Ok(self)
    }
}

/// `perf sched script` text output.
pub struct PerfScript<R>(pub R);

impl<R: BufRead> SchedSource for PerfScript<R> {
    fn read_events(self) -> io::Result<Vec<SchedEvent>> {
        let mut events = Vec::new();
        for line in self.0.lines() {
            let line = line?;
            match parse_sched_line(&line) {
                Some(event) => events.push(event),
                None if line.trim().is_empty() => {}
                None => log::debug!("Skipping unrecognized scheduler line: {line}"),
            }
        }
        Ok(events)
    }
}

/// Parse one `perf sched script` line.
///
/// Returns `None` for lines that don't match `<tid> [<cpu>] <secs>: <event>: <fields>`
/// and for tracepoints other than switch, waking and migrate.
pub fn parse_sched_line(line: &str) -> Option<SchedEvent> {
    let mut rest = line.trim_start();

    let (tid, after) = rest.split_once(char::is_whitespace)?;
    let thread_id: u32 = tid.parse().ok()?;
    rest = after.trim_start();

    let cpu_end = rest.find(']')?;
    let cpu_id: u32 = rest.strip_prefix('[')?[..cpu_end - 1].parse().ok()?;
    rest = rest[cpu_end + 1..].trim_start();

    let (secs, after) = rest.split_once(':')?;
    let timestamp = parse_seconds_as_us(secs)?;
    rest = after.trim_start();

    // The tracepoint name itself contains a colon (`sched:sched_switch`)
    let (tracepoint, fields) = match rest.find(": ") {
        Some(pos) => (&rest[..pos], rest[pos + 2..].trim()),
        None => (rest.strip_suffix(':').unwrap_or(rest), ""),
    };
    let kind = SchedKind::from_tracepoint(tracepoint)?;

    Some(SchedEvent {
        timestamp,
        thread_id,
        kind,
        detail: format!("cpu_id={cpu_id}, {fields}"),
    })
}

/// `12345.678901234` seconds to microseconds, without going through f64 seconds.
fn parse_seconds_as_us(value: &str) -> Option<f64> {
    let (secs, frac) = value.split_once('.').unwrap_or((value, ""));
    let secs: u64 = secs.parse().ok()?;
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos: u64 = if frac.is_empty() {
        0
    } else {
        frac.parse::<u64>().ok()? * 10u64.pow(9 - frac.len() as u32)
    };
    Some(secs as f64 * 1_000_000.0 + nanos as f64 / 1_000.0)
}

/// Keep the events that concern `threads` within `window`.
///
/// `events` must be time-ordered: the scan stops at the first event past the
/// window's end.
pub fn filter_sched(
    events: impl IntoIterator<Item = SchedEvent>,
    threads: &HashSet<u32>,
    window: Window,
) -> Vec<CausalEvent> {
    let (Some(min), Some(max)) = (window.min, window.max) else {
        return Vec::new();
    };

    events
        .into_iter()
        .skip_while(|e| e.timestamp < min)
        .take_while(|e| e.timestamp <= max)
        .filter(|e| e.mentions(threads))
        .map(SchedEvent::into_causal)
        .collect()
}

/// Merge two time-ordered event lists.
///
/// On equal timestamps the scheduler event comes first.
pub fn merge(causal: Vec<CausalEvent>, sched: Vec<CausalEvent>) -> Vec<CausalEvent> {
    let mut merged = Vec::with_capacity(causal.len() + sched.len());
    let mut causal = causal.into_iter().peekable();
    let mut sched = sched.into_iter().peekable();

    loop {
        let take_causal = match (causal.peek(), sched.peek()) {
            (Some(c), Some(s)) => c.timestamp < s.timestamp,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        merged.extend(if take_causal {
            causal.next()
        } else {
            sched.next()
        });
    }

    merged
}
