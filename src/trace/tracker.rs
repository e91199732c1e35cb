//! Per-request thread tracking.
//!
//! For one target tag, every thread is in exactly one state:
//!
//! ```text
//!              TagSet(T)                     TagUnset(T) / TagClear
//!  Unwatched ─────────────▶ Watched ───────────────────────────────▶ Pending{expiry}
//!      ▲                     │  ▲                                         │
//!      │  TagBlock(T),       │  └──────────── TagSet(T) ──────────────────┤
//!      │  TagSet(≠T),        │                                            │
//!      │  ThreadExit         │                  sample at/after expiry,   │
//!      └─────────────────────┘◀─────────────── TagSet(≠T), ThreadExit ────┘
//! ```
//!
//! Watched threads contribute every sample. Pending threads contribute the
//! samples already in flight when the tag was released: those taken before
//! `expiry` whose start precedes the latest in-scope timestamp. The first sample
//! that misses the expiry ends the grace window for good.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexSet;
use serde::Serialize;

use super::event::{CausalEvent, CausalKind};
use super::record::{EventKind, TraceRecord};
use crate::config::AnalyzerConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThreadState {
    Unwatched,
    Watched,
    /// Released the tag; trailing samples count until `expiry` (µs)
    Pending { expiry: f64 },
}

/// Whether a record belongs to the tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    InScope,
    OutOfScope,
}

/// Running bounds of all in-scope timestamps, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Window {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Window {
    pub fn observe(&mut self, ts: f64) {
        self.min = Some(self.min.map_or(ts, |min| min.min(ts)));
        self.max = Some(self.max.map_or(ts, |max| max.max(ts)));
    }

    pub fn duration(&self) -> Option<f64> {
        Some(self.max? - self.min?)
    }
}

/// Everything the tracker learned in one pass.
#[derive(Debug, Clone, Default)]
pub struct TrackerOutput {
    /// In arrival order
    pub events: Vec<CausalEvent>,
    pub window: Window,
    /// Threads that carried the tag at some point, first-seen order
    pub threads: IndexSet<u32>,
    /// Bias-corrected addresses of in-scope samples
    pub addresses: BTreeSet<u64>,
}

/// The tag state machine for one target tag.
///
/// Feed records in file order with [`TagTracker::observe`]; the tracker never
/// looks back, so each thread's records must arrive in timestamp order.
#[derive(Debug)]
pub struct TagTracker {
    tag: u64,
    grace_window_us: f64,
    return_addr_bias: u64,
    /// Absent means Unwatched
    states: HashMap<u32, ThreadState>,
    watched: usize,
    seen: bool,
    out: TrackerOutput,
}

impl TagTracker {
    pub fn new(tag: u64, config: &AnalyzerConfig) -> Self {
        Self {
            tag,
            grace_window_us: config.grace_window_us,
            return_addr_bias: config.return_addr_bias,
            states: HashMap::new(),
            watched: 0,
            seen: false,
            out: TrackerOutput::default(),
        }
    }

    pub fn state(&self, thread_id: u32) -> ThreadState {
        self.states
            .get(&thread_id)
            .copied()
            .unwrap_or(ThreadState::Unwatched)
    }

    pub fn is_watched(&self, thread_id: u32) -> bool {
        self.state(thread_id) == ThreadState::Watched
    }

    /// True while the request is active on at least one thread.
    pub fn any_watched(&self) -> bool {
        self.watched > 0
    }

    /// Has any thread set the target tag yet?
    pub fn seen(&self) -> bool {
        self.seen
    }

    pub fn window(&self) -> Window {
        self.out.window
    }

    pub fn watch_set(&self) -> impl Iterator<Item = u32> + '_ {
        self.states
            .iter()
            .filter(|(_, state)| **state == ThreadState::Watched)
            .map(|(tid, _)| *tid)
    }

    pub fn pending_set(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.states.iter().filter_map(|(tid, state)| match state {
            ThreadState::Pending { expiry } => Some((*tid, *expiry)),
            _ => None,
        })
    }

    /// Classify one record and apply its state transition.
    ///
    /// Mutex records are classified but not emitted here; the correlation
    /// engine owns their bookkeeping and hands the resulting event back through
    /// [`TagTracker::admit`].
    pub fn observe(&mut self, record: &TraceRecord, kind: EventKind) -> Scope {
        let tid = record.thread_id;
        let ts = record.timestamp_us();

        match kind {
            EventKind::StackSample => self.observe_sample(record),

            EventKind::TagSet if record.arg1 == self.tag && self.tag != 0 => {
                if self.is_watched(tid) {
                    return Scope::InScope;
                }
                if !self.seen {
                    log::debug!("Tag {} first set on thread {tid} at {ts:.3}", self.tag);
                    self.seen = true;
                }
                self.transition(tid, ThreadState::Watched);
                self.out.threads.insert(tid);
                self.emit(CausalEvent::new(ts, tid, CausalKind::TagSet, ""));
                Scope::InScope
            }

            EventKind::TagSet => match self.state(tid) {
                ThreadState::Watched => {
                    // Re-tagged to another request: explicit handoff, no grace
                    self.transition(tid, ThreadState::Unwatched);
                    self.emit(CausalEvent::new(
                        ts,
                        tid,
                        CausalKind::TagUnset,
                        format!("new_tag={}", record.arg1),
                    ));
                    Scope::InScope
                }
                ThreadState::Pending { .. } => {
                    self.transition(tid, ThreadState::Unwatched);
                    Scope::OutOfScope
                }
                ThreadState::Unwatched => Scope::OutOfScope,
            },

            EventKind::TagBlock if record.arg1 == self.tag && self.is_watched(tid) => {
                self.transition(tid, ThreadState::Unwatched);
                self.emit(CausalEvent::new(ts, tid, CausalKind::TagBlock, ""));
                Scope::InScope
            }

            EventKind::TagUnset if record.arg1 == self.tag && self.is_watched(tid) => {
                self.release(record, CausalKind::TagUnset)
            }

            EventKind::TagClear if self.is_watched(tid) => {
                self.release(record, CausalKind::TagClear)
            }

            EventKind::MutexWait | EventKind::MutexLock | EventKind::MutexUnlock => {
                if self.is_watched(tid) {
                    Scope::InScope
                } else {
                    Scope::OutOfScope
                }
            }

            EventKind::JoinWait | EventKind::JoinJoined if self.is_watched(tid) => {
                self.emit(CausalEvent::new(
                    ts,
                    tid,
                    CausalKind::from_event(kind),
                    format!("thread={:#x}", record.arg1),
                ));
                Scope::InScope
            }

            EventKind::ThreadCreate if self.is_watched(tid) => {
                self.emit(CausalEvent::new(
                    ts,
                    tid,
                    CausalKind::ThreadCreate,
                    format!("child={}", record.arg1),
                ));
                Scope::InScope
            }

            EventKind::ThreadExit => match self.state(tid) {
                ThreadState::Watched => {
                    self.transition(tid, ThreadState::Unwatched);
                    self.emit(CausalEvent::new(ts, tid, CausalKind::ThreadExit, ""));
                    Scope::InScope
                }
                ThreadState::Pending { .. } => {
                    self.transition(tid, ThreadState::Unwatched);
                    Scope::OutOfScope
                }
                ThreadState::Unwatched => Scope::OutOfScope,
            },

            _ => Scope::OutOfScope,
        }
    }

    /// Record an in-scope event built elsewhere (mutex bookkeeping).
    pub fn admit(&mut self, event: CausalEvent) {
        self.emit(event);
    }

    pub fn finish(self) -> TrackerOutput {
        if self.watched > 0 {
            log::debug!(
                "Trace ended with tag {} still set on {} thread(s)",
                self.tag,
                self.watched
            );
        }
        self.out
    }

    fn observe_sample(&mut self, record: &TraceRecord) -> Scope {
        let tid = record.thread_id;
        let ts = record.timestamp_us();
        let latency = record.sample_latency_us();

        match self.state(tid) {
            ThreadState::Unwatched => return Scope::OutOfScope,
            ThreadState::Watched => {}
            ThreadState::Pending { expiry } => {
                if ts >= expiry {
                    log::debug!("Grace window for thread {tid} expired at {expiry:.3}");
                    self.transition(tid, ThreadState::Unwatched);
                    return Scope::OutOfScope;
                }
                // A sample that began after the request's last known moment
                // measures something else
                if !self.out.window.max.is_some_and(|max| ts - latency <= max) {
                    return Scope::OutOfScope;
                }
            }
        }

        let address = record.arg2.wrapping_sub(self.return_addr_bias);
        self.out.addresses.insert(address);
        self.emit(
            CausalEvent::new(
                ts,
                tid,
                CausalKind::StackSample,
                format!("ngen={}, latency={latency:.3} us", record.arg3),
            )
            .with_sample(address, latency),
        );
        Scope::InScope
    }

    fn release(&mut self, record: &TraceRecord, kind: CausalKind) -> Scope {
        let ts = record.timestamp_us();
        self.transition(
            record.thread_id,
            ThreadState::Pending {
                expiry: ts + self.grace_window_us,
            },
        );
        self.emit(CausalEvent::new(ts, record.thread_id, kind, ""));
        Scope::InScope
    }

    fn emit(&mut self, event: CausalEvent) {
        self.out.window.observe(event.timestamp);
        self.out.events.push(event);
    }

    fn transition(&mut self, tid: u32, next: ThreadState) {
        let prev = self.state(tid);
        if prev == ThreadState::Watched {
            self.watched -= 1;
        }
        if next == ThreadState::Watched {
            self.watched += 1;
        }
        match next {
            ThreadState::Unwatched => self.states.remove(&tid),
            state => self.states.insert(tid, state),
        };
    }
}
