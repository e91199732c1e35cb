//! Mutex-holder inference.
//!
//! A request that waits on a lock shows up in its own samples as an idle gap.
//! The thread holding the lock during that gap is usually doing unrelated work,
//! but that work *is* the request's latency. This module recovers it:
//!
//! 1. While the tracker watches a thread, its mutex wait/lock pairs become
//!    [`WaitInterval`]s.
//! 2. While any thread is watched, samples, locks and unlocks are buffered,
//!    whichever thread produced them, along with the watched threads' waits.
//! 3. After the pass, the buffer is replayed in timestamp order, maintaining
//!    who holds each mutex and every thread's [`WaitLockLedger`]. A sample from
//!    the holder whose start falls strictly inside a wait interval is
//!    attributed to the waiting request.
//!
//! Releasing a mutex grants the previous holder a short extension so that the
//! sample in flight at unlock time still counts.
//!
//! This is a heuristic: concurrent work that happens to overlap a wait on the
//! same mutex holder is attributed too.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexSet;
use serde::Serialize;

use super::event::{CausalEvent, CausalKind, sort_by_timestamp};
use super::record::{EventKind, TraceRecord};
use crate::config::AnalyzerConfig;

/// A watched thread blocked on `mutex` from `wait_ts` until `lock_ts`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaitInterval {
    pub thread_id: u32,
    pub mutex: u64,
    pub wait_ts: f64,
    pub lock_ts: f64,
}

impl WaitInterval {
    /// Strictly inside; a sample starting exactly at either edge is not evidence.
    fn covers(&self, ts: f64) -> bool {
        self.wait_ts < ts && ts < self.lock_ts
    }
}

/// One acquisition of a mutex by one thread.
///
/// Any field may be missing: uncontended locks have no wait, and the trace may
/// end (or the thread stop being watched) before the unlock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WaitLock {
    pub wait_ts: Option<f64>,
    pub lock_ts: Option<f64>,
    pub unlock_ts: Option<f64>,
}

impl WaitLock {
    /// The locked range, when both ends were observed.
    pub fn critical_section(&self) -> Option<(f64, f64)> {
        Some((self.lock_ts?, self.unlock_ts?))
    }
}

/// Per-thread history of mutex acquisitions, in timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WaitLockLedger(BTreeMap<u32, Vec<WaitLock>>);

impl WaitLockLedger {
    pub fn open_wait(&mut self, thread_id: u32, ts: f64) {
        self.0.entry(thread_id).or_default().push(WaitLock {
            wait_ts: Some(ts),
            ..Default::default()
        });
    }

    /// Close the pending wait, or record an uncontended acquisition.
    pub fn lock(&mut self, thread_id: u32, ts: f64) {
        let entries = self.0.entry(thread_id).or_default();
        match entries.last_mut() {
            Some(last) if last.wait_ts.is_some() && last.lock_ts.is_none() => {
                last.lock_ts = Some(ts);
            }
            _ => entries.push(WaitLock {
                lock_ts: Some(ts),
                ..Default::default()
            }),
        }
    }

    /// Close the most recent acquisition that is still held.
    pub fn unlock(&mut self, thread_id: u32, ts: f64) {
        let held = self.0.get_mut(&thread_id).and_then(|entries| {
            entries
                .iter_mut()
                .rev()
                .find(|e| e.lock_ts.is_some() && e.unlock_ts.is_none())
        });
        match held {
            Some(entry) => entry.unlock_ts = Some(ts),
            None => log::debug!("Unlock on thread {thread_id} at {ts:.3} without a recorded lock"),
        }
    }

    pub fn get(&self, thread_id: u32) -> &[WaitLock] {
        self.0.get(&thread_id).map_or(&[], Vec::as_slice)
    }

    pub fn critical_sections(&self, thread_id: u32) -> Vec<(f64, f64)> {
        self.get(thread_id)
            .iter()
            .filter_map(WaitLock::critical_section)
            .collect()
    }
}

/// Result of replaying the buffered records.
#[derive(Debug, Clone, Default)]
pub struct Correlation {
    /// `MHOLDER_STACK_SAMPLE` events, timestamp-sorted
    pub holder_events: Vec<CausalEvent>,
    /// Threads with at least one attributed sample, first-attributed order
    pub holder_threads: IndexSet<u32>,
    pub ledger: WaitLockLedger,
    pub intervals: Vec<WaitInterval>,
    /// Bias-corrected addresses of attributed samples
    pub addresses: BTreeSet<u64>,
}

impl Correlation {
    /// Attributed sample counts per holder thread.
    pub fn samples_per_holder(&self) -> HashMap<u32, usize> {
        let mut counts = HashMap::new();
        for event in &self.holder_events {
            *counts.entry(event.thread_id).or_default() += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, Copy)]
struct Buffered {
    record: TraceRecord,
    kind: EventKind,
}

/// Collects mutex evidence during the tracker pass and correlates it afterwards.
#[derive(Debug)]
pub struct MutexCorrelator {
    grace_window_us: f64,
    return_addr_bias: u64,
    buffer: Vec<Buffered>,
    last_wait: HashMap<u32, f64>,
    /// Keyed by `(thread, mutex)`; only locks seen while buffering
    last_lock: HashMap<(u32, u64), f64>,
    intervals: Vec<WaitInterval>,
}

impl MutexCorrelator {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            grace_window_us: config.grace_window_us,
            return_addr_bias: config.return_addr_bias,
            buffer: Vec::new(),
            last_wait: HashMap::new(),
            last_lock: HashMap::new(),
            intervals: Vec::new(),
        }
    }

    /// Keep a record for the replay. Call only while some thread is watched,
    /// after [`MutexCorrelator::record_watched`] for the same record.
    pub fn buffer(&mut self, record: TraceRecord, kind: EventKind) {
        let key = (record.thread_id, record.arg1);
        match kind {
            EventKind::MutexLock => {
                self.last_lock.insert(key, record.timestamp_us());
            }
            EventKind::MutexUnlock => {
                self.last_lock.remove(&key);
            }
            EventKind::StackSample => {}
            // Only watched threads' waits reach the replay, via record_watched
            _ => return,
        }
        self.buffer.push(Buffered { record, kind });
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Describe a mutex record from a watched thread.
    ///
    /// `kind` must be one of the three mutex kinds. Waits are queued for the
    /// replay here; locks and unlocks are left to [`MutexCorrelator::buffer`].
    pub fn record_watched(&mut self, record: &TraceRecord, kind: EventKind) -> CausalEvent {
        let tid = record.thread_id;
        let ts = record.timestamp_us();
        let mutex = record.arg1;

        let detail = match kind {
            EventKind::MutexWait => {
                self.last_wait.insert(tid, ts);
                self.buffer.push(Buffered {
                    record: *record,
                    kind,
                });
                format!("mutex={mutex:#x}")
            }
            EventKind::MutexLock => {
                let wait_ts = self.last_wait.remove(&tid);
                if let Some(wait_ts) = wait_ts {
                    self.intervals.push(WaitInterval {
                        thread_id: tid,
                        mutex,
                        wait_ts,
                        lock_ts: ts,
                    });
                }
                format!(
                    "mutex={mutex:#x}, wait_time={}",
                    format_elapsed(wait_ts.map(|w| ts - w))
                )
            }
            _ => {
                let lock_ts = self.last_lock.get(&(tid, mutex)).copied();
                format!(
                    "mutex={mutex:#x}, lock_time={}",
                    format_elapsed(lock_ts.map(|l| ts - l))
                )
            }
        };

        CausalEvent::new(ts, tid, CausalKind::from_event(kind), detail)
    }

    /// Replay the buffer and attribute holder samples to the recorded waits.
    pub fn correlate(mut self) -> Correlation {
        self.buffer
            .sort_by(|a, b| a.record.timestamp_us().total_cmp(&b.record.timestamp_us()));
        self.intervals.sort_by(|a, b| a.wait_ts.total_cmp(&b.wait_ts));

        let mut holders: HashMap<u64, u32> = HashMap::new();
        let mut extensions: HashMap<u32, f64> = HashMap::new();
        let mut out = Correlation::default();

        for Buffered { record, kind } in &self.buffer {
            let tid = record.thread_id;
            let ts = record.timestamp_us();

            match kind {
                EventKind::StackSample => {
                    if extensions.get(&tid).is_some_and(|expiry| ts > *expiry) {
                        extensions.remove(&tid);
                    }
                    let latency = record.sample_latency_us();
                    let start = ts - latency;
                    let extended = extensions.contains_key(&tid);

                    let Some(interval) = self.intervals.iter().find(|iv| {
                        iv.thread_id != tid
                            && iv.covers(start)
                            && (extended || holders.get(&iv.mutex) == Some(&tid))
                    }) else {
                        continue;
                    };

                    let address = record.arg2.wrapping_sub(self.return_addr_bias);
                    out.addresses.insert(address);
                    out.holder_threads.insert(tid);
                    out.holder_events.push(
                        CausalEvent::new(
                            ts,
                            tid,
                            CausalKind::MholderStackSample,
                            format!(
                                "mutex={:#x}, ngen={}, latency={latency:.3} us",
                                interval.mutex, record.arg3
                            ),
                        )
                        .with_sample(address, latency),
                    );
                }
                EventKind::MutexWait => out.ledger.open_wait(tid, ts),
                EventKind::MutexLock => {
                    holders.insert(record.arg1, tid);
                    out.ledger.lock(tid, ts);
                }
                EventKind::MutexUnlock => {
                    if let Some(holder) = holders.remove(&record.arg1) {
                        extensions.insert(holder, ts + self.grace_window_us);
                    }
                    out.ledger.unlock(tid, ts);
                }
                _ => {}
            }
        }

        sort_by_timestamp(&mut out.holder_events);
        log::debug!(
            "Replayed {} buffered records against {} wait interval(s): {} holder sample(s) on {} thread(s)",
            self.buffer.len(),
            self.intervals.len(),
            out.holder_events.len(),
            out.holder_threads.len()
        );

        out.intervals = self.intervals;
        out
    }
}

fn format_elapsed(elapsed: Option<f64>) -> String {
    match elapsed {
        Some(us) => format!("{us:.3} us"),
        None => "unknown".to_string(),
    }
}
