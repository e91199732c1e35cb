//! End-to-end latency of every request in a trace.
//!
//! Used to pick which tag is worth a closer look with the analyzer, and to
//! select a latency band for [`super::stats`].
//!
//! A tag is in flight from its first `TagSet` until no thread carries it any
//! more. Work handed off between threads keeps it alive as long as the
//! handoffs overlap.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::record::{EventKind, TraceRecord};
use super::stats::percentile;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TagLatency {
    pub tag: u64,
    /// First `TagSet`, µs
    pub start: f64,
    /// When the last carrying thread released it, µs
    pub finish: f64,
    pub latency: f64,
}

/// Which tag each thread carries, and which threads carry each tag.
#[derive(Debug, Default)]
struct Lifetimes {
    carried: HashMap<u32, u64>,
    in_flight: HashMap<u64, (f64, HashSet<u32>)>,
    finished: Vec<TagLatency>,
}

impl Lifetimes {
    fn set(&mut self, thread_id: u32, tag: u64, ts: f64) {
        match self.carried.get(&thread_id) {
            Some(&current) if current == tag => return,
            Some(_) => self.release(thread_id, ts),
            None => {}
        }
        if tag == 0 {
            return;
        }
        self.carried.insert(thread_id, tag);
        self.in_flight
            .entry(tag)
            .or_insert_with(|| (ts, HashSet::new()))
            .1
            .insert(thread_id);
    }

    /// `thread_id` stops carrying `tag`; other tags are left alone.
    fn release_tag(&mut self, thread_id: u32, tag: u64, ts: f64) {
        if self.carried.get(&thread_id) == Some(&tag) {
            self.release(thread_id, ts);
        }
    }

    fn release(&mut self, thread_id: u32, ts: f64) {
        let Some(tag) = self.carried.remove(&thread_id) else {
            return;
        };
        let Some((start, threads)) = self.in_flight.get_mut(&tag) else {
            return;
        };
        threads.remove(&thread_id);
        if threads.is_empty() {
            let start = *start;
            self.in_flight.remove(&tag);
            self.finished.push(TagLatency {
                tag,
                start,
                finish: ts,
                latency: ts - start,
            });
        }
    }
}

/// Per-request latency, slowest first.
///
/// A thread stops carrying a tag when it re-tags to a different request, or on
/// `TagBlock`/`TagUnset` of that tag, or on `TagClear`. A release of a tag the
/// thread doesn't carry is ignored. Tags still carried when the trace ends are
/// omitted. A tag reused after it finished is reported once per lifetime.
///
/// Records are taken in timestamp order, whatever order the file has them in.
pub fn tag_latencies(records: impl IntoIterator<Item = TraceRecord>) -> Vec<TagLatency> {
    let mut records: Vec<TraceRecord> = records
        .into_iter()
        .filter(|r| {
            matches!(
                r.kind(),
                Some(
                    EventKind::TagSet
                        | EventKind::TagBlock
                        | EventKind::TagUnset
                        | EventKind::TagClear
                )
            )
        })
        .collect();
    records.sort_by(|a, b| a.timestamp_us().total_cmp(&b.timestamp_us()));

    let mut lifetimes = Lifetimes::default();
    for record in &records {
        let tid = record.thread_id;
        let ts = record.timestamp_us();
        match record.kind() {
            Some(EventKind::TagSet) => lifetimes.set(tid, record.arg1, ts),
            Some(EventKind::TagBlock | EventKind::TagUnset) => {
                lifetimes.release_tag(tid, record.arg1, ts)
            }
            Some(EventKind::TagClear) => lifetimes.release(tid, ts),
            _ => {}
        }
    }

    if !lifetimes.in_flight.is_empty() {
        log::debug!(
            "{} tag(s) still in flight at end of trace",
            lifetimes.in_flight.len()
        );
    }

    let mut latencies = lifetimes.finished;
    latencies.sort_by(|a, b| {
        b.latency
            .total_cmp(&a.latency)
            .then(a.tag.cmp(&b.tag))
            .then(a.start.total_cmp(&b.start))
    });
    latencies
}

/// Latency distribution at `steps + 1` evenly spaced quantiles, `(q, latency)`.
pub fn latency_cdf(latencies: &[TagLatency], steps: usize) -> Vec<(f64, f64)> {
    let mut sorted: Vec<f64> = latencies.iter().map(|l| l.latency).collect();
    sorted.sort_by(f64::total_cmp);
    let steps = steps.max(1);

    (0..=steps)
        .filter_map(|i| {
            let q = i as f64 / steps as f64;
            Some((q, percentile(&sorted, q)?))
        })
        .collect()
}

/// Requests whose rank by latency falls in `[from, to)`, fastest first.
///
/// `from` and `to` are fractions of the request count, so `0.99..1.0` is the
/// slowest percent. Ranks are truncated the way [`percentile`] truncates.
pub fn latency_band(latencies: &[TagLatency], from: f64, to: f64) -> Vec<TagLatency> {
    let mut sorted = latencies.to_vec();
    sorted.sort_by(|a, b| a.latency.total_cmp(&b.latency).then(a.tag.cmp(&b.tag)));

    let last = sorted.len().saturating_sub(1) as f64;
    let start = (last * from.clamp(0.0, 1.0)) as usize;
    let end = (last * to.clamp(0.0, 1.0)) as usize;
    sorted.get(start..end).map(<[_]>::to_vec).unwrap_or_default()
}
