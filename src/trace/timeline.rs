//! Assemble a request timeline from a trace.
//!
//! [`Analyzer`] drives one pass over the records: the tag tracker decides what
//! belongs to the request while the mutex correlator buffers everything it
//! needs for holder inference. Afterwards the candidate events are sorted,
//! annotated with symbols, merged with scheduler events and laid out per
//! thread.

use std::collections::{BTreeSet, HashSet};
use std::io;

use serde::Serialize;

use super::event::{CausalEvent, CausalKind, sort_by_timestamp};
use super::layout::{TimelineBar, bars_for};
use super::mutex::{MutexCorrelator, WaitInterval};
use super::record::{EventKind, TraceRecord};
use super::sched::{SchedEvent, filter_sched, merge};
use super::symbolize::{NullSymbolizer, Symbol, Symbolizer};
use super::tracker::{Scope, TagTracker};
use crate::config::AnalyzerConfig;
use crate::error::TraceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "kebab-case")]
pub enum ThreadRole {
    /// Carried the tag
    Request,
    /// Held a mutex the request waited on
    MutexHolder,
}

/// One rendered panel: a thread's sampled work, stacked into lanes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadTimeline {
    pub thread_id: u32,
    pub role: ThreadRole,
    pub bars: Vec<TimelineBar>,
    /// Highest lane in `bars`; 0 when there are none
    pub max_lane: usize,
    /// `(lock_ts, unlock_ts)` ranges where both ends were observed
    pub critical_sections: Vec<(f64, f64)>,
}

/// The reconstructed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub tag: u64,
    /// Timestamp-ordered; ties keep request events before holder samples
    pub events: Vec<CausalEvent>,
    pub threads: Vec<ThreadTimeline>,
    pub min_ts: Option<f64>,
    pub max_ts: Option<f64>,
    pub wait_intervals: Vec<WaitInterval>,
}

impl Timeline {
    /// Wall time between the first and last in-scope event.
    pub fn duration(&self) -> Option<f64> {
        Some(self.max_ts? - self.min_ts?)
    }

    /// The tag never appeared in the trace.
    pub fn is_empty(&self) -> bool {
        self.min_ts.is_none()
    }

    /// `ts` relative to the start of the request.
    pub fn relative(&self, ts: f64) -> f64 {
        ts - self.min_ts.unwrap_or(0.0)
    }

    pub fn thread(&self, thread_id: u32, role: ThreadRole) -> Option<&ThreadTimeline> {
        self.threads
            .iter()
            .find(|t| t.thread_id == thread_id && t.role == role)
    }
}

/// Reconstructs the timeline of one tag.
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use tagtrace::config::AnalyzerConfig;
/// use tagtrace::trace::{Analyzer, TraceReader};
///
/// let file = BufReader::new(File::open("ldb.data")?);
/// let timeline = Analyzer::new(42, AnalyzerConfig::default())?.run(TraceReader::new(file))?;
/// println!("{} events", timeline.events.len());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct Analyzer<'a> {
    tag: u64,
    config: AnalyzerConfig,
    symbolizer: Box<dyn Symbolizer + 'a>,
    sched_events: Vec<SchedEvent>,
}

impl<'a> Analyzer<'a> {
    pub fn new(tag: u64, config: AnalyzerConfig) -> Result<Self, TraceError> {
        if tag == 0 {
            return Err(TraceError::UntrackableTag);
        }
        Ok(Self {
            tag,
            config,
            symbolizer: Box::new(NullSymbolizer),
            sched_events: Vec::new(),
        })
    }

    pub fn symbolizer(mut self, symbolizer: impl Symbolizer + 'a) -> Self {
        self.symbolizer = Box::new(symbolizer);
        self
    }

    /// Time-ordered scheduler events to merge in.
    pub fn sched_events(mut self, events: Vec<SchedEvent>) -> Self {
        self.sched_events = events;
        self
    }

    /// Analyze decoded records, such as a [`TraceReader`](super::TraceReader).
    pub fn run(self, records: impl IntoIterator<Item = io::Result<TraceRecord>>) -> io::Result<Timeline> {
        let mut tracker = TagTracker::new(self.tag, &self.config);
        let mut correlator = MutexCorrelator::new(&self.config);
        let mut skipped = 0usize;

        for record in records {
            let record = record?;
            let Some(kind) = record.kind() else {
                skipped += 1;
                continue;
            };

            let buffering = tracker.any_watched();
            let scope = tracker.observe(&record, kind);
            let is_mutex = matches!(
                kind,
                EventKind::MutexWait | EventKind::MutexLock | EventKind::MutexUnlock
            );
            if scope == Scope::InScope && is_mutex {
                let event = correlator.record_watched(&record, kind);
                tracker.admit(event);
            }
            if buffering {
                correlator.buffer(record, kind);
            }
        }

        if skipped > 0 {
            log::debug!("Skipped {skipped} record(s) with unknown event type");
        }
        if !tracker.seen() {
            log::debug!("Tag {} not found in trace", self.tag);
        }
        log::debug!("Buffered {} record(s) for mutex correlation", correlator.buffered());

        Ok(self.assemble(tracker, correlator))
    }

    /// [`Analyzer::run`] over records already in memory.
    pub fn run_records(self, records: impl IntoIterator<Item = TraceRecord>) -> Timeline {
        let tag = self.tag;
        self.run(records.into_iter().map(Ok))
            .unwrap_or_else(|_| empty_timeline(tag))
    }

    fn assemble(self, tracker: TagTracker, correlator: MutexCorrelator) -> Timeline {
        let request = tracker.finish();
        let correlation = correlator.correlate();

        let mut events = request.events;
        sort_by_timestamp(&mut events);
        events.extend(correlation.holder_events.iter().cloned());
        sort_by_timestamp(&mut events);

        let addresses: BTreeSet<u64> = request
            .addresses
            .union(&correlation.addresses)
            .copied()
            .collect();
        let symbols = self.symbolizer.resolve(&addresses);
        log::debug!(
            "Resolved {} of {} sampled address(es)",
            symbols.len(),
            addresses.len()
        );
        for event in &mut events {
            if let Some(address) = event.address {
                let symbol = symbols.get(&address).unwrap_or(&Symbol::Unresolved);
                event.symbol = Some(symbol.to_string());
            }
        }

        let involved: HashSet<u32> = request
            .threads
            .iter()
            .chain(correlation.holder_threads.iter())
            .copied()
            .collect();
        let sched = filter_sched(self.sched_events, &involved, request.window);
        let events = merge(events, sched);

        let mut threads = Vec::new();
        for &thread_id in &request.threads {
            threads.push(thread_timeline(
                &events,
                thread_id,
                ThreadRole::Request,
                correlation.ledger.critical_sections(thread_id),
            ));
        }
        let holder_samples = correlation.samples_per_holder();
        for &thread_id in &correlation.holder_threads {
            let samples = holder_samples.get(&thread_id).copied().unwrap_or_default();
            if samples < self.config.min_holder_samples {
                log::debug!("Not drawing holder thread {thread_id}: only {samples} sample(s)");
                continue;
            }
            threads.push(thread_timeline(
                &events,
                thread_id,
                ThreadRole::MutexHolder,
                correlation.ledger.critical_sections(thread_id),
            ));
        }

        Timeline {
            tag: self.tag,
            events,
            threads,
            min_ts: request.window.min,
            max_ts: request.window.max,
            wait_intervals: correlation.intervals,
        }
    }
}

fn thread_timeline(
    events: &[CausalEvent],
    thread_id: u32,
    role: ThreadRole,
    critical_sections: Vec<(f64, f64)>,
) -> ThreadTimeline {
    let sample_kind = match role {
        ThreadRole::Request => CausalKind::StackSample,
        ThreadRole::MutexHolder => CausalKind::MholderStackSample,
    };
    let (bars, max_lane) = bars_for(
        events
            .iter()
            .filter(|e| e.thread_id == thread_id && e.kind == sample_kind),
    );
    ThreadTimeline {
        thread_id,
        role,
        bars,
        max_lane,
        critical_sections,
    }
}

fn empty_timeline(tag: u64) -> Timeline {
    Timeline {
        tag,
        events: Vec::new(),
        threads: Vec::new(),
        min_ts: None,
        max_ts: None,
        wait_intervals: Vec::new(),
    }
}
