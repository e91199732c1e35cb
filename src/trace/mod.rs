//! Request reconstruction from a binary event trace.
//!
//! An instrumented server writes one fixed-width record per event (tag changes,
//! stack samples, mutex and thread activity). Given a request tag, this module
//! finds every thread that worked on the request, infers the work of threads
//! that blocked it through mutexes, and lays the result out as a timeline.
//!
//! # Pipeline
//!
//! ```text
//! TraceReader ─▶ TagTracker ─┬─▶ sort ─▶ symbolize ─▶ merge sched ─▶ layout ─▶ Timeline
//!               MutexCorrelator ┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Which requests were slow?
//! tagtrace latency ldb.data | head
//!
//! # Where does the slowest percent of requests spend its sampled time?
//! tagtrace summary ldb.data --maps maps.txt --from-pct 0.99 --to-pct 1.0
//!
//! # Everything that happened to request 42, with scheduler activity
//! perf sched script --ns -F -comm > perf.txt
//! tagtrace analyze ldb.data --tag 42 --sched perf.txt --maps maps.txt
//!
//! # Visualize: open trace.json in chrome://tracing or https://ui.perfetto.dev
//! tagtrace analyze ldb.data --tag 42 --format chrome > trace.json
//! ```

pub mod chrome;
pub mod display;
pub mod event;
pub mod latency;
pub mod layout;
pub mod mutex;
pub mod record;
pub mod sched;
pub mod stats;
pub mod symbolize;
pub mod timeline;
pub mod tracker;

// Re-export main types for convenience
pub use chrome::to_chrome_trace;
pub use event::{CausalEvent, CausalKind};
pub use latency::{TagLatency, latency_band, latency_cdf, tag_latencies};
pub use layout::TimelineBar;
pub use record::{EventKind, RECORD_SIZE, TraceReader, TraceRecord};
pub use sched::{PerfScript, SchedEvent, SchedKind, SchedSource};
pub use stats::{EventCounts, PcStats, SampleStats};
pub use symbolize::{MapsSymbolizer, NullSymbolizer, Symbol, Symbolizer};
pub use timeline::{Analyzer, ThreadRole, ThreadTimeline, Timeline};
