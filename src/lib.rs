//! Reconstruct per-request timelines from a multi-threaded server's event trace.
//!
//! See [`trace`] for the pipeline and [`trace::Analyzer`] for the entry point.

pub mod config;
pub mod error;
pub mod styling;
pub mod trace;

pub use config::AnalyzerConfig;
pub use error::TraceError;
