//! Terminal styling for rendered timelines and messages.
//!
//! This module uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - Semantic style constants for event categories
//!
//! ## stdout vs stderr principle
//!
//! - **stdout**: analysis output (timelines, tables, JSON)
//! - **stderr**: diagnostics (errors, warnings, hints, logs)

mod constants;

// Re-exports from anstream (auto-detecting output)
pub use anstream::{eprint, eprintln, print, println, stderr, stdout};

// Re-exports from anstyle (for composition)
pub use anstyle::Style as AnstyleStyle;

pub use constants::*;

use crate::trace::CausalKind;

/// Style used for an event kind in text output.
pub fn kind_style(kind: CausalKind) -> anstyle::Style {
    match kind {
        CausalKind::StackSample => SAMPLE,
        CausalKind::MholderStackSample => HOLDER_SAMPLE,
        kind if kind.is_sched() => SCHED,
        _ => LIFECYCLE,
    }
}

/// Remove ANSI escapes, for width math and plain-text assertions.
pub fn strip_ansi(s: &str) -> String {
    anstream::adapter::strip_str(s).to_string()
}
