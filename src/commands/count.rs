use std::path::Path;

use tagtrace::styling::print;
use tagtrace::trace::{EventCounts, display};

use super::read_trace;

pub fn handle_count(trace: &Path) -> anyhow::Result<()> {
    let counts = EventCounts::collect(read_trace(trace)?);
    log::debug!("Counted {} record(s)", counts.total());
    print!("{}", display::render_event_counts(&counts));
    Ok(())
}
