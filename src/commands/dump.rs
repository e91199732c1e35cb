use std::path::Path;

use tagtrace::styling::print;
use tagtrace::trace::display;

use super::read_trace;

pub fn handle_dump(trace: &Path, thread: Option<u32>) -> anyhow::Result<()> {
    let records = read_trace(trace)?;
    let selected = records
        .iter()
        .filter(|r| thread.is_none_or(|tid| r.thread_id == tid));
    print!("{}", display::render_records(selected));
    Ok(())
}
