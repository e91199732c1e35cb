pub mod analyze;
pub mod config;
pub mod count;
pub mod dump;
pub mod latency;
pub mod summary;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use tagtrace::TraceError;
use tagtrace::trace::{MapsSymbolizer, TraceReader, TraceRecord};

pub use analyze::handle_analyze;
pub use config::handle_config_show;
pub use count::handle_count;
pub use dump::handle_dump;
pub use latency::handle_latency;
pub use summary::handle_summary;

pub(crate) fn read_failed(path: &Path, what: &'static str, error: io::Error) -> TraceError {
    TraceError::ReadFailed {
        path: path.to_path_buf(),
        what,
        error: error.to_string(),
    }
}

pub(crate) fn open_trace(path: &Path) -> Result<TraceReader<BufReader<File>>, TraceError> {
    let file = File::open(path).map_err(|e| read_failed(path, "trace", e))?;
    Ok(TraceReader::new(BufReader::new(file)))
}

pub(crate) fn read_maps(path: &Path) -> Result<MapsSymbolizer, TraceError> {
    let maps = std::fs::read_to_string(path).map_err(|e| read_failed(path, "memory map", e))?;
    Ok(MapsSymbolizer::parse(&maps))
}

/// Decode a whole trace into memory.
pub(crate) fn read_trace(path: &Path) -> Result<Vec<TraceRecord>, TraceError> {
    open_trace(path)?
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| read_failed(path, "trace", e))
}
