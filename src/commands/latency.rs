use std::path::Path;

use color_print::cformat;
use tagtrace::styling::{WARNING_EMOJI, eprintln, print};
use tagtrace::trace::{display, latency_cdf, tag_latencies};

use super::read_trace;

/// Quantile steps in `--cdf` output
const CDF_STEPS: usize = 1000;

pub fn handle_latency(trace: &Path, cdf: bool) -> anyhow::Result<()> {
    let latencies = tag_latencies(read_trace(trace)?);

    if latencies.is_empty() {
        eprintln!(
            "{}",
            cformat!("{WARNING_EMOJI} <yellow>No completed requests in trace</>")
        );
        return Ok(());
    }

    if cdf {
        print!("{}", display::render_cdf(&latency_cdf(&latencies, CDF_STEPS)));
    } else {
        print!("{}", display::render_latencies(&latencies));
    }
    Ok(())
}
