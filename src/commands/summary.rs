use std::collections::HashSet;
use std::path::Path;

use color_print::cformat;
use tagtrace::config::AnalyzerConfig;
use tagtrace::styling::{WARNING_EMOJI, eprintln, print};
use tagtrace::trace::{
    NullSymbolizer, SampleStats, Symbolizer, display, latency_band, stats, tag_latencies,
};

use super::{read_maps, read_trace};

pub fn handle_summary(
    trace: &Path,
    maps: Option<&Path>,
    band: Option<(f64, f64)>,
) -> anyhow::Result<()> {
    let config = AnalyzerConfig::load().map_err(tagtrace::TraceError::from)?;
    let symbolizer: Box<dyn Symbolizer> = match maps {
        Some(path) => Box::new(read_maps(path)?),
        None => Box::new(NullSymbolizer),
    };
    let records = read_trace(trace)?;

    let (mut pc_stats, band_total) = match band {
        None => (
            SampleStats::collect_all(records, config.return_addr_bias).by_tail_latency(),
            None,
        ),
        Some((from, to)) => {
            let selected = latency_band(&tag_latencies(records.iter().copied()), from, to);
            if selected.is_empty() {
                eprintln!(
                    "{}",
                    cformat!(
                        "{WARNING_EMOJI} <yellow>No completed requests between <bold>{from}</> and <bold>{to}</></>"
                    )
                );
                return Ok(());
            }
            let total: f64 = selected.iter().map(|l| l.latency).sum();
            log::debug!(
                "{} request(s) in band, {total:.3} us in total",
                selected.len()
            );
            let tags: HashSet<u64> = selected.iter().map(|l| l.tag).collect();
            let pc_stats = SampleStats::collect_for_tags(records, &tags, config.return_addr_bias)
                .by_total_time();
            (pc_stats, Some(total))
        }
    };

    if pc_stats.is_empty() {
        eprintln!(
            "{}",
            cformat!("{WARNING_EMOJI} <yellow>No stack samples to summarize</>")
        );
        return Ok(());
    }

    stats::symbolize(&mut pc_stats, symbolizer.as_ref());
    print!("{}", display::render_pc_stats(&pc_stats, band_total));
    Ok(())
}
