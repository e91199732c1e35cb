//! Human-readable output.
//!
//! One line per event, oldest first:
//!
//! ```text
//! 1712.000 (+12.000) [4242] STACK_SAMPLE ngen=3, latency=10.000 us, pc=0x401a2b(server.c:88:3)
//! ```
//!
//! The first column is the absolute timestamp in microseconds, the second is
//! relative to the start of the request.

use color_print::cformat;

use super::event::CausalEvent;
use super::latency::TagLatency;
use super::record::{EventKind, TraceRecord};
use super::stats::{EventCounts, PcStats};
use super::timeline::Timeline;
use crate::styling::{INFO_EMOJI, kind_style};

/// Render a timeline's events followed by a short summary.
pub fn render(timeline: &Timeline) -> String {
    let mut out: String = timeline
        .events
        .iter()
        .map(|event| render_event(timeline, event) + "\n")
        .collect();
    out.push('\n');
    out.push_str(&render_summary(timeline));
    out
}

fn render_event(timeline: &Timeline, event: &CausalEvent) -> String {
    let style = kind_style(event.kind);
    let mut line = cformat!(
        "{:.3} <bright-black>(+{:.3})</> [{}] {style}{}{style:#}",
        event.timestamp,
        timeline.relative(event.timestamp),
        event.thread_id,
        event.kind,
    );

    let mut detail = event.detail.clone();
    if let Some(address) = event.address {
        let symbol = event.symbol.as_deref().unwrap_or("???");
        if !detail.is_empty() {
            detail.push_str(", ");
        }
        detail.push_str(&format!("pc={address:#x}({symbol})"));
    }
    if !detail.is_empty() {
        line.push(' ');
        line.push_str(&detail);
    }
    line
}

fn render_summary(timeline: &Timeline) -> String {
    let mut out = cformat!(
        "{INFO_EMOJI} <bold>Tag {}</>: {:.3} us, {} events\n",
        timeline.tag,
        timeline.duration().unwrap_or(0.0),
        timeline.events.len()
    );
    for thread in &timeline.threads {
        out.push_str(&format!(
            "  thread {} ({}): {} sample bar(s) in {} lane(s), {} critical section(s)\n",
            thread.thread_id,
            thread.role,
            thread.bars.len(),
            thread.max_lane,
            thread.critical_sections.len()
        ));
    }
    out
}

/// `<tag>, <latency_us>` per line, in the given order.
pub fn render_latencies(latencies: &[TagLatency]) -> String {
    latencies
        .iter()
        .map(|l| format!("{}, {:.6}\n", l.tag, l.latency))
        .collect()
}

/// `<quantile>, <latency_us>` per line.
pub fn render_cdf(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(q, latency)| format!("{q:.6}, {latency:.6}\n"))
        .collect()
}

/// One block per call site.
///
/// With `band_total`, each block shows the site's summed sample time and its
/// share of the band's summed request latency, in place of the minimum.
pub fn render_pc_stats(stats: &[PcStats], band_total: Option<f64>) -> String {
    stats
        .iter()
        .map(|s| {
            let symbol = s.symbol.as_deref().unwrap_or("???");
            let mut block = cformat!("<bold>{symbol}</> (pc={:#x})\n", s.address);
            block.push_str(&format!("    num_samples: {}\n", s.num_samples));
            match band_total {
                Some(total) => {
                    let share = if total > 0.0 { s.sum / total } else { 0.0 };
                    block.push_str(&format!("    sum: {:.4} ({share:.2})\n", s.sum));
                }
                None => block.push_str(&format!("    min: {:.4}\n", s.min)),
            }
            for (name, value) in [
                ("median", s.median),
                ("90p", s.p90),
                ("99p", s.p99),
                ("99.9p", s.p999),
                ("max", s.max),
            ] {
                block.push_str(&format!("    {name}: {value:.4}\n"));
            }
            block
        })
        .collect()
}

/// `<KIND> <count>` per line, in event code order.
pub fn render_event_counts(counts: &EventCounts) -> String {
    let known = counts.known.iter().filter_map(|(&code, count)| {
        let kind = EventKind::from_code(code)?;
        Some(format!("{kind} {count}\n"))
    });
    let unknown = counts
        .unknown
        .iter()
        .map(|(code, count)| format!("UNKNOWN({code}) {count}\n"));
    known.chain(unknown).collect()
}

/// One decoded record per line.
pub fn render_records<'a>(records: impl IntoIterator<Item = &'a TraceRecord>) -> String {
    records
        .into_iter()
        .map(|record| {
            let kind = match record.kind() {
                Some(kind) => kind.to_string(),
                None => format!("UNKNOWN({})", record.event_type),
            };
            format!(
                "{:.3} [{}] {kind} arg1={:#x} arg2={:#x} arg3={}\n",
                record.timestamp_us(),
                record.thread_id,
                record.arg1,
                record.arg2,
                record.arg3
            )
        })
        .collect()
}
