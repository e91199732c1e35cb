use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use color_print::cformat;
use tagtrace::config::AnalyzerConfig;
use tagtrace::styling::{WARNING_EMOJI, eprintln, print, println};
use tagtrace::trace::{Analyzer, PerfScript, SchedSource, display, to_chrome_trace};

use super::{open_trace, read_failed, read_maps};
use crate::cli::OutputFormat;

pub struct AnalyzeOptions {
    pub trace: PathBuf,
    pub tag: u64,
    pub sched: Option<PathBuf>,
    pub maps: Option<PathBuf>,
    pub format: OutputFormat,
    pub grace_window_us: Option<f64>,
}

pub fn handle_analyze(options: AnalyzeOptions) -> anyhow::Result<()> {
    let mut config = AnalyzerConfig::load().map_err(tagtrace::TraceError::from)?;
    if let Some(grace_window_us) = options.grace_window_us {
        config.grace_window_us = grace_window_us;
        config.validate().map_err(tagtrace::TraceError::from)?;
    }
    log::debug!("Effective config: {config:?}");

    let mut analyzer = Analyzer::new(options.tag, config)?;

    if let Some(path) = &options.maps {
        analyzer = analyzer.symbolizer(read_maps(path)?);
    }

    if let Some(path) = &options.sched {
        analyzer = analyzer.sched_events(read_sched(path)?);
    }

    let reader = open_trace(&options.trace)?;
    let timeline = analyzer
        .run(reader)
        .map_err(|e| read_failed(&options.trace, "trace", e))?;

    if timeline.is_empty() {
        eprintln!(
            "{}",
            cformat!(
                "{WARNING_EMOJI} <yellow>No events found for tag <bold>{}</></>",
                options.tag
            )
        );
        if options.format == OutputFormat::Text {
            return Ok(());
        }
    }

    match options.format {
        OutputFormat::Text => print!("{}", display::render(&timeline)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&timeline).context("Failed to serialize timeline")?
        ),
        OutputFormat::Chrome => println!(
            "{}",
            to_chrome_trace(&timeline).context("Failed to serialize trace")?
        ),
    }

    Ok(())
}

fn read_sched(path: &Path) -> anyhow::Result<Vec<tagtrace::trace::SchedEvent>> {
    let file = File::open(path).map_err(|e| read_failed(path, "scheduler trace", e))?;
    let events = PerfScript(BufReader::new(file))
        .read_events()
        .map_err(|e| read_failed(path, "scheduler trace", e))?;
    log::debug!("Loaded {} scheduler event(s)", events.len());
    Ok(events)
}
