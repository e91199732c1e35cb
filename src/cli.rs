use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Custom styles for help output
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

fn version_str() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let git_version = env!("VERGEN_GIT_DESCRIBE");
        let cargo_version = env!("CARGO_PKG_VERSION");

        // Outside a git checkout vergen emits a placeholder
        if git_version.contains("IDEMPOTENT") {
            cargo_version.to_string()
        } else {
            git_version.to_string()
        }
    })
}

/// A fraction of the request population, `0.0..=1.0`.
fn parse_fraction(value: &str) -> Result<f64, String> {
    let fraction: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&fraction) {
        Ok(fraction)
    } else {
        Err(format!("{fraction} is not between 0.0 and 1.0"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per event, followed by a summary
    Text,
    /// The full timeline as JSON
    Json,
    /// Chrome Trace Event Format, for chrome://tracing or Perfetto
    Chrome,
}

#[derive(Parser)]
#[command(name = "tagtrace")]
#[command(about = "Reconstruct request timelines from thread/tag event traces", long_about = None)]
#[command(version = version_str())]
#[command(disable_help_subcommand = true)]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Show debug logging (skipped records, correlation summary)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconstruct one request's timeline
    #[command(after_long_help = r#"## Inputs

The trace is the binary file written by the instrumentation library: 40-byte
little-endian records, no header.

`--sched` takes the text output of `perf sched script --ns -F -comm`, captured
over the same period. `--maps` takes a copy of the traced process's
`/proc/<pid>/maps`, used to resolve sampled addresses to `module+offset`.

## Settings

Grace window, return-address bias and the mutex-holder noise threshold come
from the config file (see `tagtrace config show`) and `TAGTRACE_*` variables.
`--grace-window-us` overrides the grace window for one run."#)]
    Analyze {
        /// Binary event trace
        trace: PathBuf,

        /// Request tag to reconstruct (non-zero)
        #[arg(long, short)]
        tag: u64,

        /// Scheduler events from `perf sched script`
        #[arg(long)]
        sched: Option<PathBuf>,

        /// Memory map of the traced process, for symbolization
        #[arg(long)]
        maps: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Override the post-release grace window (microseconds)
        #[arg(long)]
        grace_window_us: Option<f64>,
    },

    /// List every request's end-to-end latency, slowest first
    #[command(after_long_help = r#"A request runs from its first `TagSet` until no thread carries its tag.
Requests still in flight when the trace ends are left out.

`--cdf` prints the distribution instead: 1001 lines of `<quantile>, <latency_us>`."#)]
    Latency {
        /// Binary event trace
        trace: PathBuf,

        /// Print the latency distribution instead of one line per request
        #[arg(long)]
        cdf: bool,
    },

    /// Per-address sample statistics, over the whole trace or a latency band
    #[command(after_long_help = r#"Every stack sample is grouped by call site (return address minus the
configured bias). Sites are listed by 99.9th percentile sample latency.

With `--from-pct` and `--to-pct`, only requests ranked in that band by
end-to-end latency are considered (`--from-pct 0.99 --to-pct 1.0` is the
slowest percent). Sites are then listed by summed sample time, with its share
of the band's summed request latency."#)]
    Summary {
        /// Binary event trace
        trace: PathBuf,

        /// Memory map of the traced process, for symbolization
        #[arg(long)]
        maps: Option<PathBuf>,

        /// Lower edge of the latency band (fraction of requests)
        #[arg(long, value_parser = parse_fraction, requires = "to_pct")]
        from_pct: Option<f64>,

        /// Upper edge of the latency band (fraction of requests)
        #[arg(long, value_parser = parse_fraction, requires = "from_pct")]
        to_pct: Option<f64>,
    },

    /// Count records of each event kind
    Count {
        /// Binary event trace
        trace: PathBuf,
    },

    /// Print decoded records
    Dump {
        /// Binary event trace
        trace: PathBuf,

        /// Only records from this thread
        #[arg(long)]
        thread: Option<u32>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the config file location and effective settings
    Show,
}
