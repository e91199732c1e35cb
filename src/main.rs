use clap::Parser;
use color_print::cformat;
use std::process;
use tagtrace::TraceError;
use tagtrace::styling::{ERROR_EMOJI, eprintln};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommand};
use commands::analyze::AnalyzeOptions;
use commands::{
    handle_analyze, handle_config_show, handle_count, handle_dump, handle_latency, handle_summary,
};

fn main() {
    let cli = Cli::parse();

    // Configure logging based on --verbose flag or RUST_LOG env var
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "off" }),
    )
    .format(|buf, record| {
        use anstyle::Style;
        use std::io::Write;

        // Map thread ID to a single character (a-z, then A-Z)
        let thread_id = format!("{:?}", std::thread::current().id());
        let thread_num = thread_id
            .strip_prefix("ThreadId(")
            .and_then(|s| s.strip_suffix(")"))
            .and_then(|s| s.parse::<usize>().ok())
            .map(|n| {
                if n <= 26 {
                    char::from(b'a' + (n - 1) as u8)
                } else if n <= 52 {
                    char::from(b'A' + (n - 27) as u8)
                } else {
                    '?'
                }
            })
            .unwrap_or('?');

        let dim = Style::new().dimmed();
        writeln!(buf, "{dim}[{thread_num}]{dim:#} {}", record.args())
    })
    .init();

    let result = match cli.command {
        Commands::Analyze {
            trace,
            tag,
            sched,
            maps,
            format,
            grace_window_us,
        } => handle_analyze(AnalyzeOptions {
            trace,
            tag,
            sched,
            maps,
            format,
            grace_window_us,
        }),
        Commands::Latency { trace, cdf } => handle_latency(&trace, cdf),
        Commands::Summary {
            trace,
            maps,
            from_pct,
            to_pct,
        } => handle_summary(&trace, maps.as_deref(), from_pct.zip(to_pct)),
        Commands::Count { trace } => handle_count(&trace),
        Commands::Dump { trace, thread } => handle_dump(&trace, thread),
        Commands::Config { action } => match action {
            ConfigCommand::Show => handle_config_show(),
        },
    };

    if let Err(e) = result {
        // TraceError messages are already formatted with emoji and colors
        match e.downcast_ref::<TraceError>() {
            Some(err) => eprintln!("{err}"),
            None => eprintln!("{}", cformat!("{ERROR_EMOJI} <red>{e:#}</>")),
        }
        process::exit(1);
    }
}
