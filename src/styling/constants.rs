//! Style constants and emojis for terminal output
//!
//! # Styling with color-print
//!
//! Use `cformat!` with HTML-like tags for all user-facing messages:
//!
//! ```rust,ignore
//! use color_print::cformat;
//!
//! cformat!("{WARNING_EMOJI} <yellow>No events found for tag <bold>{tag}</></>")
//!
//! // Semantic mapping:
//! // - Errors: <red>...</>
//! // - Warnings: <yellow>...</>
//! // - Hints: <dim>...</>
//! // - Event kinds: <bold>...</>
//! // - Secondary (relative times, detail): <bright-black>...</>
//! ```

use anstyle::{AnsiColor, Color, Style};

/// Sampled work on a request thread
pub const SAMPLE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

/// Samples inferred for a mutex holder
pub const HOLDER_SAMPLE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Magenta)));

/// Tag lifecycle and mutex events
pub const LIFECYCLE: Style = Style::new().bold();

/// Scheduler events merged from the external capture
pub const SCHED: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Dimmed secondary text (hints, paths)
pub const HINT: Style = Style::new().dimmed();

/// Error emoji: `cformat!("{ERROR_EMOJI} <red>message</>")`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji: `cformat!("{WARNING_EMOJI} <yellow>message</>")`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji: `cformat!("{HINT_EMOJI} <dim>message</>")`
pub const HINT_EMOJI: &str = "💡";

/// Info emoji for neutral status: `cformat!("{INFO_EMOJI} <dim>message</>")`
pub const INFO_EMOJI: &str = "⚪";
