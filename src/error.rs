//! Error types for the outer surface (files, configuration, arguments).
//!
//! Analysis itself never fails on trace content: truncated records, unknown
//! event kinds, missing correlation state and unresolved symbols all have an
//! in-band representation. `TraceError` covers what is left: inputs that can't
//! be read and settings that can't be honored. Display produces styled output
//! for users, like the rest of the CLI's messages.

use std::path::PathBuf;

use color_print::cwrite;

use crate::styling::{ERROR_EMOJI, HINT_EMOJI};

#[derive(Debug, Clone)]
pub enum TraceError {
    /// An input file could not be opened or read
    ReadFailed {
        path: PathBuf,
        what: &'static str,
        error: String,
    },
    /// Tag 0 means "no request" and is never tracked
    UntrackableTag,
    InvalidConfig {
        message: String,
    },
}

impl std::error::Error for TraceError {}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::ReadFailed { path, what, error } => {
                let path = path.display();
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Cannot read {what} <bold>{path}</>: {error}</>"
                )
            }

            TraceError::UntrackableTag => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Tag 0 marks threads with no request and cannot be tracked</>\n\n{HINT_EMOJI} <dim>Run <bright-black>tagtrace latency <<trace></><dim> to list the tags present in a trace</>"
                )
            }

            TraceError::InvalidConfig { message } => {
                cwrite!(
                    f,
                    "{ERROR_EMOJI} <red>Invalid configuration: {message}</>\n\n{HINT_EMOJI} <dim>Check <bright-black>tagtrace config show</><dim> for the effective settings</>"
                )
            }
        }
    }
}

impl From<config::ConfigError> for TraceError {
    fn from(err: config::ConfigError) -> Self {
        TraceError::InvalidConfig {
            message: err.to_string(),
        }
    }
}
