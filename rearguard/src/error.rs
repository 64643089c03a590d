//! Typed failures for conditions callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error` with context attached.

use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

/// Failures raised before the live log exists.
///
/// These are reported on stderr only and end the process immediately.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Bad or unknown flag, or a flag missing its value.
    #[error("{0}")]
    Usage(String),

    /// The requested workflow needs root privileges.
    #[error("{program} needs ROOT privileges")]
    Privilege { program: String },

    /// A required external program is not on `PATH`.
    #[error("required program '{0}' missing, please check your PATH")]
    PrerequisiteMissing(String),

    /// Another exclusive instance of the same executable is running.
    #[error("{program} is already running, not starting again (running PIDs: {})", format_pids(.pids))]
    AlreadyRunning { program: String, pids: Vec<u32> },
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Usage(_) => exit_codes::FAILURE,
            StartupError::Privilege { .. } => exit_codes::FAILURE,
            StartupError::PrerequisiteMissing(_) => exit_codes::FAILURE,
            StartupError::AlreadyRunning { .. } => exit_codes::FAILURE,
        }
    }
}

fn format_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fatal configuration problems found while resolving layers.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration directory {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("carriage return character in {} (perhaps DOS or Mac format)", .0.display())]
    CarriageReturn(PathBuf),

    #[error("syntax error in {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("'{key}' may not be set in {} (fixed before configuration is read)", .path.display())]
    ReservedKey { key: String, path: PathBuf },
}

/// Exit code for an error that ended the run before logging started.
pub fn startup_exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<StartupError>()
        .map(StartupError::exit_code)
        .unwrap_or(exit_codes::FAILURE)
}
