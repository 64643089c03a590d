//! Invocation context threaded through the bootstrap stages.
//!
//! Each stage owns the record it produces and hands it on by reference;
//! nothing here is re-derived later.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::concurrency::LogIdentity;
use crate::io::config::Settings;

/// Program name used in log file names, banners and system-log lines.
pub const PROGRAM: &str = "rearguard";

/// Pseudo-workflow selected when no workflow name is given.
pub const HELP_WORKFLOW: &str = "help";

/// Default argument for `-D`.
pub const DEFAULT_DEBUG_SCRIPTS_ARGUMENT: &str = "x";

/// Recognized flags after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Options {
    pub verbose: bool,
    pub debug: bool,
    /// Set by `-D` or `--debugscripts`; the argument handed to workflow tracing.
    pub debug_scripts: Option<String>,
    pub simulate: bool,
    pub step_by_step: bool,
    /// `-c` override of the configuration directory.
    pub config_dir: Option<PathBuf>,
    /// `-r` override of the kernel version.
    pub kernel_version: Option<String>,
    /// `-C` names in command line order.
    pub config_append_files: Vec<String>,
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Requested workflow. Frozen once the bootstrap resolves aliases.
    pub workflow: String,
    pub options: Options,
    /// Leftover arguments passed through to the workflow.
    pub args: Vec<String>,
    /// Raw argument vector, logged in the startup banner.
    pub command_line: Vec<String>,
}

impl Invocation {
    pub fn is_help(&self) -> bool {
        self.workflow == HELP_WORKFLOW
    }
}

/// Filesystem locations used by a run.
///
/// All but `config_dir` are fixed before the live log is opened; `config_dir`
/// is fixed once the `-c` override has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub share_dir: PathBuf,
    pub config_dir: PathBuf,
    pub var_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Marker whose presence means we run inside the rescue system.
    pub recovery_marker: PathBuf,
}

impl Layout {
    /// Standard locations on an installed system.
    pub fn system() -> Self {
        Self {
            share_dir: PathBuf::from("/usr/share").join(PROGRAM),
            config_dir: PathBuf::from("/etc").join(PROGRAM),
            var_dir: PathBuf::from("/var/lib").join(PROGRAM),
            log_dir: PathBuf::from("/var/log").join(PROGRAM),
            recovery_marker: PathBuf::from(format!("/etc/{PROGRAM}-release")),
        }
    }

    /// Apply the `-c` override, if any.
    pub fn with_config_dir(mut self, config_dir: Option<&Path>) -> Self {
        if let Some(dir) = config_dir {
            self.config_dir = dir.to_path_buf();
        }
        self
    }

    /// `<log_dir>/rearguard-<hostname>.log`.
    pub fn base_log_path(&self, hostname: &str) -> PathBuf {
        self.log_dir.join(format!("{PROGRAM}-{hostname}.log"))
    }
}

/// Everything fixed about a run once its live log exists.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Invocation with the workflow name resolved and frozen.
    pub invocation: Invocation,
    pub layout: Layout,
    pub identity: LogIdentity,
    pub pid: u32,
    pub kernel_version: String,
    pub recovery_mode: bool,
}

impl RunContext {
    pub fn workflow(&self) -> &str {
        &self.invocation.workflow
    }

    pub fn log_target(&self) -> &Path {
        &self.identity.log_target
    }

    /// Context with the values layers may still set applied.
    ///
    /// `-r` beats a layer's `kernel_version`, which beats the running
    /// kernel. The returned context is what workflows see.
    pub fn with_layer_settings(&self, settings: &Settings) -> RunContext {
        let mut frozen = self.clone();
        if let (None, Some(version)) = (
            &self.invocation.options.kernel_version,
            &settings.kernel_version,
        ) {
            frozen.kernel_version = version.clone();
        }
        if let Some(dir) = &settings.share_dir {
            frozen.layout.share_dir = dir.clone();
        }
        if let Some(dir) = &settings.config_dir {
            frozen.layout.config_dir = dir.clone();
        }
        frozen
    }
}
