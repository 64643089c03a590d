//! Command line parsing.
//!
//! Flags may appear before or after the workflow name; everything after `--`
//! is passed through to the workflow untouched.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};

use crate::context::{DEFAULT_DEBUG_SCRIPTS_ARGUMENT, HELP_WORKFLOW, Invocation, Options, PROGRAM};
use crate::error::StartupError;

#[derive(Parser, Debug)]
#[command(
    name = "rearguard",
    about = "Disaster-recovery workflow runner",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
struct Cli {
    /// Show usage and the available workflows.
    #[arg(short = 'h', long = "help")]
    help: bool,

    /// Show version and exit.
    #[arg(short = 'V', long = "version")]
    version: bool,

    /// Verbose mode.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Configuration directory.
    #[arg(short = 'c', value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Additional config files, whitespace separated; may be repeated.
    #[arg(short = 'C', value_name = "FILES", action = ArgAction::Append)]
    config_append: Vec<String>,

    /// Debug mode (implies verbose).
    #[arg(short = 'd')]
    debug: bool,

    /// Debug mode with workflow tracing.
    #[arg(short = 'D')]
    debug_trace: bool,

    /// Debug mode with workflow tracing using ARG.
    #[arg(long = "debugscripts", value_name = "ARG")]
    debug_scripts: Option<String>,

    /// Simulation mode (implies verbose).
    #[arg(short = 's')]
    simulate: bool,

    /// Step-by-step mode.
    #[arg(short = 'S')]
    step_by_step: bool,

    /// Kernel version to use instead of the running kernel.
    #[arg(short = 'r', value_name = "VERSION")]
    kernel_version: Option<String>,

    /// Workflow to run.
    workflow: Option<String>,

    /// Arguments passed to the workflow.
    args: Vec<String>,
}

/// Result of parsing the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedArgs {
    /// `-V`: print the version and exit.
    Version,
    Run(Invocation),
}

/// Parse the raw argument vector (including the program name).
pub fn parse_args<I, T>(argv: I) -> Result<ParsedArgs, StartupError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let cli = Cli::try_parse_from(&argv).map_err(usage_error)?;

    if cli.version {
        return Ok(ParsedArgs::Version);
    }

    let config_dir = cli.config_dir.as_deref().and_then(Path::to_str);
    reject_option_like_value("-c", config_dir)?;
    reject_option_like_value("-r", cli.kernel_version.as_deref())?;
    reject_option_like_value("--debugscripts", cli.debug_scripts.as_deref())?;
    for value in &cli.config_append {
        reject_option_like_value("-C", Some(value.as_str()))?;
    }

    let debug_scripts = match (cli.debug_scripts, cli.debug_trace) {
        (Some(arg), _) => Some(arg),
        (None, true) => Some(DEFAULT_DEBUG_SCRIPTS_ARGUMENT.to_string()),
        (None, false) => None,
    };
    let debug = cli.debug || debug_scripts.is_some();

    let options = Options {
        verbose: cli.verbose || debug || cli.simulate,
        debug,
        debug_scripts,
        simulate: cli.simulate,
        step_by_step: cli.step_by_step,
        config_dir: cli.config_dir,
        kernel_version: cli.kernel_version,
        config_append_files: cli
            .config_append
            .iter()
            .flat_map(|value| value.split_whitespace())
            .map(str::to_string)
            .collect(),
    };

    let requested = cli.workflow.filter(|name| !name.trim().is_empty());
    let (workflow, args) = match requested {
        Some(name) if !cli.help => (name, cli.args),
        _ => (HELP_WORKFLOW.to_string(), Vec::new()),
    };

    Ok(ParsedArgs::Run(Invocation {
        workflow,
        options,
        args,
        command_line: argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect(),
    }))
}

/// Text printed for `-V`.
pub fn version_line() -> String {
    format!("{PROGRAM} {}", env!("CARGO_PKG_VERSION"))
}

fn usage_error(err: clap::Error) -> StartupError {
    StartupError::Usage(err.render().to_string().trim_end().to_string())
}

fn reject_option_like_value(flag: &str, value: Option<&str>) -> Result<(), StartupError> {
    match value {
        Some(value) if value.starts_with('-') => Err(StartupError::Usage(format!(
            "option {flag} requires an argument, got option-like '{value}'"
        ))),
        _ => Ok(()),
    }
}
