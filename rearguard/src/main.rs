//! `rearguard` entry point.

use anyhow::Result;
use rearguard::bootstrap::{self, Runtime};
use rearguard::cli::{ParsedArgs, parse_args, version_line};
use rearguard::context::{Invocation, PROGRAM};
use rearguard::error::startup_exit_code;
use rearguard::{exit_codes, logging, workflows};

fn main() {
    logging::init();
    std::process::exit(run());
}

fn run() -> i32 {
    let invocation = match parse_args(std::env::args_os()) {
        Ok(ParsedArgs::Version) => {
            println!("{}", version_line());
            return exit_codes::SUCCESS;
        }
        Ok(ParsedArgs::Run(invocation)) => invocation,
        Err(err) => {
            eprintln!("{}", usage_message(&err.to_string()));
            return err.exit_code();
        }
    };

    match run_invocation(invocation) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            startup_exit_code(&err)
        }
    }
}

fn run_invocation(invocation: Invocation) -> Result<i32> {
    let registry = workflows::builtin_registry()?;
    if invocation.is_help() {
        return Ok(bootstrap::show_help(&registry));
    }
    bootstrap::run(invocation, &registry, Runtime::system()?)
}

/// Parse error text with a single pointer to `--help`.
fn usage_message(error: &str) -> String {
    if error.contains("--help") {
        error.to_string()
    } else {
        format!("{error}\nUse '{PROGRAM} --help' for usage information.")
    }
}
