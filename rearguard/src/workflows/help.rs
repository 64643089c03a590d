//! The `help` pseudo-workflow.
//!
//! Help is answered by the bootstrap before any privilege check, log or
//! workspace exists, so it is not a registered handler.

use std::fmt::Write;

use crate::cli::version_line;
use crate::context::{HELP_WORKFLOW, PROGRAM};
use crate::workflow::WorkflowRegistry;

const HELP_DESCRIPTION: &str = "print this help";

const OPTIONS: &[(&str, &str)] = &[
    ("-h --help", "usage information (this text)"),
    ("-V --version", "version information"),
    ("-v", "verbose mode"),
    ("-c DIR", "alternative config directory; instead of /etc/rearguard"),
    ("-C CONFIG", "additional config files; absolute path or relative to config directory"),
    ("-d", "debug mode; run many commands verbosely, keep the build workspace"),
    ("-D", "debugscript mode; like -d plus workflow tracing"),
    ("--debugscripts SET", "same as -D with the given trace argument"),
    ("-r KERNEL", "kernel version to use; current: from /proc/sys/kernel/osrelease"),
    ("-s", "simulation mode; show what would run"),
    ("-S", "step-by-step mode; acknowledge each step"),
];

/// Usage text listing options and every registered workflow.
pub fn render_usage(registry: &WorkflowRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Usage: {PROGRAM} [-h|--help] [-V|--version] [-dsSv] [-D|--debugscripts SET] \
         [-c DIR] [-C CONFIG] [-r KERNEL] [--] COMMAND [ARGS...]"
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", version_line());
    let _ = writeln!(out);
    let _ = writeln!(out, "Available options:");
    for (flag, text) in OPTIONS {
        let _ = writeln!(out, " {flag:<20} {text}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "List of commands:");

    let mut commands: Vec<(String, String)> = registry
        .iter()
        .map(|workflow| (workflow.name().to_string(), workflow.description().to_string()))
        .collect();
    commands.push((HELP_WORKFLOW.to_string(), HELP_DESCRIPTION.to_string()));
    commands.extend(
        registry
            .aliases()
            .map(|(wrapper, target)| (wrapper.to_string(), format!("runs {target}"))),
    );
    commands.sort();
    for (name, description) in commands {
        let _ = writeln!(out, " {name:<20} {description}");
    }
    out
}
