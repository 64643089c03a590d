//! Termination-signal handling for an active build workspace.

use anyhow::{Context, Result};

use crate::exit_codes;
use crate::io::workspace::{CleanupHandle, CleanupOutcome};

/// Remove the workspace and exit non-zero on SIGINT, SIGTERM or SIGHUP.
///
/// May be installed once per process.
pub fn install_termination_handler(cleanup: CleanupHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("Caught termination signal, cleaning up");
        match cleanup.run(true) {
            Ok(CleanupOutcome::Kept(root)) => {
                eprintln!("Build workspace kept at {}", root.display());
            }
            Ok(_) => {}
            Err(err) => eprintln!("ERROR: {err:#}"),
        }
        std::process::exit(exit_codes::FAILURE);
    })
    .context("install termination signal handler")
}
