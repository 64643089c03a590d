//! Process enumeration and the single-instance guard.
//!
//! Exclusion is based on the running-process list, not on file locks. There
//! is a window between enumeration and this process becoming visible to
//! other instances; two instances started in that window may both proceed.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::context::PROGRAM;
use crate::error::StartupError;

/// Lists processes executing a given executable.
pub trait ProcessTable {
    fn pids_running(&self, executable: &Path) -> Result<Vec<u32>>;
}

/// `pidof`-backed process table.
#[derive(Debug, Clone)]
pub struct PidofProcessTable {
    pidof: PathBuf,
}

impl PidofProcessTable {
    pub fn new(pidof: impl Into<PathBuf>) -> Self {
        Self {
            pidof: pidof.into(),
        }
    }
}

impl ProcessTable for PidofProcessTable {
    #[instrument(skip_all, fields(executable = %executable.display()))]
    fn pids_running(&self, executable: &Path) -> Result<Vec<u32>> {
        let output = Command::new(&self.pidof)
            .arg(executable)
            .output()
            .with_context(|| format!("run {} {}", self.pidof.display(), executable.display()))?;

        // pidof exits 1 when nothing matches.
        match output.status.code() {
            Some(0) => parse_pid_list(&String::from_utf8_lossy(&output.stdout)),
            Some(1) => Ok(Vec::new()),
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(?code, stderr = %stderr.trim(), "pidof failed");
                Err(anyhow!(
                    "{} exited with {:?}: {}",
                    self.pidof.display(),
                    code,
                    stderr.trim()
                ))
            }
        }
    }
}

/// Parse whitespace separated process ids.
pub fn parse_pid_list(raw: &str) -> Result<Vec<u32>> {
    raw.split_whitespace()
        .map(|token| {
            token
                .parse::<u32>()
                .with_context(|| format!("invalid pid '{token}'"))
        })
        .collect()
}

/// Fail with `AlreadyRunning` if another process runs `executable`.
pub fn ensure_single_instance<P: ProcessTable>(
    table: &P,
    executable: &Path,
    own_pid: u32,
) -> Result<()> {
    let pids = table.pids_running(executable)?;
    let others: Vec<u32> = pids.into_iter().filter(|pid| *pid != own_pid).collect();
    debug!(own_pid, ?others, "single-instance check");
    if others.is_empty() {
        return Ok(());
    }
    Err(StartupError::AlreadyRunning {
        program: PROGRAM.to_string(),
        pids: others,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTable(Vec<u32>);

    impl ProcessTable for FixedTable {
        fn pids_running(&self, _executable: &Path) -> Result<Vec<u32>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenTable;

    impl ProcessTable for BrokenTable {
        fn pids_running(&self, _executable: &Path) -> Result<Vec<u32>> {
            Err(anyhow!("process table unavailable"))
        }
    }

    #[test]
    fn parses_pidof_output() {
        assert_eq!(parse_pid_list("123 456\n").expect("parse"), vec![123, 456]);
        assert!(parse_pid_list("").expect("parse").is_empty());
        assert!(parse_pid_list("12 abc").is_err());
    }

    #[test]
    fn only_own_pid_passes() {
        let table = FixedTable(vec![100]);
        ensure_single_instance(&table, Path::new("/usr/sbin/rearguard"), 100).expect("alone");
    }

    #[test]
    fn empty_table_passes() {
        let table = FixedTable(Vec::new());
        ensure_single_instance(&table, Path::new("/usr/sbin/rearguard"), 100).expect("alone");
    }

    #[test]
    fn other_pid_is_already_running() {
        let table = FixedTable(vec![100, 55]);
        let err = ensure_single_instance(&table, Path::new("/usr/sbin/rearguard"), 100)
            .expect_err("second instance");
        match err.downcast_ref::<StartupError>() {
            Some(StartupError::AlreadyRunning { pids, .. }) => assert_eq!(pids, &vec![55]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn enumeration_failure_propagates() {
        let err = ensure_single_instance(&BrokenTable, Path::new("/x"), 1).expect_err("error");
        assert!(err.to_string().contains("unavailable"));
    }

    #[cfg(unix)]
    #[test]
    fn pidof_exit_one_means_no_processes() {
        // `false` behaves like pidof finding nothing.
        let table = PidofProcessTable::new("false");
        let pids = table.pids_running(Path::new("/nowhere")).expect("pids");
        assert!(pids.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn pidof_exit_zero_with_empty_output_is_empty() {
        let table = PidofProcessTable::new("true");
        let pids = table.pids_running(Path::new("/nowhere")).expect("pids");
        assert!(pids.is_empty());
    }

    #[test]
    fn missing_pidof_binary_is_an_error() {
        let table = PidofProcessTable::new("/nonexistent/pidof");
        assert!(table.pids_running(Path::new("/nowhere")).is_err());
    }
}
