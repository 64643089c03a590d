//! The run log: the product log every stage and workflow writes to.
//!
//! Distinct from developer tracing (`crate::logging`). The run log is always
//! written, one timestamped line per entry, to the live log target chosen by
//! concurrency classification.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use tracing::{debug, warn};

use crate::context::PROGRAM;

/// Timestamp format for run log lines.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Suffix for the previous log kept on rotation.
const ROTATED_SUFFIX: &str = ".old";

/// Delivery of single messages to the host system log.
pub trait SystemLog {
    fn send(&self, message: &str) -> Result<()>;
}

/// Sends messages through the `logger` utility.
#[derive(Debug, Clone)]
pub struct LoggerCommand {
    tag: String,
}

impl Default for LoggerCommand {
    fn default() -> Self {
        Self {
            tag: PROGRAM.to_string(),
        }
    }
}

impl SystemLog for LoggerCommand {
    fn send(&self, message: &str) -> Result<()> {
        let status = Command::new("logger")
            .args(["-t", &self.tag, "-i", message])
            .status()
            .context("run logger")?;
        if !status.success() {
            return Err(anyhow!("logger exited with {:?}", status.code()));
        }
        Ok(())
    }
}

/// How chatty the run log is on the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity {
    /// Echo `log_print` entries to stdout.
    pub verbose: bool,
    /// Record `debug` entries.
    pub debug: bool,
}

/// Open run log bound to its live target.
pub struct RunLog {
    path: PathBuf,
    file: File,
    verbosity: Verbosity,
    syslog: Box<dyn SystemLog>,
}

impl RunLog {
    /// Create (or truncate) the live log at `path`.
    ///
    /// With `rotate`, an existing log is first moved to `<path>.old`.
    pub fn create(
        path: &Path,
        rotate: bool,
        verbosity: Verbosity,
        syslog: Box<dyn SystemLog>,
    ) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create log dir {}", parent.display()))?;
        }
        if rotate && path.exists() {
            let rotated = rotated_path(path);
            debug!(from = %path.display(), to = %rotated.display(), "rotating previous log");
            fs::rename(path, &rotated)
                .with_context(|| format!("rotate {} to {}", path.display(), rotated.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("create log file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            verbosity,
            syslog,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a line in the log file only.
    pub fn log(&self, message: impl AsRef<str>) {
        self.write_line(message.as_ref());
    }

    /// Record a line and echo it to stdout in verbose mode.
    pub fn log_print(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.write_line(message);
        if self.verbosity.verbose {
            println!("{message}");
        }
    }

    /// Record a line and always echo it to stderr.
    pub fn log_print_error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.write_line(message);
        eprintln!("{message}");
    }

    /// Record a line only in debug mode.
    pub fn debug(&self, message: impl AsRef<str>) {
        if self.verbosity.debug {
            self.write_line(message.as_ref());
        }
    }

    /// Record a fatal error. The caller aborts the run afterwards.
    pub fn error(&self, err: &anyhow::Error) {
        self.log_print_error(format!("ERROR: {err:#}"));
    }

    /// Record a line and forward it to the system log.
    pub fn log_to_syslog(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.write_line(message);
        if let Err(err) = self.syslog.send(message) {
            warn!(err = %err, "failed to write system log");
        }
    }

    /// Copy the live log to `destination` unless it already is the live log.
    pub fn copy_to(&self, destination: &Path) -> Result<bool> {
        if destination == self.path {
            return Ok(false);
        }
        let _ = (&self.file).flush();
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create log dir {}", parent.display()))?;
        }
        fs::copy(&self.path, destination).with_context(|| {
            format!(
                "copy log {} to {}",
                self.path.display(),
                destination.display()
            )
        })?;
        Ok(true)
    }

    fn write_line(&self, message: &str) {
        let stamp = Local::now().format(TIMESTAMP_FORMAT);
        let mut file = &self.file;
        if let Err(err) = writeln!(file, "{stamp} {message}") {
            warn!(err = %err, path = %self.path.display(), "failed to write run log");
        }
    }
}

fn rotated_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(ROTATED_SUFFIX);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<String>>>);

    impl SystemLog for Capture {
        fn send(&self, message: &str) -> Result<()> {
            self.0
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .push(message.to_string());
            Ok(())
        }
    }

    struct Unreachable;

    impl SystemLog for Unreachable {
        fn send(&self, _message: &str) -> Result<()> {
            Err(anyhow!("no syslog"))
        }
    }

    fn open(path: &Path, rotate: bool, verbosity: Verbosity) -> RunLog {
        RunLog::create(path, rotate, verbosity, Box::new(Capture::default())).expect("log")
    }

    #[test]
    fn create_makes_parent_and_truncates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("log").join("run.log");
        fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        fs::write(&path, "stale\n").expect("seed");

        let log = open(&path, false, Verbosity::default());
        log.log("fresh");

        let contents = fs::read_to_string(&path).expect("read");
        assert!(!contents.contains("stale"));
        assert!(contents.trim_end().ends_with("fresh"));
    }

    #[test]
    fn rotate_keeps_previous_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run.log");
        fs::write(&path, "previous run\n").expect("seed");

        let _log = open(&path, true, Verbosity::default());

        let old = fs::read_to_string(temp.path().join("run.log.old")).expect("read old");
        assert_eq!(old, "previous run\n");
        assert_eq!(fs::read_to_string(&path).expect("read"), "");
    }

    #[test]
    fn debug_lines_need_debug_mode() {
        let temp = tempfile::tempdir().expect("tempdir");
        let quiet = temp.path().join("quiet.log");
        open(&quiet, false, Verbosity::default()).debug("hidden detail");
        assert!(!fs::read_to_string(&quiet).expect("read").contains("hidden"));

        let loud = temp.path().join("loud.log");
        open(
            &loud,
            false,
            Verbosity {
                verbose: true,
                debug: true,
            },
        )
        .debug("hidden detail");
        let content = fs::read_to_string(&loud).expect("read");
        assert!(content.contains("hidden detail"));
    }

    #[test]
    fn lines_are_timestamped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run.log");
        open(&path, false, Verbosity::default()).log("hello");
        let line = fs::read_to_string(&path).expect("read");
        // 2024-01-02 03:04:05.123456 hello
        let (stamp, message) = line.trim_end().split_at(26);
        assert_eq!(message, " hello");
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[19..20], ".");
    }

    #[test]
    fn syslog_messages_are_logged_and_forwarded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run.log");
        let capture = Capture::default();
        let syslog = Box::new(capture.clone());
        let log = RunLog::create(&path, false, Verbosity::default(), syslog).expect("log");

        log.log_to_syslog("rearguard dump finished with zero exit code");

        let sent = capture.0.lock().expect("lock").clone();
        assert_eq!(sent, vec!["rearguard dump finished with zero exit code"]);
        let content = fs::read_to_string(&path).expect("read");
        assert!(content.contains("zero exit code"));
    }

    #[test]
    fn syslog_failure_is_not_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run.log");
        let log = RunLog::create(&path, false, Verbosity::default(), Box::new(Unreachable))
            .expect("log");
        log.log_to_syslog("still recorded");
        let content = fs::read_to_string(&path).expect("read");
        assert!(content.contains("still recorded"));
    }

    #[test]
    fn error_entries_carry_prefix() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run.log");
        let log = open(&path, false, Verbosity::default());
        log.error(&anyhow!("disk on fire").context("prepare"));
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.contains("ERROR: prepare: disk on fire"));
    }

    #[test]
    fn copy_to_skips_live_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run.log");
        let log = open(&path, false, Verbosity::default());
        log.log("line");

        assert!(!log.copy_to(&path).expect("copy self"));

        let final_path = temp.path().join("final").join("run.log");
        assert!(log.copy_to(&final_path).expect("copy"));
        let content = fs::read_to_string(&final_path).expect("read");
        assert!(content.contains("line"));
    }
}
