//! Facts about the host and the current process.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Where the running kernel reports its release string.
const KERNEL_RELEASE_PATH: &str = "/proc/sys/kernel/osrelease";

/// Process status file used to read the effective uid.
const SELF_STATUS_PATH: &str = "/proc/self/status";

/// Host and process facts collected once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    /// Short hostname (up to the first dot).
    pub hostname: String,
    pub pid: u32,
    /// Effective user id, if it could be determined.
    pub euid: Option<u32>,
    /// Release string of the running kernel.
    pub kernel_release: Option<String>,
    /// Resolved path of the running executable.
    pub executable: PathBuf,
    /// Location of `pidof`, if it is on `PATH`.
    pub pidof: Option<PathBuf>,
}

impl HostFacts {
    /// Gather facts about the running system.
    pub fn detect() -> Result<Self> {
        let executable = env::current_exe().context("resolve current executable")?;
        let executable = executable.canonicalize().unwrap_or(executable);
        let facts = Self {
            hostname: short_hostname(),
            pid: std::process::id(),
            euid: effective_uid(Path::new(SELF_STATUS_PATH)).ok(),
            kernel_release: kernel_release(Path::new(KERNEL_RELEASE_PATH)),
            executable,
            pidof: env::var_os("PATH").and_then(|path| find_program("pidof", &path)),
        };
        debug!(?facts, "host facts detected");
        Ok(facts)
    }

    pub fn is_root(&self) -> bool {
        self.euid == Some(0)
    }
}

/// Hostname without the domain part; `localhost` when it cannot be read.
pub fn short_hostname() -> String {
    let full = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let short = full.split('.').next().unwrap_or_default().trim();
    if short.is_empty() {
        "localhost".to_string()
    } else {
        short.to_string()
    }
}

/// Effective uid from a `/proc/<pid>/status` file.
pub fn effective_uid(status_path: &Path) -> Result<u32> {
    let status = fs::read_to_string(status_path)
        .with_context(|| format!("read {}", status_path.display()))?;
    parse_effective_uid(&status)
        .ok_or_else(|| anyhow!("no Uid line in {}", status_path.display()))
}

/// The `Uid:` line lists real, effective, saved and filesystem uids.
fn parse_effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|value| value.split_whitespace().nth(1))
        .and_then(|token| token.parse::<u32>().ok())
}

/// Trimmed kernel release string, if readable and non-empty.
pub fn kernel_release(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|release| !release.is_empty())
}

/// Search `path_var` for an executable file called `name`.
pub fn find_program(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
