//! Concurrency classification and live log target selection.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::core::types::ConcurrencyClass;

/// Suffix appended to the base log path for lockless workflows.
pub const LOCKLESS_LOG_SUFFIX: &str = ".lockless";

/// Outcome of classifying one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogIdentity {
    pub class: ConcurrencyClass,
    /// Path written during this run. May differ from the final log path.
    pub log_target: PathBuf,
}

/// Classify `workflow` against the lockless and simultaneous lists.
///
/// Lockless membership is checked first and simultaneous membership second,
/// so a name on both lists ends up `SimultaneousNamed`.
///
/// All lockless workflows share the single `<base>.lockless` target, so two
/// lockless runs at the same time write into the same file.
pub fn classify(
    workflow: &str,
    lockless: &[&str],
    simultaneous: &[&str],
    base_log: &Path,
    pid: u32,
) -> LogIdentity {
    let mut identity = LogIdentity {
        class: ConcurrencyClass::Exclusive,
        log_target: base_log.to_path_buf(),
    };

    if lockless.contains(&workflow) {
        identity.class = ConcurrencyClass::Lockless;
        identity.log_target = lockless_log_path(base_log);
    }
    if simultaneous.contains(&workflow) {
        identity.class = ConcurrencyClass::SimultaneousNamed;
        identity.log_target = per_process_log_path(base_log, pid);
    }

    identity
}

fn lockless_log_path(base_log: &Path) -> PathBuf {
    let mut raw = OsString::from(base_log.as_os_str());
    raw.push(LOCKLESS_LOG_SUFFIX);
    PathBuf::from(raw)
}

/// Splice `pid` in before the final suffix: `a/host.log` becomes `a/host.<pid>.log`.
fn per_process_log_path(base_log: &Path, pid: u32) -> PathBuf {
    let file_name = base_log
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let spliced = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}.{pid}.{ext}"),
        _ => format!("{file_name}.{pid}"),
    };
    base_log.with_file_name(spliced)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKLESS: &[&str] = &["checklayout", "dump", "help", "both"];
    const SIMULTANEOUS: &[&str] = &["mkbackuponly", "restoreonly", "both"];

    fn base() -> PathBuf {
        PathBuf::from("/var/log/rearguard/rearguard-host.log")
    }

    #[test]
    fn unlisted_workflow_is_exclusive_with_base_log() {
        let identity = classify("mkrescue", LOCKLESS, SIMULTANEOUS, &base(), 100);
        assert_eq!(identity.class, ConcurrencyClass::Exclusive);
        assert_eq!(identity.log_target, base());
    }

    #[test]
    fn lockless_workflow_gets_fixed_suffix() {
        let identity = classify("dump", LOCKLESS, SIMULTANEOUS, &base(), 100);
        assert_eq!(identity.class, ConcurrencyClass::Lockless);
        assert_eq!(
            identity.log_target,
            PathBuf::from("/var/log/rearguard/rearguard-host.log.lockless")
        );
    }

    #[test]
    fn lockless_workflows_share_one_target() {
        let a = classify("dump", LOCKLESS, SIMULTANEOUS, &base(), 100);
        let b = classify("checklayout", LOCKLESS, SIMULTANEOUS, &base(), 200);
        assert_eq!(a.log_target, b.log_target);
    }

    #[test]
    fn simultaneous_workflow_gets_pid_before_suffix() {
        let identity = classify("restoreonly", LOCKLESS, SIMULTANEOUS, &base(), 4242);
        assert_eq!(identity.class, ConcurrencyClass::SimultaneousNamed);
        assert_eq!(
            identity.log_target,
            PathBuf::from("/var/log/rearguard/rearguard-host.4242.log")
        );
    }

    #[test]
    fn simultaneous_targets_differ_per_process() {
        let a = classify("restoreonly", LOCKLESS, SIMULTANEOUS, &base(), 1);
        let b = classify("restoreonly", LOCKLESS, SIMULTANEOUS, &base(), 2);
        assert_ne!(a.log_target, b.log_target);
    }

    #[test]
    fn name_on_both_lists_is_simultaneous() {
        let identity = classify("both", LOCKLESS, SIMULTANEOUS, &base(), 7);
        assert_eq!(identity.class, ConcurrencyClass::SimultaneousNamed);
        assert!(identity.log_target.ends_with("rearguard-host.7.log"));
    }

    #[test]
    fn pid_is_appended_when_base_has_no_suffix() {
        let identity = classify(
            "restoreonly",
            LOCKLESS,
            SIMULTANEOUS,
            Path::new("/tmp/logfile"),
            9,
        );
        assert_eq!(identity.log_target, PathBuf::from("/tmp/logfile.9"));
    }

    #[test]
    fn only_exclusive_requires_single_instance() {
        assert!(ConcurrencyClass::Exclusive.requires_single_instance());
        assert!(!ConcurrencyClass::Lockless.requires_single_instance());
        assert!(!ConcurrencyClass::SimultaneousNamed.requires_single_instance());
    }
}
