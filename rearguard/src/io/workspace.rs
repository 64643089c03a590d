//! Per-run build workspace.
//!
//! The workspace is a uniquely named temporary directory with a `rootfs`
//! staging area and a `tmp` scratch area. Removal is owned by a
//! [`CleanupHandle`] that may be shared with the termination-signal handler;
//! whichever path runs first removes the directory, later calls are no-ops.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::PROGRAM;
use crate::io::config::KeepBuildDir;

/// Random characters in the workspace directory name.
const NAME_RANDOM_LEN: usize = 15;

/// Paths handed to workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    /// Staging area for the rescue root filesystem.
    pub rootfs: PathBuf,
    /// Scratch area.
    pub tmp: PathBuf,
}

/// What a cleanup call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed(PathBuf),
    Kept(PathBuf),
    /// An earlier call already handled the workspace.
    AlreadyDone,
}

#[derive(Debug)]
struct PendingCleanup {
    root: PathBuf,
    keep: KeepBuildDir,
}

/// Shared, idempotent removal of one workspace.
#[derive(Debug, Clone)]
pub struct CleanupHandle {
    pending: Arc<Mutex<Option<PendingCleanup>>>,
}

impl CleanupHandle {
    fn new(root: PathBuf, keep: KeepBuildDir) -> Self {
        Self {
            pending: Arc::new(Mutex::new(Some(PendingCleanup { root, keep }))),
        }
    }

    /// Remove the workspace unless the retention policy keeps it.
    ///
    /// Safe to call from any exit path, any number of times.
    pub fn run(&self, aborted: bool) -> Result<CleanupOutcome> {
        let pending = self
            .pending
            .lock()
            .map_err(|_| anyhow!("workspace cleanup lock poisoned"))?
            .take();
        let Some(pending) = pending else {
            return Ok(CleanupOutcome::AlreadyDone);
        };

        if pending.keep.keeps(aborted) {
            debug!(root = %pending.root.display(), "keeping build workspace");
            return Ok(CleanupOutcome::Kept(pending.root));
        }

        if pending.root.exists() {
            fs::remove_dir_all(&pending.root)
                .with_context(|| format!("remove build workspace {}", pending.root.display()))?;
        }
        debug!(root = %pending.root.display(), "removed build workspace");
        Ok(CleanupOutcome::Removed(pending.root))
    }
}

/// An existing build workspace, removed on drop if not closed explicitly.
#[derive(Debug)]
pub struct BuildWorkspace {
    paths: WorkspacePaths,
    cleanup: CleanupHandle,
}

impl BuildWorkspace {
    /// Create `<base>/rearguard.XXXXXXXXXXXXXXX` with its subdirectories.
    pub fn create_in(base: &Path, keep: KeepBuildDir) -> Result<Self> {
        fs::create_dir_all(base)
            .with_context(|| format!("create temp base {}", base.display()))?;
        let root = tempfile::Builder::new()
            .prefix(&format!("{PROGRAM}."))
            .rand_bytes(NAME_RANDOM_LEN)
            .tempdir_in(base)
            .with_context(|| format!("create build workspace in {}", base.display()))?
            .keep();

        // From here on the handle owns removal, including on the error paths below.
        let cleanup = CleanupHandle::new(root.clone(), keep);
        let paths = WorkspacePaths {
            rootfs: root.join("rootfs"),
            tmp: root.join("tmp"),
            root,
        };
        let workspace = Self { paths, cleanup };

        for dir in [&workspace.paths.rootfs, &workspace.paths.tmp] {
            fs::create_dir(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        debug!(root = %workspace.paths.root.display(), "build workspace created");
        Ok(workspace)
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    /// Handle for other exit paths (signal handler).
    pub fn cleanup_handle(&self) -> CleanupHandle {
        self.cleanup.clone()
    }

    /// Finish the workspace according to the retention policy.
    pub fn close(self, aborted: bool) -> Result<CleanupOutcome> {
        self.cleanup.run(aborted)
    }
}

impl Drop for BuildWorkspace {
    fn drop(&mut self) {
        // Reached without `close` only on an unwinding error path.
        if let Err(err) = self.cleanup.run(true) {
            warn!(err = %err, "build workspace cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_unique_workspace_with_subdirectories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let a = BuildWorkspace::create_in(temp.path(), KeepBuildDir::Never).expect("a");
        let b = BuildWorkspace::create_in(temp.path(), KeepBuildDir::Never).expect("b");

        assert_ne!(a.paths().root, b.paths().root);
        for ws in [&a, &b] {
            assert!(ws.paths().rootfs.is_dir());
            assert!(ws.paths().tmp.is_dir());
            let root = &ws.paths().root;
            let name = root.file_name().expect("name").to_string_lossy();
            assert!(name.starts_with("rearguard."));
            assert_eq!(name.len(), "rearguard.".len() + NAME_RANDOM_LEN);
        }
    }

    #[test]
    fn close_removes_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = BuildWorkspace::create_in(temp.path(), KeepBuildDir::Never).expect("ws");
        let root = ws.paths().root.clone();
        fs::write(ws.paths().tmp.join("scratch"), "data").expect("write");

        let outcome = ws.close(false).expect("close");
        assert_eq!(outcome, CleanupOutcome::Removed(root.clone()));
        assert!(!root.exists());
    }

    #[test]
    fn drop_removes_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = {
            let ws = BuildWorkspace::create_in(temp.path(), KeepBuildDir::Never).expect("ws");
            ws.paths().root.clone()
        };
        assert!(!root.exists());
    }

    #[test]
    fn retention_keeps_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = BuildWorkspace::create_in(temp.path(), KeepBuildDir::Always).expect("ws");
        let root = ws.paths().root.clone();
        let outcome = ws.close(false).expect("close");
        assert_eq!(outcome, CleanupOutcome::Kept(root.clone()));
        assert!(root.is_dir());
    }

    #[test]
    fn keep_on_error_depends_on_abort() {
        let temp = tempfile::tempdir().expect("tempdir");

        let ok = BuildWorkspace::create_in(temp.path(), KeepBuildDir::OnError).expect("ok");
        let ok_root = ok.paths().root.clone();
        ok.close(false).expect("close");
        assert!(!ok_root.exists());

        let failed = BuildWorkspace::create_in(temp.path(), KeepBuildDir::OnError).expect("failed");
        let failed_root = failed.paths().root.clone();
        failed.close(true).expect("close");
        assert!(failed_root.is_dir());
    }

    #[test]
    fn signal_path_cleanup_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = BuildWorkspace::create_in(temp.path(), KeepBuildDir::Never).expect("ws");
        let root = ws.paths().root.clone();
        let handle = ws.cleanup_handle();

        // What the termination handler does.
        let outcome = handle.run(true).expect("signal");
        assert_eq!(outcome, CleanupOutcome::Removed(root.clone()));
        assert!(!root.exists());

        let again = handle.run(true).expect("again");
        assert_eq!(again, CleanupOutcome::AlreadyDone);
        let outcome = ws.close(false).expect("close");
        assert_eq!(outcome, CleanupOutcome::AlreadyDone);
    }

    #[test]
    fn cleanup_tolerates_already_missing_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = BuildWorkspace::create_in(temp.path(), KeepBuildDir::Never).expect("ws");
        let root = ws.paths().root.clone();
        fs::remove_dir_all(&root).expect("remove early");
        let outcome = ws.close(false).expect("close");
        assert_eq!(outcome, CleanupOutcome::Removed(root));
    }

    #[test]
    fn unusable_base_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("not-a-dir");
        fs::write(&file, "").expect("write");
        assert!(BuildWorkspace::create_in(&file, KeepBuildDir::Never).is_err());
    }
}
