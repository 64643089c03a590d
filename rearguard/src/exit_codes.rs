//! Stable exit codes for the rearguard CLI.

/// Workflow finished without error.
pub const SUCCESS: i32 = 0;

/// Usage error, missing privilege or prerequisite, already running, unknown
/// workflow, or an aborted run.
pub const FAILURE: i32 = 1;

/// `checklayout` reports that the disk layout or system configuration changed
/// since the rescue system was built. Not an error even though it is non-zero.
pub const LAYOUT_CHANGED: i32 = 1;

/// Workflow that reserves [`LAYOUT_CHANGED`] as a non-error signal.
pub const LAYOUT_CHANGED_WORKFLOW: &str = "checklayout";
