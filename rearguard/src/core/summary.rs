//! Exit status bookkeeping and the final system-log classification.

use crate::exit_codes;

/// Final status of a run.
///
/// Starts out aborted: only a dispatch that returns normally clears the flag,
/// so any path that skips that point ends as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitState {
    code: i32,
    aborted: bool,
}

impl Default for ExitState {
    fn default() -> Self {
        Self {
            code: exit_codes::SUCCESS,
            aborted: true,
        }
    }
}

impl ExitState {
    /// Record the code of a dispatch that returned normally.
    pub fn complete(&mut self, code: i32) {
        self.code = code;
        self.aborted = false;
    }

    /// Record a fatal error; the run stays aborted.
    pub fn abort(&mut self) {
        self.aborted = true;
        if self.code == exit_codes::SUCCESS {
            self.code = exit_codes::FAILURE;
        }
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Code handed back to the operating system. An aborted run never
    /// reports success.
    pub fn final_code(&self) -> i32 {
        if self.aborted && self.code == exit_codes::SUCCESS {
            exit_codes::FAILURE
        } else {
            self.code
        }
    }
}

const LAYOUT_NOTE: &str = "layout or system configuration changed";

/// How the finished run is reported to the system log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSummary {
    Success,
    /// Reserved non-error code of the layout check workflow.
    LayoutChanged,
    Failed(i32),
}

impl ExitSummary {
    pub fn classify(workflow: &str, code: i32) -> Self {
        if code == exit_codes::SUCCESS {
            ExitSummary::Success
        } else if workflow == exit_codes::LAYOUT_CHANGED_WORKFLOW
            && code == exit_codes::LAYOUT_CHANGED
        {
            ExitSummary::LayoutChanged
        } else {
            ExitSummary::Failed(code)
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, ExitSummary::Failed(_))
    }

    pub fn message(self, program: &str, workflow: &str) -> String {
        match self {
            ExitSummary::Success => format!("{program} {workflow} finished with zero exit code"),
            ExitSummary::LayoutChanged => {
                let code = exit_codes::LAYOUT_CHANGED;
                format!("{program} {workflow} finished with exit code {code} ({LAYOUT_NOTE})")
            }
            ExitSummary::Failed(code) => {
                format!("{program} {workflow} failed with exit code {code}")
            }
        }
    }
}
