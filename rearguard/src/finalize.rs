//! Exit finalization: report, summarize and publish the run log.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::context::PROGRAM;
use crate::core::summary::{ExitState, ExitSummary};
use crate::exit_codes;
use crate::io::log::RunLog;

/// Finish the run and return the process exit code.
///
/// Runs on every path once the live log exists: normal completion, unknown
/// workflow, and fatal errors. `final_log` is the configured final log
/// location; the live log is copied there unless it is the live log itself.
pub fn finalize(
    log: &RunLog,
    workflow: &str,
    exit: ExitState,
    elapsed: Duration,
    final_log: Option<&Path>,
) -> i32 {
    let mut code = exit.final_code();
    let published = final_log.unwrap_or(log.path());

    if exit.aborted() {
        log.log_print_error(format!(
            "Aborting due to an error, check {} for details",
            published.display()
        ));
    }
    log.log(format!(
        "Finished running {workflow} in {} seconds",
        elapsed.as_secs()
    ));

    let summary = ExitSummary::classify(workflow, code);
    debug!(?summary, code, "run finished");
    log.log_to_syslog(summary.message(PROGRAM, workflow));

    if let Some(destination) = final_log {
        match log.copy_to(destination) {
            Ok(true) => debug!(to = %destination.display(), "copied live log"),
            Ok(false) => {}
            Err(err) => {
                log.log_print_error(format!("ERROR: {err:#}"));
                if code == exit_codes::SUCCESS {
                    code = exit_codes::FAILURE;
                }
            }
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::io::log::Verbosity;
    use crate::test_support::RecordingSyslog;

    fn open_log(dir: &Path) -> (RunLog, Arc<Mutex<Vec<String>>>) {
        let syslog = RecordingSyslog::default();
        let messages = syslog.messages();
        let log = RunLog::create(
            &dir.join("live.log"),
            false,
            Verbosity::default(),
            Box::new(syslog),
        )
        .expect("log");
        (log, messages)
    }

    fn completed(code: i32) -> ExitState {
        let mut state = ExitState::default();
        state.complete(code);
        state
    }

    #[test]
    fn success_is_summarized_and_returned() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (log, messages) = open_log(temp.path());

        let code = finalize(&log, "mkrescue", completed(0), Duration::from_secs(4), None);
        assert_eq!(code, 0);
        assert_eq!(
            messages.lock().expect("messages").as_slice(),
            &["rearguard mkrescue finished with zero exit code".to_string()]
        );
        let content = fs::read_to_string(log.path()).expect("read");
        assert!(content.contains("Finished running mkrescue in 4 seconds"));
        assert!(!content.contains("Aborting"));
    }

    #[test]
    fn checklayout_change_is_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (log, messages) = open_log(temp.path());

        let code = finalize(&log, "checklayout", completed(1), Duration::ZERO, None);
        assert_eq!(code, 1);
        let messages = messages.lock().expect("messages");
        assert!(messages[0].contains("layout or system configuration changed"));
    }

    #[test]
    fn other_failures_are_generic() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (log, messages) = open_log(temp.path());

        let code = finalize(&log, "mkbackup", completed(1), Duration::ZERO, None);
        assert_eq!(code, 1);
        assert_eq!(
            messages.lock().expect("messages")[0],
            "rearguard mkbackup failed with exit code 1"
        );
    }

    #[test]
    fn aborted_run_never_reports_success() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (log, messages) = open_log(temp.path());

        let code = finalize(&log, "mkrescue", ExitState::default(), Duration::ZERO, None);
        assert_eq!(code, exit_codes::FAILURE);
        let messages = messages.lock().expect("messages");
        assert!(messages[0].contains("failed with exit code 1"));
        let content = fs::read_to_string(log.path()).expect("read");
        assert!(content.contains("Aborting due to an error, check"));
    }

    #[test]
    fn live_log_is_copied_to_final_location() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (log, _messages) = open_log(temp.path());
        let final_log = temp.path().join("final").join("rear.log");
        let destination = Some(final_log.as_path());

        let code = finalize(&log, "mkrescue", completed(0), Duration::ZERO, destination);
        assert_eq!(code, 0);
        let copied = fs::read_to_string(&final_log).expect("final log");
        assert!(copied.contains("finished with zero exit code"));
    }

    #[test]
    fn same_final_location_is_not_copied() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (log, _messages) = open_log(temp.path());
        let live = log.path().to_path_buf();

        let code = finalize(&log, "mkrescue", completed(0), Duration::ZERO, Some(&live));
        assert_eq!(code, 0);
        let content = fs::read_to_string(&live).expect("live");
        assert!(content.contains("zero exit code"));
    }
}
