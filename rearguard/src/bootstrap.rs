//! Orchestration of one `rearguard` invocation.
//!
//! Stages run strictly in order, each handing its record to the next:
//! privilege and prerequisite checks, alias resolution, concurrency
//! classification, single-instance guard, live log, configuration, build
//! workspace, dispatch, finalization. Errors before the live log exists
//! return as `Err`; after that they are logged, abort the run and still
//! reach finalization.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use chrono::Local;
use tracing::{debug, info};

use crate::cli::version_line;
use crate::context::{Invocation, Layout, PROGRAM, RunContext};
use crate::core::concurrency::classify;
use crate::core::summary::ExitState;
use crate::core::types::ConcurrencyClass;
use crate::dispatch::{DispatchOutcome, dispatch};
use crate::error::StartupError;
use crate::exit_codes;
use crate::finalize::finalize;
use crate::io::config::{ConfigRequest, KeepBuildDir, resolve_configuration};
use crate::io::host::HostFacts;
use crate::io::log::{LoggerCommand, RunLog, SystemLog, Verbosity};
use crate::io::os_detect::{OsDetector, OsReleaseDetector};
use crate::io::processes::{PidofProcessTable, ProcessTable, ensure_single_instance};
use crate::io::signals::install_termination_handler;
use crate::io::workspace::{BuildWorkspace, CleanupOutcome};
use crate::workflow::{
    LOCKLESS_WORKFLOWS, SIMULTANEOUS_RUNNABLE_WORKFLOWS, WorkflowContext, WorkflowRegistry,
};
use crate::workflows::help::render_usage;

/// Host collaborators for a run.
pub struct Runtime<P, D> {
    pub layout: Layout,
    pub host: HostFacts,
    pub processes: P,
    pub os_detector: D,
    pub syslog: Box<dyn SystemLog>,
    /// Where the build workspace is created.
    pub temp_dir: PathBuf,
    /// Install the termination-signal handler once a workspace exists.
    pub handle_signals: bool,
}

impl Runtime<PidofProcessTable, OsReleaseDetector> {
    /// Collaborators for a real run on this host.
    pub fn system() -> Result<Self> {
        let host = HostFacts::detect()?;
        let pidof = host.pidof.clone().unwrap_or_else(|| PathBuf::from("pidof"));
        Ok(Self {
            layout: Layout::system(),
            host,
            processes: PidofProcessTable::new(pidof),
            os_detector: OsReleaseDetector::default(),
            syslog: Box::new(LoggerCommand::default()),
            temp_dir: std::env::temp_dir(),
            handle_signals: true,
        })
    }
}

/// Run `invocation` to completion and return the process exit code.
pub fn run<P: ProcessTable, D: OsDetector>(
    mut invocation: Invocation,
    registry: &WorkflowRegistry,
    runtime: Runtime<P, D>,
) -> Result<i32> {
    if invocation.is_help() {
        return Ok(show_help(registry));
    }

    let Runtime {
        layout,
        host,
        processes,
        os_detector,
        syslog,
        temp_dir,
        handle_signals,
    } = runtime;

    if !host.is_root() {
        return Err(StartupError::Privilege {
            program: PROGRAM.to_string(),
        }
        .into());
    }
    if host.pidof.is_none() {
        return Err(StartupError::PrerequisiteMissing("pidof".to_string()).into());
    }

    let resolved = registry.resolve_name(&invocation.workflow).to_string();
    if resolved != invocation.workflow {
        debug!(from = %invocation.workflow, to = %resolved, "workflow alias resolved");
        invocation.workflow = resolved;
    }

    let layout = layout.with_config_dir(invocation.options.config_dir.as_deref());
    let identity = classify(
        &invocation.workflow,
        LOCKLESS_WORKFLOWS,
        SIMULTANEOUS_RUNNABLE_WORKFLOWS,
        &layout.base_log_path(&host.hostname),
        host.pid,
    );
    info!(workflow = %invocation.workflow, class = %identity.class, "classified");

    if identity.class.requires_single_instance() {
        ensure_single_instance(&processes, &host.executable, host.pid)?;
    }

    let log = RunLog::create(
        &identity.log_target,
        identity.class == ConcurrencyClass::Exclusive,
        Verbosity {
            verbose: invocation.options.verbose,
            debug: invocation.options.debug,
        },
        syslog,
    )?;

    let kernel_version = invocation
        .options
        .kernel_version
        .clone()
        .or_else(|| host.kernel_release.clone())
        .unwrap_or_default();
    let recovery_mode = layout.recovery_marker.exists();
    let ctx = RunContext {
        invocation,
        layout,
        identity,
        pid: host.pid,
        kernel_version,
        recovery_mode,
    };
    log_banner(&log, &ctx);

    let started = Instant::now();
    let mut exit = ExitState::default();
    let mut stages = Stages {
        os_detector: &os_detector,
        temp_dir: &temp_dir,
        handle_signals,
        workspace: None,
        final_log: None,
    };
    match stages.run(&ctx, registry, &log) {
        Ok(outcome) => exit.complete(outcome.exit_code()),
        Err(err) => {
            log.error(&err);
            exit.abort();
        }
    }

    if let Some(workspace) = stages.workspace.take() {
        match workspace.close(exit.aborted()) {
            Ok(CleanupOutcome::Kept(root)) => {
                log.log_print(format!("Build workspace kept at {}", root.display()));
            }
            Ok(CleanupOutcome::Removed(root)) => {
                log.debug(format!("Removed build workspace {}", root.display()));
            }
            Ok(CleanupOutcome::AlreadyDone) => {}
            Err(err) => {
                log.error(&err);
                exit.abort();
            }
        }
    }

    Ok(finalize(
        &log,
        ctx.workflow(),
        exit,
        started.elapsed(),
        stages.final_log.as_deref(),
    ))
}

/// The `help` pseudo-workflow: usage on stdout, no log, no workspace.
pub fn show_help(registry: &WorkflowRegistry) -> i32 {
    print!("{}", render_usage(registry));
    exit_codes::SUCCESS
}

fn log_banner(log: &RunLog, ctx: &RunContext) {
    let options = &ctx.invocation.options;
    log.log_print(version_line());
    log.log(format!(
        "Running {PROGRAM} {} (PID {} date {})",
        ctx.workflow(),
        ctx.pid,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    log.log(format!(
        "Command line options: {}",
        ctx.invocation.command_line.join(" ")
    ));
    log.log_print(format!("Using log file: {}", ctx.log_target().display()));
    log.log(format!("Concurrency class: {}", ctx.identity.class));
    log.log(format!("Kernel version: {}", ctx.kernel_version));
    if ctx.recovery_mode {
        log.log("Running in the rescue/recovery system");
    }
    if options.simulate {
        log.log_print("Simulation mode activated");
    }
    if options.step_by_step {
        log.log_print("Step-by-step mode activated");
    }
    if let Some(argument) = &options.debug_scripts {
        log.debug(format!("Workflow tracing enabled with '{argument}'"));
    }
}

/// Fallible stages after the live log exists.
///
/// Anything that needs cleanup or publishing is recorded here before the
/// next fallible step, so the caller can finish it on every path.
struct Stages<'a, D> {
    os_detector: &'a D,
    temp_dir: &'a Path,
    handle_signals: bool,
    workspace: Option<BuildWorkspace>,
    final_log: Option<PathBuf>,
}

impl<D: OsDetector> Stages<'_, D> {
    fn run(
        &mut self,
        ctx: &RunContext,
        registry: &WorkflowRegistry,
        log: &RunLog,
    ) -> Result<DispatchOutcome> {
        let request = ConfigRequest {
            config_dir: &ctx.layout.config_dir,
            share_dir: &ctx.layout.share_dir,
            workflow: ctx.workflow(),
            append_files: &ctx.invocation.options.config_append_files,
        };
        let resolved = resolve_configuration(&request, self.os_detector, log)?;
        let mut settings = resolved.settings;
        self.final_log = settings.final_log_path();
        let run = ctx.with_layer_settings(&settings);
        if run.kernel_version != ctx.kernel_version {
            log.log(format!(
                "Using kernel version {} from configuration",
                run.kernel_version
            ));
        }

        let keep = if ctx.invocation.options.debug {
            KeepBuildDir::Always
        } else {
            settings.keep_build_dir
        };
        let workspace = self
            .workspace
            .insert(BuildWorkspace::create_in(self.temp_dir, keep)?);
        if self.handle_signals {
            install_termination_handler(workspace.cleanup_handle())?;
        }
        let paths = workspace.paths();
        log.debug(format!("Using build area {}", paths.root.display()));
        settings
            .backup_prog_exclude
            .push(paths.root.display().to_string());

        let workflow_ctx = WorkflowContext {
            run: &run,
            settings: &settings,
            os: &resolved.os,
            workspace: Some(paths),
            log,
        };
        dispatch(registry, &workflow_ctx)
    }
}
