//! Test-only collaborators: scripted workflows, a fake process table, a
//! recording system log, a fixed OS detector, and temp host layouts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::bootstrap::Runtime;
use crate::context::{Invocation, Layout, Options, RunContext};
use crate::core::concurrency::classify;
use crate::core::types::OsIdentity;
use crate::io::config::Settings;
use crate::io::host::HostFacts;
use crate::io::log::{RunLog, SystemLog, Verbosity};
use crate::io::os_detect::OsDetector;
use crate::io::processes::ProcessTable;
use crate::workflow::{
    LOCKLESS_WORKFLOWS, SIMULTANEOUS_RUNNABLE_WORKFLOWS, Workflow, WorkflowContext,
};

/// PID the fake host reports for the running process.
pub const TEST_PID: u32 = 4242;

/// Hostname the fake host reports.
pub const TEST_HOSTNAME: &str = "testhost";

/// Invocation of `workflow` with default options.
pub fn invocation(workflow: &str, args: &[&str]) -> Invocation {
    let args: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
    let mut command_line = vec!["rearguard".to_string(), workflow.to_string()];
    command_line.extend(args.iter().cloned());
    Invocation {
        workflow: workflow.to_string(),
        options: Options::default(),
        args,
        command_line,
    }
}

/// What a [`ScriptedWorkflow`] does when run.
#[derive(Debug, Clone)]
pub enum ScriptedResult {
    Code(i32),
    Error(String),
}

/// What a [`ScriptedWorkflow`] saw on one call.
#[derive(Debug, Clone)]
pub struct SeenRun {
    pub args: Vec<String>,
    pub workspace: Option<PathBuf>,
    pub settings: Settings,
    pub kernel_version: String,
}

/// Workflow returning a fixed result and recording its calls.
pub struct ScriptedWorkflow {
    name: String,
    result: ScriptedResult,
    runs: Arc<Mutex<Vec<SeenRun>>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedWorkflow {
    pub fn returning(name: &str, code: i32) -> Self {
        Self::new(name, ScriptedResult::Code(code))
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self::new(name, ScriptedResult::Error(message.to_string()))
    }

    fn new(name: &str, result: ScriptedResult) -> Self {
        Self {
            name: name.to_string(),
            result,
            runs: Arc::default(),
            calls: Arc::default(),
        }
    }

    /// Arguments of every call, in order.
    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.calls)
    }

    /// Full record of every call, in order.
    pub fn runs(&self) -> Arc<Mutex<Vec<SeenRun>>> {
        Arc::clone(&self.runs)
    }
}

impl Workflow for ScriptedWorkflow {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted test workflow"
    }

    fn run(&self, ctx: &WorkflowContext<'_>, args: &[String]) -> Result<i32> {
        let seen = SeenRun {
            args: args.to_vec(),
            workspace: ctx.workspace.map(|paths| paths.root.clone()),
            settings: ctx.settings.clone(),
            kernel_version: ctx.run.kernel_version.clone(),
        };
        self.calls
            .lock()
            .map_err(|_| anyhow!("calls lock poisoned"))?
            .push(seen.args.clone());
        self.runs
            .lock()
            .map_err(|_| anyhow!("runs lock poisoned"))?
            .push(seen);
        match &self.result {
            ScriptedResult::Code(code) => Ok(*code),
            ScriptedResult::Error(message) => Err(anyhow!("{message}")),
        }
    }
}

/// Process table reporting a fixed set of PIDs for any executable.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessTable {
    pub pids: Vec<u32>,
}

impl FakeProcessTable {
    /// Only the current (fake) process is running.
    pub fn alone() -> Self {
        Self {
            pids: vec![TEST_PID],
        }
    }

    /// The current process plus `others`.
    pub fn with_others(others: &[u32]) -> Self {
        let mut pids = vec![TEST_PID];
        pids.extend_from_slice(others);
        Self { pids }
    }
}

impl ProcessTable for FakeProcessTable {
    fn pids_running(&self, _executable: &Path) -> Result<Vec<u32>> {
        Ok(self.pids.clone())
    }
}

/// System log that keeps every message in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSyslog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingSyslog {
    pub fn messages(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.messages)
    }
}

impl SystemLog for RecordingSyslog {
    fn send(&self, message: &str) -> Result<()> {
        self.messages
            .lock()
            .map_err(|_| anyhow!("syslog lock poisoned"))?
            .push(message.to_string());
        Ok(())
    }
}

/// OS detector returning a fixed identity.
#[derive(Debug, Clone)]
pub struct FixedOsDetector(pub OsIdentity);

impl Default for FixedOsDetector {
    fn default() -> Self {
        Self(debian_identity())
    }
}

impl OsDetector for FixedOsDetector {
    fn detect(&self) -> Result<OsIdentity> {
        Ok(self.0.clone())
    }
}

/// Debian 12 on x86_64.
pub fn debian_identity() -> OsIdentity {
    OsIdentity {
        arch: "x86_64".to_string(),
        os: "GNU/Linux".to_string(),
        os_master_vendor: String::new(),
        os_vendor: "Debian".to_string(),
        os_version: "12".to_string(),
    }
}

/// Host directories under one temp dir.
///
/// ```text
/// <temp>/share/conf   distribution layers
/// <temp>/etc          configuration directory
/// <temp>/var
/// <temp>/log
/// <temp>/tmp          build workspaces
/// ```
pub struct TestLayout {
    temp: TempDir,
    pub layout: Layout,
    pub temp_dir: PathBuf,
    pub syslog: RecordingSyslog,
}

impl TestLayout {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        let layout = Layout {
            share_dir: root.join("share"),
            config_dir: root.join("etc"),
            var_dir: root.join("var"),
            log_dir: root.join("log"),
            recovery_marker: root.join("etc").join("rearguard-release"),
        };
        let temp_dir = root.join("tmp");
        for dir in [
            layout.share_dir.join("conf"),
            layout.config_dir.clone(),
            layout.var_dir.clone(),
            layout.log_dir.clone(),
            temp_dir.clone(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            temp,
            layout,
            temp_dir,
            syslog: RecordingSyslog::default(),
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write `<config_dir>/<name>`.
    pub fn write_config(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.layout.config_dir.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Write `<share_dir>/conf/<name>`, creating parent directories.
    pub fn write_distribution(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.layout.share_dir.join("conf").join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Live log path of an exclusive run.
    pub fn exclusive_log(&self) -> PathBuf {
        self.layout.base_log_path(TEST_HOSTNAME)
    }

    /// Build workspaces currently present.
    pub fn workspaces(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.temp_dir)? {
            found.push(entry?.path());
        }
        found.sort();
        Ok(found)
    }

    /// Fake root host with `pidof` available.
    pub fn host(&self) -> HostFacts {
        HostFacts {
            hostname: TEST_HOSTNAME.to_string(),
            pid: TEST_PID,
            euid: Some(0),
            kernel_release: Some("6.1.0-test".to_string()),
            executable: PathBuf::from("/usr/sbin/rearguard"),
            pidof: Some(PathBuf::from("/usr/bin/pidof")),
        }
    }

    /// Runtime over this layout, running alone on the host.
    pub fn runtime(&self) -> Runtime<FakeProcessTable, FixedOsDetector> {
        self.runtime_with(self.host(), FakeProcessTable::alone())
    }

    pub fn runtime_with(
        &self,
        host: HostFacts,
        processes: FakeProcessTable,
    ) -> Runtime<FakeProcessTable, FixedOsDetector> {
        Runtime {
            layout: self.layout.clone(),
            host,
            processes,
            os_detector: FixedOsDetector::default(),
            syslog: Box::new(self.syslog.clone()),
            temp_dir: self.temp_dir.clone(),
            handle_signals: false,
        }
    }
}

/// Everything a workflow handler needs, for unit-testing handlers and
/// dispatch without the full bootstrap.
pub struct WorkflowFixture {
    _temp: TempDir,
    pub run: RunContext,
    pub settings: Settings,
    pub os: OsIdentity,
    pub log: RunLog,
}

impl WorkflowFixture {
    pub fn new(workflow: &str) -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        let layout = Layout {
            share_dir: root.join("share"),
            config_dir: root.join("etc"),
            var_dir: root.join("var"),
            log_dir: root.join("log"),
            recovery_marker: root.join("etc").join("rearguard-release"),
        };
        let identity = classify(
            workflow,
            LOCKLESS_WORKFLOWS,
            SIMULTANEOUS_RUNNABLE_WORKFLOWS,
            &layout.base_log_path(TEST_HOSTNAME),
            TEST_PID,
        );
        let log = RunLog::create(
            &identity.log_target,
            false,
            Verbosity::default(),
            Box::new(RecordingSyslog::default()),
        )?;
        let run = RunContext {
            invocation: invocation(workflow, &[]),
            layout,
            identity,
            pid: TEST_PID,
            kernel_version: "6.1.0-test".to_string(),
            recovery_mode: false,
        };
        Ok(Self {
            _temp: temp,
            run,
            settings: Settings::default(),
            os: debian_identity(),
            log,
        })
    }

    /// Workflow context without a build workspace.
    pub fn context<'a>(&'a self, settings: &'a Settings) -> WorkflowContext<'a> {
        WorkflowContext {
            run: &self.run,
            settings,
            os: &self.os,
            workspace: None,
            log: &self.log,
        }
    }
}
