//! Workflow handlers and the registry the dispatcher looks them up in.

use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::context::RunContext;
use crate::core::types::OsIdentity;
use crate::io::config::Settings;
use crate::io::log::RunLog;
use crate::io::workspace::WorkspacePaths;

/// Workflows that may run alongside anything and share one log target.
pub const LOCKLESS_WORKFLOWS: &[&str] = &["checklayout", "dump", "help", "validate"];

/// Workflows that may run alongside other instances with a per-process log.
pub const SIMULTANEOUS_RUNNABLE_WORKFLOWS: &[&str] = &["mkbackuponly", "restoreonly", "mountonly"];

/// What a workflow handler sees of the run.
pub struct WorkflowContext<'a> {
    pub run: &'a RunContext,
    pub settings: &'a Settings,
    pub os: &'a OsIdentity,
    /// Absent only for `help`, which never gets a workspace.
    pub workspace: Option<&'a WorkspacePaths>,
    pub log: &'a RunLog,
}

/// A named operation selected by the first positional argument.
pub trait Workflow {
    fn name(&self) -> &str;

    /// One line shown by `help`.
    fn description(&self) -> &str;

    /// Run to completion and return the workflow exit code.
    ///
    /// An `Err` is a fatal error: the run is aborted.
    fn run(&self, ctx: &WorkflowContext<'_>, args: &[String]) -> Result<i32>;
}

/// Workflow handlers keyed by name, plus wrapper aliases.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: BTreeMap<String, Box<dyn Workflow>>,
    aliases: BTreeMap<String, String>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. Names are unique across workflows and aliases.
    pub fn register(&mut self, workflow: Box<dyn Workflow>) -> Result<()> {
        let name = workflow.name().to_string();
        if name.is_empty() {
            bail!("workflow name must not be empty");
        }
        if self.workflows.contains_key(&name) || self.aliases.contains_key(&name) {
            bail!("workflow '{name}' registered twice");
        }
        self.workflows.insert(name, workflow);
        Ok(())
    }

    /// Make `wrapper` run `target` instead.
    pub fn alias(&mut self, wrapper: &str, target: &str) -> Result<()> {
        if self.workflows.contains_key(wrapper) || self.aliases.contains_key(wrapper) {
            bail!("workflow '{wrapper}' registered twice");
        }
        if !self.workflows.contains_key(target) {
            bail!("alias '{wrapper}' points at unknown workflow '{target}'");
        }
        self.aliases.insert(wrapper.to_string(), target.to_string());
        Ok(())
    }

    /// Concrete workflow name for a requested name.
    ///
    /// Aliases are one level deep; unknown names come back unchanged so the
    /// dispatcher can report them.
    pub fn resolve_name<'a>(&'a self, requested: &'a str) -> &'a str {
        self.aliases
            .get(requested)
            .map_or(requested, String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Workflow> {
        self.workflows.get(name).map(Box::as_ref)
    }

    /// Registered workflows in name order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Workflow> {
        self.workflows.values().map(Box::as_ref)
    }

    /// Aliases as `(wrapper, target)` in name order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(wrapper, target)| (wrapper.as_str(), target.as_str()))
    }
}
