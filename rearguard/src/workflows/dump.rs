//! `dump`: show the resolved run context and effective configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::version_line;
use crate::context::{Layout, Options};
use crate::core::types::OsIdentity;
use crate::exit_codes;
use crate::io::config::Settings;
use crate::io::workspace::WorkspacePaths;
use crate::workflow::{Workflow, WorkflowContext};

pub struct DumpWorkflow;

#[derive(Serialize)]
struct DumpReport<'a> {
    version: String,
    run: RunSection<'a>,
    layout: &'a Layout,
    os: &'a OsIdentity,
    options: &'a Options,
    workspace: Option<&'a WorkspacePaths>,
    settings: &'a Settings,
}

#[derive(Serialize)]
struct RunSection<'a> {
    workflow: &'a str,
    args: &'a [String],
    pid: u32,
    concurrency: String,
    log_target: PathBuf,
    kernel_version: &'a str,
    recovery_mode: bool,
}

impl Workflow for DumpWorkflow {
    fn name(&self) -> &str {
        "dump"
    }

    fn description(&self) -> &str {
        "dump configuration and system information"
    }

    fn run(&self, ctx: &WorkflowContext<'_>, args: &[String]) -> Result<i32> {
        let rendered = render(ctx, args)?;
        ctx.log.log("Dumping resolved configuration");
        for line in rendered.lines() {
            ctx.log.log(line);
        }
        print!("{rendered}");
        Ok(exit_codes::SUCCESS)
    }
}

fn render(ctx: &WorkflowContext<'_>, args: &[String]) -> Result<String> {
    let report = DumpReport {
        version: version_line(),
        run: RunSection {
            workflow: ctx.run.workflow(),
            args,
            pid: ctx.run.pid,
            concurrency: ctx.run.identity.class.to_string(),
            log_target: ctx.run.log_target().to_path_buf(),
            kernel_version: &ctx.run.kernel_version,
            recovery_mode: ctx.run.recovery_mode,
        },
        layout: &ctx.run.layout,
        os: ctx.os,
        options: &ctx.run.invocation.options,
        workspace: ctx.workspace,
        settings: ctx.settings,
    };
    toml::to_string_pretty(&report).context("render dump as toml")
}
