//! Workflow dispatch: look up the frozen workflow name and run its handler.

use std::time::Instant;

use anyhow::Result;
use tracing::debug;

use crate::exit_codes;
use crate::workflow::{WorkflowContext, WorkflowRegistry};

/// What happened at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler returned normally with this code.
    Completed { code: i32 },
    /// No handler is registered under the name. Not an abort.
    UnknownWorkflow,
}

impl DispatchOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            DispatchOutcome::Completed { code } => code,
            DispatchOutcome::UnknownWorkflow => exit_codes::FAILURE,
        }
    }
}

/// Run the handler for `ctx.run.workflow()` with the passthrough arguments.
///
/// A handler error is returned as is; the caller treats it as fatal.
pub fn dispatch(registry: &WorkflowRegistry, ctx: &WorkflowContext<'_>) -> Result<DispatchOutcome> {
    let name = ctx.run.workflow();
    let Some(workflow) = registry.get(name) else {
        let message = format!("ERROR: The specified command '{name}' does not exist!");
        ctx.log.log_print_error(message);
        return Ok(DispatchOutcome::UnknownWorkflow);
    };

    let args = &ctx.run.invocation.args;
    let system = if ctx.run.recovery_mode {
        "rescue/recovery system"
    } else {
        "normal/original system"
    };
    let log = ctx.log;
    log.log(format!("Running workflow {name} on the {system}"));
    if !args.is_empty() {
        log.debug(format!("Workflow arguments: {}", args.join(" ")));
    }
    let started = Instant::now();
    let code = workflow.run(ctx, args)?;
    let elapsed = started.elapsed();
    debug!(workflow = name, code, ?elapsed, "workflow returned");
    log.log(format!("Finished workflow {name} with exit code {code}"));
    Ok(DispatchOutcome::Completed { code })
}
