//! Bootstrap and workflow dispatch for disaster-recovery runs.
//!
//! Every `rearguard` invocation passes through the same fixed pipeline before
//! any recovery logic runs:
//!
//! 1. option parsing ([`cli`])
//! 2. concurrency classification and live log selection ([`core::concurrency`])
//! 3. single-instance enforcement ([`io::processes`])
//! 4. layered configuration resolution ([`io::config`])
//! 5. build workspace setup ([`io::workspace`])
//! 6. workflow dispatch ([`dispatch`])
//! 7. exit finalization ([`finalize`])
//!
//! The split mirrors the rest of the codebase:
//!
//! - **[`core`]**: Pure, deterministic decisions (classification, layer plans,
//!   merge, exit summaries). No I/O.
//! - **[`io`]**: Host facts, process enumeration, the run log, config files,
//!   the build workspace and signal wiring.
//!
//! [`bootstrap`] ties the stages together; workflows plug in through
//! [`workflow::WorkflowRegistry`].

pub mod bootstrap;
pub mod cli;
pub mod context;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod exit_codes;
pub mod finalize;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
pub mod workflows;
