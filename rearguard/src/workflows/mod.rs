//! Workflows compiled into the binary.
//!
//! Recovery workflows live outside this crate and register themselves
//! through [`WorkflowRegistry`]; only the diagnostics shipped with the
//! bootstrap are defined here.

pub mod dump;
pub mod help;

use anyhow::Result;

use crate::workflow::WorkflowRegistry;

/// Registry with the built-in workflows.
pub fn builtin_registry() -> Result<WorkflowRegistry> {
    let mut registry = WorkflowRegistry::new();
    registry.register(Box::new(dump::DumpWorkflow))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_dump() {
        let registry = builtin_registry().expect("registry");
        assert!(registry.get("dump").is_some());
    }
}
