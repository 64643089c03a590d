//! Shared deterministic types for the bootstrap stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether an invocation may run next to other instances of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyClass {
    /// Only one instance per executable path may run.
    Exclusive,
    /// May run alongside anything; shares one fixed live log.
    Lockless,
    /// May run alongside anything; gets a per-process live log.
    SimultaneousNamed,
}

impl ConcurrencyClass {
    pub fn requires_single_instance(self) -> bool {
        self == ConcurrencyClass::Exclusive
    }
}

impl fmt::Display for ConcurrencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConcurrencyClass::Exclusive => "exclusive",
            ConcurrencyClass::Lockless => "lockless",
            ConcurrencyClass::SimultaneousNamed => "simultaneous",
        };
        f.write_str(label)
    }
}

/// Identifiers produced by OS/vendor detection.
///
/// Empty strings mean "not detected"; layer file names built from an empty
/// identifier are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsIdentity {
    /// Machine architecture, e.g. `x86_64`.
    pub arch: String,
    /// OS family, e.g. `GNU/Linux`.
    pub os: String,
    /// Vendor this distribution derives from, e.g. `Debian` for Ubuntu.
    pub os_master_vendor: String,
    /// Distribution vendor, e.g. `Ubuntu`.
    pub os_vendor: String,
    /// Distribution version, e.g. `22.04`.
    pub os_version: String,
}
