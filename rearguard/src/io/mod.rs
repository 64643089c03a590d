//! Side-effecting adapters used by the bootstrap stages.

pub mod config;
pub mod host;
pub mod log;
pub mod os_detect;
pub mod processes;
pub mod signals;
pub mod workspace;
