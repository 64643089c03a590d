//! Deterministic, pure logic shared by the bootstrap stages.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod concurrency;
pub mod layers;
pub mod summary;
pub mod types;
