//! Deterministic, pure logic shared by erk commands.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values (worktree listings, pipeline states, script plans) and return
//! deterministic outputs suitable for tests.

pub mod errors;
pub mod names;
pub mod pipeline;
pub mod script;
pub mod types;
pub mod worktrees;
