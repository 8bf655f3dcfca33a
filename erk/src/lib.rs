//! Worktree, stack, and agent workflow orchestration.
//!
//! Every mutating command runs as two pipelines over an immutable state: a
//! validation pipeline (queries and confirmations, no mutation) and an
//! execution pipeline (mutations, no prompting). When execution has to move
//! the user's shell, it runs in a second process started from a generated
//! script. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (pipeline engine, error taxonomy,
//!   worktree scans, script rendering). No I/O.
//! - **[`io`]**: Gateways to git, Graphite, GitHub, and the agent, each with
//!   live, simulated, preview, and verbose implementations; config and
//!   script files.
//!
//! Orchestration modules ([`land`], [`branch`], [`implement`]) wire core logic
//! to gateways through an [`context::ErkContext`].

pub mod branch;
pub mod branch_manager;
pub mod cli;
pub mod context;
pub mod core;
pub mod deferred;
pub mod exit_codes;
pub mod implement;
pub mod io;
pub mod land;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
