//! Side-effecting code: gateways to external tools, config and script files.

pub mod agent;
pub mod config;
pub mod confirm;
pub mod git;
pub mod github;
pub mod graphite;
pub mod init;
pub mod process;
pub mod script_store;
pub mod sink;
