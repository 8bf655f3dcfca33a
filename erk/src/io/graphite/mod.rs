//! Stack-tool gateway (Graphite, binary `gt`).
//!
//! Metadata queries take the repository's git common directory, where
//! Graphite keeps its state. Mutations take the worktree `gt` runs in.

mod live;
mod preview;
mod simulated;
mod verbose;

use std::path::Path;

use thiserror::Error;

use crate::core::errors::StepError;
use crate::core::types::MutationReport;

pub use live::{LiveGraphite, StackCache, parse_cache};
pub use preview::PreviewGraphite;
pub use simulated::SimulatedGraphite;
pub use verbose::VerboseGraphite;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphiteError {
    #[error("gt is not installed")]
    NotInstalled,
    #[error("branch '{0}' is not tracked by graphite")]
    NotTracked(String),
    #[error("gt {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("graphite unavailable: {0}")]
    Infrastructure(String),
}

impl From<GraphiteError> for StepError {
    fn from(err: GraphiteError) -> Self {
        let message = err.to_string();
        match err {
            GraphiteError::NotTracked(_) => StepError::precondition(message),
            GraphiteError::NotInstalled => StepError::precondition(message)
                .with_hint("install gt or set backend = \"git\" in .erk/config.toml"),
            GraphiteError::CommandFailed { .. } | GraphiteError::Infrastructure(_) => {
                StepError::infrastructure(message)
            }
        }
    }
}

/// Stack metadata capabilities.
pub trait Graphite {
    /// True when `gt` can be executed.
    fn is_available(&self) -> bool;
    /// True when the repository has been initialized with `gt init`.
    fn is_initialized(&self, git_dir: &Path) -> Result<bool, GraphiteError>;
    fn branch_parent(&self, git_dir: &Path, branch: &str) -> Result<Option<String>, GraphiteError>;
    /// Direct children, sorted by name.
    fn branch_children(&self, git_dir: &Path, branch: &str) -> Result<Vec<String>, GraphiteError>;
    fn is_tracked(&self, git_dir: &Path, branch: &str) -> Result<bool, GraphiteError>;

    /// Track `branch` with `parent`, or move it under a new parent.
    fn track_branch(&self, worktree: &Path, branch: &str, parent: &str)
    -> Result<MutationReport, GraphiteError>;
    fn untrack_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError>;
    /// Push `branch` and create or update its pull request.
    fn submit_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError>;
}

pub(crate) fn track_action(branch: &str, parent: &str) -> String {
    format!("track {branch} on {parent}")
}

pub(crate) fn untrack_action(branch: &str) -> String {
    format!("untrack {branch}")
}

pub(crate) fn submit_action(branch: &str) -> String {
    format!("submit {branch}")
}
