//! Version-control gateway.
//!
//! [`Git`] is the only path through which erk inspects or changes branches,
//! refs, and worktrees. Four implementations share the trait:
//!
//! - [`LiveGit`] shells out to `git`.
//! - [`SimulatedGit`] keeps an in-memory model for tests.
//! - [`PreviewGit`] passes queries through and turns mutations into reports.
//! - [`VerboseGit`] forwards everything and traces each call.

mod live;
mod preview;
mod simulated;
mod verbose;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::errors::StepError;
use crate::core::types::{MutationReport, WorktreeBinding};

pub use live::{LiveGit, parse_worktree_list};
pub use preview::PreviewGit;
pub use simulated::SimulatedGit;
pub use verbose::VerboseGit;

/// Expected failures of git mutations, plus infrastructure faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitError {
    #[error("branch '{0}' already exists")]
    BranchExists(String),
    #[error("branch '{0}' does not exist")]
    BranchNotFound(String),
    #[error("branch '{branch}' is checked out in worktree {}", .path.display())]
    BranchCheckedOut { branch: String, path: PathBuf },
    #[error("worktree path {} already exists", .0.display())]
    WorktreePathExists(PathBuf),
    #[error("no worktree at {}", .0.display())]
    WorktreeNotFound(PathBuf),
    #[error("worktree {} has uncommitted changes", .0.display())]
    DirtyWorktree(PathBuf),
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("git unavailable: {0}")]
    Infrastructure(String),
}

impl From<GitError> for StepError {
    fn from(err: GitError) -> Self {
        let message = err.to_string();
        match err {
            GitError::BranchExists(_) | GitError::WorktreePathExists(_) => {
                StepError::conflict(message)
            }
            GitError::BranchCheckedOut { path, .. } => {
                StepError::conflict(message).with_hint(format!("cd {}", path.display()))
            }
            GitError::DirtyWorktree(_) => StepError::precondition(message)
                .with_hint("commit or stash your changes, or pass --force"),
            GitError::BranchNotFound(_) | GitError::WorktreeNotFound(_) => {
                StepError::precondition(message)
            }
            GitError::CommandFailed { .. } | GitError::Infrastructure(_) => {
                StepError::infrastructure(message)
            }
        }
    }
}

/// Version-control capabilities.
///
/// Queries return `None`/empty for expected absence and fail only on
/// infrastructure faults. Mutations return a [`MutationReport`] or a typed
/// [`GitError`].
pub trait Git {
    /// Top-level directory of the worktree containing `cwd`.
    fn repo_root(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError>;
    /// Directory shared by all worktrees (`git rev-parse --git-common-dir`).
    fn common_dir(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError>;
    /// Branch checked out in the worktree at `cwd`, `None` when detached.
    fn current_branch(&self, cwd: &Path) -> Result<Option<String>, GitError>;
    fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, GitError>;
    fn list_local_branches(&self, repo: &Path) -> Result<Vec<String>, GitError>;
    /// All worktrees, main checkout first.
    fn list_worktrees(&self, repo: &Path) -> Result<Vec<WorktreeBinding>, GitError>;
    fn is_worktree_clean(&self, worktree: &Path) -> Result<bool, GitError>;
    /// Default branch of `origin`, falling back to a local `main`/`master`.
    fn trunk_branch(&self, repo: &Path) -> Result<Option<String>, GitError>;

    /// Create `branch` at `start_point` without checking it out.
    fn create_branch(&self, repo: &Path, branch: &str, start_point: &str)
    -> Result<MutationReport, GitError>;
    fn delete_branch(&self, repo: &Path, branch: &str, force: bool)
    -> Result<MutationReport, GitError>;
    fn checkout_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GitError>;
    fn add_worktree(&self, repo: &Path, path: &Path, branch: &str)
    -> Result<MutationReport, GitError>;
    fn remove_worktree(&self, repo: &Path, path: &Path, force: bool)
    -> Result<MutationReport, GitError>;
    fn pull(&self, worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError>;
    /// Push `branch` and set its upstream.
    fn push_branch(&self, worktree: &Path, remote: &str, branch: &str)
    -> Result<MutationReport, GitError>;
}

// Action descriptions shared by every variant so reports never drift apart.

pub(crate) fn create_branch_action(branch: &str, start_point: &str) -> String {
    format!("create branch {branch} from {start_point}")
}

pub(crate) fn delete_branch_action(branch: &str, force: bool) -> String {
    if force {
        format!("force-delete branch {branch}")
    } else {
        format!("delete branch {branch}")
    }
}

pub(crate) fn checkout_action(worktree: &Path, branch: &str) -> String {
    format!("check out {branch} in {}", worktree.display())
}

pub(crate) fn add_worktree_action(path: &Path, branch: &str) -> String {
    format!("add worktree {} for {branch}", path.display())
}

pub(crate) fn remove_worktree_action(path: &Path) -> String {
    format!("remove worktree {}", path.display())
}

pub(crate) fn pull_action(worktree: &Path, remote: &str, branch: &str) -> String {
    format!("pull {remote}/{branch} into {}", worktree.display())
}

pub(crate) fn push_action(remote: &str, branch: &str) -> String {
    format!("push {branch} to {remote}")
}
