//! Remote-hosting gateway (GitHub, binary `gh`).

mod live;
mod preview;
mod simulated;
mod verbose;

use std::path::Path;

use thiserror::Error;

use crate::core::errors::StepError;
use crate::core::types::{MergeMethod, MutationReport, PullRequest};

pub use live::LiveGitHub;
pub use preview::PreviewGitHub;
pub use simulated::SimulatedGitHub;
pub use verbose::VerboseGitHub;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitHubError {
    #[error("gh is not installed")]
    NotInstalled,
    #[error("pull request #{0} not found")]
    PullRequestNotFound(u64),
    #[error("pull request #{number} is not mergeable: {reason}")]
    NotMergeable { number: u64, reason: String },
    #[error("gh {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("github unavailable: {0}")]
    Infrastructure(String),
}

impl From<GitHubError> for StepError {
    fn from(err: GitHubError) -> Self {
        let message = err.to_string();
        match err {
            GitHubError::NotMergeable { number, .. } => StepError::conflict(message)
                .with_hint(format!("gh pr view {number} --web")),
            GitHubError::PullRequestNotFound(_) => StepError::precondition(message),
            GitHubError::NotInstalled => {
                StepError::precondition(message).with_hint("install gh and run `gh auth login`")
            }
            GitHubError::CommandFailed { .. } | GitHubError::Infrastructure(_) => {
                StepError::infrastructure(message)
            }
        }
    }
}

/// Pull request capabilities. `repo` is any directory inside the checkout.
pub trait GitHub {
    fn pull_request(&self, repo: &Path, number: u64) -> Result<Option<PullRequest>, GitHubError>;
    /// Most recent pull request whose head is `branch`.
    fn pull_request_for_branch(&self, repo: &Path, branch: &str)
    -> Result<Option<PullRequest>, GitHubError>;

    fn merge_pull_request(&self, repo: &Path, number: u64, method: MergeMethod)
    -> Result<MutationReport, GitHubError>;
    fn add_label(&self, repo: &Path, number: u64, label: &str) -> Result<MutationReport, GitHubError>;
}

pub(crate) fn merge_action(number: u64, method: MergeMethod) -> String {
    format!("merge PR #{number} ({})", method.as_flag().trim_start_matches('-'))
}

pub(crate) fn label_action(number: u64, label: &str) -> String {
    format!("label PR #{number} with '{label}'")
}
