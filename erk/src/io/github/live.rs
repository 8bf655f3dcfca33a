//! `gh` subprocess implementation of [`GitHub`].

use std::path::Path;

use tracing::{debug, instrument, warn};

use super::{GitHub, GitHubError, label_action, merge_action};
use crate::core::types::{MergeMethod, MutationReport, PullRequest};
use crate::io::process::{CommandOutput, ProcessRunner};

const PR_FIELDS: &str = "number,title,state,headRefName,baseRefName,url,mergeable";

#[derive(Debug, Clone)]
pub struct LiveGitHub {
    runner: ProcessRunner,
}

impl LiveGitHub {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }

    fn run(&self, repo: &Path, args: &[&str]) -> Result<CommandOutput, GitHubError> {
        if which::which("gh").is_err() {
            return Err(GitHubError::NotInstalled);
        }
        let output = self
            .runner
            .run("gh", args, repo)
            .map_err(|e| GitHubError::Infrastructure(format!("{e:#}")))?;
        if output.timed_out {
            return Err(GitHubError::Infrastructure(format!(
                "gh {} timed out",
                args.join(" ")
            )));
        }
        Ok(output)
    }

    fn view(&self, repo: &Path, selector: &str) -> Result<Option<PullRequest>, GitHubError> {
        let output = self.run(repo, &["pr", "view", selector, "--json", PR_FIELDS])?;
        if !output.success() {
            let stderr = output.stderr_text();
            if is_not_found(&stderr) {
                debug!(selector, "no pull request");
                return Ok(None);
            }
            return Err(GitHubError::Infrastructure(format!("gh pr view: {stderr}")));
        }
        let pr = serde_json::from_slice(&output.stdout)
            .map_err(|e| GitHubError::Infrastructure(format!("parse gh pr view output: {e}")))?;
        Ok(Some(pr))
    }
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no pull requests found") || lower.contains("could not resolve to a pullrequest")
}

fn is_not_mergeable(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("not mergeable") || lower.contains("merge conflict")
}

impl GitHub for LiveGitHub {
    fn pull_request(&self, repo: &Path, number: u64) -> Result<Option<PullRequest>, GitHubError> {
        self.view(repo, &number.to_string())
    }

    fn pull_request_for_branch(&self, repo: &Path, branch: &str) -> Result<Option<PullRequest>, GitHubError> {
        self.view(repo, branch)
    }

    #[instrument(skip_all, fields(number, method = ?method))]
    fn merge_pull_request(&self, repo: &Path, number: u64, method: MergeMethod) -> Result<MutationReport, GitHubError> {
        let selector = number.to_string();
        let output = self.run(repo, &["pr", "merge", &selector, method.as_flag()])?;
        if !output.success() {
            let stderr = output.stderr_text();
            warn!(stderr = %stderr, "gh pr merge failed");
            if is_not_mergeable(&stderr) {
                return Err(GitHubError::NotMergeable {
                    number,
                    reason: stderr,
                });
            }
            return Err(GitHubError::CommandFailed {
                command: "pr merge".to_string(),
                stderr,
            });
        }
        Ok(MutationReport::applied(merge_action(number, method)))
    }

    #[instrument(skip_all, fields(number, label))]
    fn add_label(&self, repo: &Path, number: u64, label: &str) -> Result<MutationReport, GitHubError> {
        let selector = number.to_string();
        let output = self.run(repo, &["pr", "edit", &selector, "--add-label", label])?;
        if !output.success() {
            return Err(GitHubError::CommandFailed {
                command: "pr edit".to_string(),
                stderr: output.stderr_text(),
            });
        }
        Ok(MutationReport::applied(label_action(number, label)))
    }
}
