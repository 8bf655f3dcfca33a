//! In-memory [`GitHub`] for tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use super::{GitHub, GitHubError, label_action, merge_action};
use crate::core::types::{MergeMethod, Mergeable, MutationReport, PrState, PullRequest};

#[derive(Debug, Default)]
struct Logs {
    merged: Vec<(u64, MergeMethod)>,
    labels: Vec<(u64, String)>,
}

#[derive(Debug, Default)]
pub struct SimulatedGitHub {
    pulls: RefCell<BTreeMap<u64, PullRequest>>,
    logs: RefCell<Logs>,
    failures: RefCell<BTreeMap<&'static str, GitHubError>>,
}

impl SimulatedGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pull_request(self, pr: PullRequest) -> Self {
        self.pulls.borrow_mut().insert(pr.number, pr);
        self
    }

    /// Open, mergeable pull request from `head` into `base`.
    pub fn with_open_pr(self, number: u64, head: &str, base: &str) -> Self {
        self.with_pull_request(PullRequest {
            number,
            title: format!("Change {number}"),
            state: PrState::Open,
            head: head.to_string(),
            base: base.to_string(),
            url: format!("https://github.test/acme/app/pull/{number}"),
            mergeable: Mergeable::Mergeable,
        })
    }

    pub fn fail_next(&self, operation: &'static str, err: GitHubError) {
        self.failures.borrow_mut().insert(operation, err);
    }

    pub fn pull(&self, number: u64) -> Option<PullRequest> {
        self.pulls.borrow().get(&number).cloned()
    }

    pub fn merged(&self) -> Vec<(u64, MergeMethod)> {
        self.logs.borrow().merged.clone()
    }

    pub fn labels(&self) -> Vec<(u64, String)> {
        self.logs.borrow().labels.clone()
    }

    pub fn mutation_count(&self) -> usize {
        let logs = self.logs.borrow();
        logs.merged.len() + logs.labels.len()
    }

    fn injected(&self, operation: &'static str) -> Result<(), GitHubError> {
        match self.failures.borrow_mut().remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl GitHub for SimulatedGitHub {
    fn pull_request(&self, _repo: &Path, number: u64) -> Result<Option<PullRequest>, GitHubError> {
        Ok(self.pull(number))
    }

    fn pull_request_for_branch(&self, _repo: &Path, branch: &str) -> Result<Option<PullRequest>, GitHubError> {
        Ok(self
            .pulls
            .borrow()
            .values()
            .rev()
            .find(|pr| pr.head == branch)
            .cloned())
    }

    fn merge_pull_request(&self, _repo: &Path, number: u64, method: MergeMethod) -> Result<MutationReport, GitHubError> {
        self.injected("merge_pull_request")?;
        let mut pulls = self.pulls.borrow_mut();
        let pr = pulls
            .get_mut(&number)
            .ok_or(GitHubError::PullRequestNotFound(number))?;
        match (pr.state, pr.mergeable) {
            (PrState::Merged, _) => return Ok(MutationReport::unchanged(merge_action(number, method))),
            (PrState::Closed, _) => {
                return Err(GitHubError::NotMergeable {
                    number,
                    reason: "pull request is closed".to_string(),
                });
            }
            (PrState::Open, Mergeable::Conflicting) => {
                return Err(GitHubError::NotMergeable {
                    number,
                    reason: "merge conflict".to_string(),
                });
            }
            (PrState::Open, _) => {}
        }
        pr.state = PrState::Merged;
        self.logs.borrow_mut().merged.push((number, method));
        Ok(MutationReport::applied(merge_action(number, method)))
    }

    fn add_label(&self, _repo: &Path, number: u64, label: &str) -> Result<MutationReport, GitHubError> {
        self.injected("add_label")?;
        if !self.pulls.borrow().contains_key(&number) {
            return Err(GitHubError::PullRequestNotFound(number));
        }
        self.logs.borrow_mut().labels.push((number, label.to_string()));
        Ok(MutationReport::applied(label_action(number, label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_marks_pull_request_merged_once() {
        let gh = SimulatedGitHub::new().with_open_pr(7, "feature", "main");
        let repo = Path::new("/repo");
        let first = gh.merge_pull_request(repo, 7, MergeMethod::Squash).expect("merge");
        let second = gh.merge_pull_request(repo, 7, MergeMethod::Squash).expect("again");
        assert_eq!(first.to_string(), "merge PR #7 (squash)");
        assert_eq!(second.to_string(), "merge PR #7 (squash) (already done)");
        assert_eq!(gh.merged().len(), 1);
        assert_eq!(gh.pull(7).map(|pr| pr.state), Some(PrState::Merged));
    }

    #[test]
    fn conflicting_pull_request_is_not_mergeable() {
        let gh = SimulatedGitHub::new().with_pull_request(PullRequest {
            mergeable: Mergeable::Conflicting,
            ..PullRequest {
                number: 3,
                title: "x".to_string(),
                state: PrState::Open,
                head: "x".to_string(),
                base: "main".to_string(),
                url: String::new(),
                mergeable: Mergeable::Unknown,
            }
        });
        let err = gh
            .merge_pull_request(Path::new("/repo"), 3, MergeMethod::Merge)
            .unwrap_err();
        assert!(matches!(err, GitHubError::NotMergeable { number: 3, .. }));
    }

    #[test]
    fn finds_pull_request_by_head_branch() {
        let gh = SimulatedGitHub::new()
            .with_open_pr(1, "feature", "main")
            .with_open_pr(2, "other", "main");
        let pr = gh
            .pull_request_for_branch(Path::new("/repo"), "other")
            .expect("query");
        assert_eq!(pr.map(|p| p.number), Some(2));
    }
}
