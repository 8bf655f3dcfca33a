use std::path::Path;
use std::rc::Rc;

use super::{GitHub, GitHubError, label_action, merge_action};
use crate::core::types::{MergeMethod, MutationReport, PullRequest};
use crate::io::sink::{TraceSink, preview_notice};

/// Dry-run decorator for [`GitHub`].
pub struct PreviewGitHub {
    inner: Rc<dyn GitHub>,
    sink: Option<Rc<dyn TraceSink>>,
}

impl PreviewGitHub {
    pub fn new(inner: Rc<dyn GitHub>, sink: Option<Rc<dyn TraceSink>>) -> Self {
        Self { inner, sink }
    }

    fn preview(&self, action: String) -> Result<MutationReport, GitHubError> {
        preview_notice(self.sink.as_ref(), &action);
        Ok(MutationReport::previewed(action))
    }
}

impl GitHub for PreviewGitHub {
    fn pull_request(&self, repo: &Path, number: u64) -> Result<Option<PullRequest>, GitHubError> {
        self.inner.pull_request(repo, number)
    }

    fn pull_request_for_branch(&self, repo: &Path, branch: &str) -> Result<Option<PullRequest>, GitHubError> {
        self.inner.pull_request_for_branch(repo, branch)
    }

    fn merge_pull_request(&self, _repo: &Path, number: u64, method: MergeMethod) -> Result<MutationReport, GitHubError> {
        self.preview(merge_action(number, method))
    }

    fn add_label(&self, _repo: &Path, number: u64, label: &str) -> Result<MutationReport, GitHubError> {
        self.preview(label_action(number, label))
    }
}
