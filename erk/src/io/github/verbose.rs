use std::fmt::Debug;
use std::path::Path;
use std::rc::Rc;

use super::{GitHub, GitHubError};
use crate::core::types::{MergeMethod, MutationReport, PullRequest};
use crate::io::sink::{TraceSink, trace_call};

/// Tracing decorator for [`GitHub`].
pub struct VerboseGitHub {
    inner: Rc<dyn GitHub>,
    sink: Rc<dyn TraceSink>,
}

impl VerboseGitHub {
    pub fn new(inner: Rc<dyn GitHub>, sink: Rc<dyn TraceSink>) -> Self {
        Self { inner, sink }
    }

    fn traced<T: Debug>(&self, call: String, result: Result<T, GitHubError>) -> Result<T, GitHubError> {
        trace_call(self.sink.as_ref(), &call, &result);
        result
    }
}

impl GitHub for VerboseGitHub {
    fn pull_request(&self, repo: &Path, number: u64) -> Result<Option<PullRequest>, GitHubError> {
        self.traced(
            format!("gh.pull_request({number})"),
            self.inner.pull_request(repo, number),
        )
    }

    fn pull_request_for_branch(&self, repo: &Path, branch: &str) -> Result<Option<PullRequest>, GitHubError> {
        self.traced(
            format!("gh.pull_request_for_branch({branch})"),
            self.inner.pull_request_for_branch(repo, branch),
        )
    }

    fn merge_pull_request(&self, repo: &Path, number: u64, method: MergeMethod) -> Result<MutationReport, GitHubError> {
        self.traced(
            format!("gh.merge_pull_request({number}, {method:?})"),
            self.inner.merge_pull_request(repo, number, method),
        )
    }

    fn add_label(&self, repo: &Path, number: u64, label: &str) -> Result<MutationReport, GitHubError> {
        self.traced(
            format!("gh.add_label({number}, {label})"),
            self.inner.add_label(repo, number, label),
        )
    }
}
