use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{Git, GitError};
use crate::core::types::{MutationReport, WorktreeBinding};
use crate::io::sink::{TraceSink, trace_call};

/// Tracing decorator: forwards every call and reports it to the sink.
pub struct VerboseGit {
    inner: Rc<dyn Git>,
    sink: Rc<dyn TraceSink>,
}

impl VerboseGit {
    pub fn new(inner: Rc<dyn Git>, sink: Rc<dyn TraceSink>) -> Self {
        Self { inner, sink }
    }

    fn traced<T: std::fmt::Debug>(
        &self,
        call: String,
        result: Result<T, GitError>,
    ) -> Result<T, GitError> {
        trace_call(self.sink.as_ref(), &call, &result);
        result
    }
}

impl Git for VerboseGit {
    fn repo_root(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError> {
        self.traced(
            format!("git.repo_root({})", cwd.display()),
            self.inner.repo_root(cwd),
        )
    }

    fn common_dir(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError> {
        self.traced(
            format!("git.common_dir({})", cwd.display()),
            self.inner.common_dir(cwd),
        )
    }

    fn current_branch(&self, cwd: &Path) -> Result<Option<String>, GitError> {
        self.traced(
            format!("git.current_branch({})", cwd.display()),
            self.inner.current_branch(cwd),
        )
    }

    fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, GitError> {
        self.traced(
            format!("git.branch_exists({branch})"),
            self.inner.branch_exists(repo, branch),
        )
    }

    fn list_local_branches(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        self.traced(
            "git.list_local_branches()".to_string(),
            self.inner.list_local_branches(repo),
        )
    }

    fn list_worktrees(&self, repo: &Path) -> Result<Vec<WorktreeBinding>, GitError> {
        let result = self.inner.list_worktrees(repo);
        // Bindings are noisy; trace the count only.
        let summary = result.as_ref().map(Vec::len).map_err(Clone::clone);
        trace_call(self.sink.as_ref(), "git.list_worktrees() count", &summary);
        result
    }

    fn is_worktree_clean(&self, worktree: &Path) -> Result<bool, GitError> {
        self.traced(
            format!("git.is_worktree_clean({})", worktree.display()),
            self.inner.is_worktree_clean(worktree),
        )
    }

    fn trunk_branch(&self, repo: &Path) -> Result<Option<String>, GitError> {
        self.traced("git.trunk_branch()".to_string(), self.inner.trunk_branch(repo))
    }

    fn create_branch(&self, repo: &Path, branch: &str, start_point: &str) -> Result<MutationReport, GitError> {
        self.traced(
            format!("git.create_branch({branch}, {start_point})"),
            self.inner.create_branch(repo, branch, start_point),
        )
    }

    fn delete_branch(&self, repo: &Path, branch: &str, force: bool) -> Result<MutationReport, GitError> {
        self.traced(
            format!("git.delete_branch({branch}, force={force})"),
            self.inner.delete_branch(repo, branch, force),
        )
    }

    fn checkout_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GitError> {
        self.traced(
            format!("git.checkout_branch({}, {branch})", worktree.display()),
            self.inner.checkout_branch(worktree, branch),
        )
    }

    fn add_worktree(&self, repo: &Path, path: &Path, branch: &str) -> Result<MutationReport, GitError> {
        self.traced(
            format!("git.add_worktree({}, {branch})", path.display()),
            self.inner.add_worktree(repo, path, branch),
        )
    }

    fn remove_worktree(&self, repo: &Path, path: &Path, force: bool) -> Result<MutationReport, GitError> {
        self.traced(
            format!("git.remove_worktree({}, force={force})", path.display()),
            self.inner.remove_worktree(repo, path, force),
        )
    }

    fn pull(&self, worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError> {
        self.traced(
            format!("git.pull({}, {remote}, {branch})", worktree.display()),
            self.inner.pull(worktree, remote, branch),
        )
    }

    fn push_branch(&self, worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError> {
        self.traced(
            format!("git.push_branch({remote}, {branch})"),
            self.inner.push_branch(worktree, remote, branch),
        )
    }
}
