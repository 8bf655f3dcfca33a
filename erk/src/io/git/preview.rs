use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{
    Git, GitError, add_worktree_action, checkout_action, create_branch_action,
    delete_branch_action, pull_action, push_action, remove_worktree_action,
};
use crate::core::types::{MutationReport, WorktreeBinding};
use crate::io::sink::{TraceSink, preview_notice};

/// Dry-run decorator: queries reach `inner`, mutations only describe themselves.
pub struct PreviewGit {
    inner: Rc<dyn Git>,
    sink: Option<Rc<dyn TraceSink>>,
}

impl PreviewGit {
    pub fn new(inner: Rc<dyn Git>, sink: Option<Rc<dyn TraceSink>>) -> Self {
        Self { inner, sink }
    }

    fn preview(&self, action: String) -> Result<MutationReport, GitError> {
        preview_notice(self.sink.as_ref(), &action);
        Ok(MutationReport::previewed(action))
    }
}

impl Git for PreviewGit {
    fn repo_root(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError> {
        self.inner.repo_root(cwd)
    }

    fn common_dir(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError> {
        self.inner.common_dir(cwd)
    }

    fn current_branch(&self, cwd: &Path) -> Result<Option<String>, GitError> {
        self.inner.current_branch(cwd)
    }

    fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, GitError> {
        self.inner.branch_exists(repo, branch)
    }

    fn list_local_branches(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        self.inner.list_local_branches(repo)
    }

    fn list_worktrees(&self, repo: &Path) -> Result<Vec<WorktreeBinding>, GitError> {
        self.inner.list_worktrees(repo)
    }

    fn is_worktree_clean(&self, worktree: &Path) -> Result<bool, GitError> {
        self.inner.is_worktree_clean(worktree)
    }

    fn trunk_branch(&self, repo: &Path) -> Result<Option<String>, GitError> {
        self.inner.trunk_branch(repo)
    }

    fn create_branch(&self, _repo: &Path, branch: &str, start_point: &str) -> Result<MutationReport, GitError> {
        self.preview(create_branch_action(branch, start_point))
    }

    fn delete_branch(&self, _repo: &Path, branch: &str, force: bool) -> Result<MutationReport, GitError> {
        self.preview(delete_branch_action(branch, force))
    }

    fn checkout_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GitError> {
        self.preview(checkout_action(worktree, branch))
    }

    fn add_worktree(&self, _repo: &Path, path: &Path, branch: &str) -> Result<MutationReport, GitError> {
        self.preview(add_worktree_action(path, branch))
    }

    fn remove_worktree(&self, _repo: &Path, path: &Path, _force: bool) -> Result<MutationReport, GitError> {
        self.preview(remove_worktree_action(path))
    }

    fn pull(&self, worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError> {
        self.preview(pull_action(worktree, remote, branch))
    }

    fn push_branch(&self, _worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError> {
        self.preview(push_action(remote, branch))
    }
}
