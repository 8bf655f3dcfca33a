//! In-memory [`Git`] for tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{
    Git, GitError, add_worktree_action, checkout_action, create_branch_action,
    delete_branch_action, pull_action, push_action, remove_worktree_action,
};
use crate::core::types::{MutationReport, WorktreeBinding};
use crate::core::worktrees::{binding_at, binding_containing, find_binding};

#[derive(Debug, Clone)]
struct Model {
    branches: BTreeSet<String>,
    worktrees: Vec<WorktreeBinding>,
    dirty: BTreeSet<PathBuf>,
    trunk: Option<String>,
}

#[derive(Debug, Default)]
struct Logs {
    created: Vec<(String, String)>,
    deleted: Vec<String>,
    checkouts: Vec<(PathBuf, String)>,
    added_worktrees: Vec<(PathBuf, String)>,
    removed_worktrees: Vec<PathBuf>,
    pulls: Vec<(PathBuf, String)>,
    pushes: Vec<String>,
}

/// Git model seeded by tests.
///
/// Enforces git's own rule that a branch is checked out at most once, so
/// tests see the same refusals the real binary produces. Mutation logs are
/// exposed as cloned snapshots.
#[derive(Debug)]
pub struct SimulatedGit {
    model: RefCell<Model>,
    logs: RefCell<Logs>,
    failures: RefCell<BTreeMap<&'static str, GitError>>,
}

impl SimulatedGit {
    /// Repository at `root` with `main` checked out in the root worktree.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let model = Model {
            branches: BTreeSet::from(["main".to_string()]),
            worktrees: vec![WorktreeBinding {
                path: root,
                branch: Some("main".to_string()),
                is_root: true,
            }],
            dirty: BTreeSet::new(),
            trunk: Some("main".to_string()),
        };
        Self {
            model: RefCell::new(model),
            logs: RefCell::new(Logs::default()),
            failures: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn with_branch(self, name: &str) -> Self {
        self.model.borrow_mut().branches.insert(name.to_string());
        self
    }

    /// Check out `name` in the root worktree instead of `main`.
    pub fn with_root_branch(self, name: &str) -> Self {
        {
            let mut model = self.model.borrow_mut();
            model.branches.insert(name.to_string());
            if let Some(root) = model.worktrees.iter_mut().find(|w| w.is_root) {
                root.branch = Some(name.to_string());
            }
        }
        self
    }

    /// Add a linked worktree. A named branch is created if missing.
    pub fn with_worktree(self, path: impl Into<PathBuf>, branch: Option<&str>) -> Self {
        {
            let mut model = self.model.borrow_mut();
            if let Some(name) = branch {
                model.branches.insert(name.to_string());
            }
            model.worktrees.push(WorktreeBinding {
                path: path.into(),
                branch: branch.map(str::to_string),
                is_root: false,
            });
        }
        self
    }

    pub fn with_dirty(self, worktree: impl Into<PathBuf>) -> Self {
        self.model.borrow_mut().dirty.insert(worktree.into());
        self
    }

    pub fn with_trunk(self, trunk: Option<&str>) -> Self {
        self.model.borrow_mut().trunk = trunk.map(str::to_string);
        self
    }

    /// Make the next call of mutation `operation` fail with `err`.
    ///
    /// `operation` is the trait method name, e.g. `"delete_branch"`.
    pub fn fail_next(&self, operation: &'static str, err: GitError) {
        self.failures.borrow_mut().insert(operation, err);
    }

    pub fn branches(&self) -> Vec<String> {
        self.model.borrow().branches.iter().cloned().collect()
    }

    pub fn worktrees(&self) -> Vec<WorktreeBinding> {
        self.model.borrow().worktrees.clone()
    }

    pub fn created_branches(&self) -> Vec<(String, String)> {
        self.logs.borrow().created.clone()
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.logs.borrow().deleted.clone()
    }

    pub fn checkouts(&self) -> Vec<(PathBuf, String)> {
        self.logs.borrow().checkouts.clone()
    }

    pub fn added_worktrees(&self) -> Vec<(PathBuf, String)> {
        self.logs.borrow().added_worktrees.clone()
    }

    pub fn removed_worktrees(&self) -> Vec<PathBuf> {
        self.logs.borrow().removed_worktrees.clone()
    }

    pub fn pulls(&self) -> Vec<(PathBuf, String)> {
        self.logs.borrow().pulls.clone()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.logs.borrow().pushes.clone()
    }

    /// Total number of logged mutations of any kind.
    pub fn mutation_count(&self) -> usize {
        let logs = self.logs.borrow();
        logs.created.len()
            + logs.deleted.len()
            + logs.checkouts.len()
            + logs.added_worktrees.len()
            + logs.removed_worktrees.len()
            + logs.pulls.len()
            + logs.pushes.len()
    }

    fn injected(&self, operation: &'static str) -> Result<(), GitError> {
        match self.failures.borrow_mut().remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Git for SimulatedGit {
    fn repo_root(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError> {
        let model = self.model.borrow();
        Ok(binding_containing(&model.worktrees, cwd).map(|b| b.path.clone()))
    }

    fn common_dir(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError> {
        let model = self.model.borrow();
        if binding_containing(&model.worktrees, cwd).is_none() {
            return Ok(None);
        }
        Ok(model
            .worktrees
            .iter()
            .find(|b| b.is_root)
            .map(|b| b.path.join(".git")))
    }

    fn current_branch(&self, cwd: &Path) -> Result<Option<String>, GitError> {
        let model = self.model.borrow();
        Ok(binding_containing(&model.worktrees, cwd).and_then(|b| b.branch.clone()))
    }

    fn branch_exists(&self, _repo: &Path, branch: &str) -> Result<bool, GitError> {
        Ok(self.model.borrow().branches.contains(branch))
    }

    fn list_local_branches(&self, _repo: &Path) -> Result<Vec<String>, GitError> {
        Ok(self.branches())
    }

    fn list_worktrees(&self, _repo: &Path) -> Result<Vec<WorktreeBinding>, GitError> {
        Ok(self.worktrees())
    }

    fn is_worktree_clean(&self, worktree: &Path) -> Result<bool, GitError> {
        Ok(!self.model.borrow().dirty.contains(worktree))
    }

    fn trunk_branch(&self, _repo: &Path) -> Result<Option<String>, GitError> {
        Ok(self.model.borrow().trunk.clone())
    }

    fn create_branch(
        &self,
        _repo: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<MutationReport, GitError> {
        self.injected("create_branch")?;
        let mut model = self.model.borrow_mut();
        if model.branches.contains(branch) {
            return Err(GitError::BranchExists(branch.to_string()));
        }
        if !model.branches.contains(start_point) {
            return Err(GitError::BranchNotFound(start_point.to_string()));
        }
        model.branches.insert(branch.to_string());
        self.logs
            .borrow_mut()
            .created
            .push((branch.to_string(), start_point.to_string()));
        Ok(MutationReport::applied(create_branch_action(branch, start_point)))
    }

    fn delete_branch(
        &self,
        _repo: &Path,
        branch: &str,
        force: bool,
    ) -> Result<MutationReport, GitError> {
        self.injected("delete_branch")?;
        let mut model = self.model.borrow_mut();
        if !model.branches.contains(branch) {
            return Err(GitError::BranchNotFound(branch.to_string()));
        }
        if let Some(binding) = find_binding(&model.worktrees, branch) {
            return Err(GitError::BranchCheckedOut {
                branch: branch.to_string(),
                path: binding.path.clone(),
            });
        }
        model.branches.remove(branch);
        self.logs.borrow_mut().deleted.push(branch.to_string());
        Ok(MutationReport::applied(delete_branch_action(branch, force)))
    }

    fn checkout_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GitError> {
        self.injected("checkout_branch")?;
        let mut model = self.model.borrow_mut();
        if !model.branches.contains(branch) {
            return Err(GitError::BranchNotFound(branch.to_string()));
        }
        if let Some(holder) = find_binding(&model.worktrees, branch)
            && holder.path != worktree
        {
            return Err(GitError::BranchCheckedOut {
                branch: branch.to_string(),
                path: holder.path.clone(),
            });
        }
        let slot = model
            .worktrees
            .iter_mut()
            .find(|b| b.path == worktree)
            .ok_or_else(|| GitError::WorktreeNotFound(worktree.to_path_buf()))?;
        slot.branch = Some(branch.to_string());
        self.logs
            .borrow_mut()
            .checkouts
            .push((worktree.to_path_buf(), branch.to_string()));
        Ok(MutationReport::applied(checkout_action(worktree, branch)))
    }

    fn add_worktree(&self, _repo: &Path, path: &Path, branch: &str) -> Result<MutationReport, GitError> {
        self.injected("add_worktree")?;
        let mut model = self.model.borrow_mut();
        if binding_at(&model.worktrees, path).is_some() {
            return Err(GitError::WorktreePathExists(path.to_path_buf()));
        }
        if !model.branches.contains(branch) {
            return Err(GitError::BranchNotFound(branch.to_string()));
        }
        if let Some(holder) = find_binding(&model.worktrees, branch) {
            return Err(GitError::BranchCheckedOut {
                branch: branch.to_string(),
                path: holder.path.clone(),
            });
        }
        model.worktrees.push(WorktreeBinding {
            path: path.to_path_buf(),
            branch: Some(branch.to_string()),
            is_root: false,
        });
        self.logs
            .borrow_mut()
            .added_worktrees
            .push((path.to_path_buf(), branch.to_string()));
        Ok(MutationReport::applied(add_worktree_action(path, branch)))
    }

    fn remove_worktree(&self, _repo: &Path, path: &Path, force: bool) -> Result<MutationReport, GitError> {
        self.injected("remove_worktree")?;
        let mut model = self.model.borrow_mut();
        let Some(binding) = binding_at(&model.worktrees, path) else {
            return Err(GitError::WorktreeNotFound(path.to_path_buf()));
        };
        if binding.is_root {
            return Err(GitError::CommandFailed {
                command: "worktree".to_string(),
                stderr: "fatal: cannot remove the main working tree".to_string(),
            });
        }
        if !force && model.dirty.contains(path) {
            return Err(GitError::DirtyWorktree(path.to_path_buf()));
        }
        model.worktrees.retain(|b| b.path != path);
        model.dirty.remove(path);
        self.logs
            .borrow_mut()
            .removed_worktrees
            .push(path.to_path_buf());
        Ok(MutationReport::applied(remove_worktree_action(path)))
    }

    fn pull(&self, worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError> {
        self.injected("pull")?;
        self.logs
            .borrow_mut()
            .pulls
            .push((worktree.to_path_buf(), branch.to_string()));
        Ok(MutationReport::applied(pull_action(worktree, remote, branch)))
    }

    fn push_branch(&self, _worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError> {
        self.injected("push_branch")?;
        if !self.model.borrow().branches.contains(branch) {
            return Err(GitError::BranchNotFound(branch.to_string()));
        }
        self.logs.borrow_mut().pushes.push(branch.to_string());
        Ok(MutationReport::applied(push_action(remote, branch)))
    }
}
