//! Branch operations over either the stack tool or plain git.
//!
//! The backend is picked once per process in [`resolve_backend`] and stored in
//! the [`BranchManager`] variant. Every operation that puts a branch into a
//! worktree first rescans the worktree listing and refuses when another
//! worktree already holds the branch.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::errors::StepError;
use crate::core::types::{Backend, BranchRecord, MutationReport, MutationStatus};
use crate::core::worktrees::{binding_at, conflicting_binding, find_binding};
use crate::io::config::BackendPreference;
use crate::io::git::{Git, GitError};
use crate::io::graphite::{Graphite, GraphiteError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BranchError {
    /// Another worktree holds the branch.
    #[error("branch '{branch}' is checked out in {}", .path.display())]
    Conflict { branch: String, path: PathBuf },
    #[error("worktree {} has a detached HEAD; check out a branch first", .0.display())]
    DetachedHead(PathBuf),
    /// The ref is gone but the stack overlay still lists the branch.
    #[error("deleted '{branch}' but could not remove its stack metadata: {source}")]
    MetadataCleanup {
        branch: String,
        source: GraphiteError,
    },
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Graphite(#[from] GraphiteError),
}

impl From<BranchError> for StepError {
    fn from(err: BranchError) -> Self {
        match err {
            BranchError::Conflict { ref path, .. } => {
                let hint = format!("cd {}", path.display());
                StepError::conflict(err.to_string()).with_hint(hint)
            }
            BranchError::DetachedHead(_) => StepError::precondition(err.to_string()),
            BranchError::MetadataCleanup { ref branch, .. } => {
                let hint = format!("gt untrack {branch} --force");
                StepError::infrastructure(err.to_string()).with_hint(hint)
            }
            BranchError::Git(inner) => inner.into(),
            BranchError::Graphite(inner) => inner.into(),
        }
    }
}

/// Pick the backend for this process.
///
/// `auto` selects Graphite only when `gt` is installed and the repository was
/// initialized with it. An explicit `graphite` preference without `gt`
/// installed is an error rather than a silent downgrade.
pub fn resolve_backend(
    preference: BackendPreference,
    graphite_available: bool,
    graphite_initialized: bool,
) -> Result<Backend, GraphiteError> {
    match preference {
        BackendPreference::Git => Ok(Backend::Git),
        BackendPreference::Graphite if graphite_available => Ok(Backend::Graphite),
        BackendPreference::Graphite => Err(GraphiteError::NotInstalled),
        BackendPreference::Auto if graphite_available && graphite_initialized => {
            Ok(Backend::Graphite)
        }
        BackendPreference::Auto => Ok(Backend::Git),
    }
}

/// Plain git branches.
#[derive(Clone)]
pub struct GitBranches {
    git: Rc<dyn Git>,
}

/// Git refs plus Graphite stack metadata.
#[derive(Clone)]
pub struct GraphiteBranches {
    git: Rc<dyn Git>,
    graphite: Rc<dyn Graphite>,
    /// Git common dir, where Graphite keeps its metadata.
    git_dir: PathBuf,
}

#[derive(Clone)]
pub enum BranchManager {
    Graphite(GraphiteBranches),
    Git(GitBranches),
}

impl BranchManager {
    pub fn new(
        backend: Backend,
        git: Rc<dyn Git>,
        graphite: Rc<dyn Graphite>,
        git_dir: PathBuf,
    ) -> Self {
        match backend {
            Backend::Graphite => BranchManager::Graphite(GraphiteBranches {
                git,
                graphite,
                git_dir,
            }),
            Backend::Git => BranchManager::Git(GitBranches { git }),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            BranchManager::Graphite(_) => Backend::Graphite,
            BranchManager::Git(_) => Backend::Git,
        }
    }

    /// Plain git manager sharing this manager's git gateway.
    ///
    /// Used for slot placeholder branches, which never enter the stack.
    pub fn plain(&self) -> BranchManager {
        BranchManager::Git(GitBranches {
            git: self.git().clone(),
        })
    }

    fn git(&self) -> &Rc<dyn Git> {
        match self {
            BranchManager::Graphite(inner) => &inner.git,
            BranchManager::Git(inner) => &inner.git,
        }
    }

    /// Create `branch` from `base`. The branch checked out in `worktree` is
    /// the same after the call as before it.
    #[instrument(skip_all, fields(backend = %self.backend(), branch, base))]
    pub fn create(
        &self,
        worktree: &Path,
        branch: &str,
        base: &str,
    ) -> Result<MutationReport, BranchError> {
        match self {
            BranchManager::Git(inner) => Ok(inner.git.create_branch(worktree, branch, base)?),
            BranchManager::Graphite(inner) => inner.create(worktree, branch, base),
        }
    }

    /// Check out `branch` in `worktree`, refusing if another worktree holds it.
    #[instrument(skip_all, fields(branch, worktree = %worktree.display()))]
    pub fn checkout(&self, worktree: &Path, branch: &str) -> Result<MutationReport, BranchError> {
        let git = self.git();
        let bindings = git.list_worktrees(worktree)?;
        if let Some(holder) = conflicting_binding(&bindings, branch, worktree) {
            warn!(holder = %holder.path.display(), "branch held by another worktree");
            return Err(BranchError::Conflict {
                branch: branch.to_string(),
                path: holder.path.clone(),
            });
        }
        if binding_at(&bindings, worktree).and_then(|b| b.branch.as_deref()) == Some(branch) {
            debug!("branch already checked out here");
            return Ok(MutationReport::unchanged(format!(
                "check out {branch} in {}",
                worktree.display()
            )));
        }
        Ok(git.checkout_branch(worktree, branch)?)
    }

    /// Create a worktree at `path` for `branch`, refusing if any worktree holds it.
    #[instrument(skip_all, fields(branch, path = %path.display()))]
    pub fn add_worktree(
        &self,
        repo: &Path,
        path: &Path,
        branch: &str,
    ) -> Result<MutationReport, BranchError> {
        let git = self.git();
        let bindings = git.list_worktrees(repo)?;
        if let Some(holder) = find_binding(&bindings, branch) {
            if holder.path == path {
                return Ok(MutationReport::unchanged(format!(
                    "add worktree {} for {branch}",
                    path.display()
                )));
            }
            return Err(BranchError::Conflict {
                branch: branch.to_string(),
                path: holder.path.clone(),
            });
        }
        Ok(git.add_worktree(repo, path, branch)?)
    }

    /// Delete `branch` and, under Graphite, its stack metadata.
    ///
    /// Already-absent pieces are skipped, so a retry after a partial failure
    /// finishes the job.
    pub fn delete(
        &self,
        repo: &Path,
        branch: &str,
        force: bool,
    ) -> Result<MutationReport, BranchError> {
        self.delete_released(repo, branch, force, None)
    }

    /// [`delete`](Self::delete), except that a binding at `released` does not
    /// count as holding the branch.
    ///
    /// A previewed release or removal of that worktree leaves the branch
    /// checked out there; the real run would have freed it.
    #[instrument(skip_all, fields(backend = %self.backend(), branch, force))]
    pub fn delete_released(
        &self,
        repo: &Path,
        branch: &str,
        force: bool,
        released: Option<&Path>,
    ) -> Result<MutationReport, BranchError> {
        let ref_report = delete_ref(self.git().as_ref(), repo, branch, force, released)?;
        let BranchManager::Graphite(inner) = self else {
            return Ok(ref_report);
        };
        if !inner.graphite.is_tracked(&inner.git_dir, branch)? {
            return Ok(ref_report);
        }
        match inner.graphite.untrack_branch(repo, branch) {
            Ok(_) => Ok(ref_report),
            Err(source) if ref_report.status != MutationStatus::Unchanged => {
                warn!(error = %source, "ref deleted but metadata cleanup failed");
                Err(BranchError::MetadataCleanup {
                    branch: branch.to_string(),
                    source,
                })
            }
            Err(source) => Err(source.into()),
        }
    }

    /// Move `branch` under `parent` in the stack. No-op for plain git.
    pub fn set_parent(
        &self,
        worktree: &Path,
        branch: &str,
        parent: &str,
    ) -> Result<MutationReport, BranchError> {
        match self {
            BranchManager::Graphite(inner) => {
                Ok(inner.graphite.track_branch(worktree, branch, parent)?)
            }
            BranchManager::Git(_) => Ok(MutationReport::unchanged(format!(
                "set parent of {branch} to {parent}"
            ))),
        }
    }

    /// Stack children of `branch`. Always empty for plain git.
    pub fn children(&self, branch: &str) -> Result<Vec<String>, BranchError> {
        match self {
            BranchManager::Graphite(inner) => {
                Ok(inner.graphite.branch_children(&inner.git_dir, branch)?)
            }
            BranchManager::Git(_) => Ok(Vec::new()),
        }
    }

    pub fn parent(&self, branch: &str) -> Result<Option<String>, BranchError> {
        match self {
            BranchManager::Graphite(inner) => {
                Ok(inner.graphite.branch_parent(&inner.git_dir, branch)?)
            }
            BranchManager::Git(_) => Ok(None),
        }
    }

    /// Ref and stack state of `branch`; `None` when neither exists.
    pub fn record(&self, repo: &Path, branch: &str) -> Result<Option<BranchRecord>, BranchError> {
        let has_ref = self.git().branch_exists(repo, branch)?;
        let tracked = match self {
            BranchManager::Graphite(inner) => inner.graphite.is_tracked(&inner.git_dir, branch)?,
            BranchManager::Git(_) => false,
        };
        if !has_ref && !tracked {
            return Ok(None);
        }
        Ok(Some(BranchRecord {
            name: branch.to_string(),
            parent: self.parent(branch)?,
            has_ref,
            tracked,
        }))
    }

    /// Publish `branch`: `gt submit` under Graphite, `git push` otherwise.
    pub fn submit(&self, worktree: &Path, branch: &str) -> Result<MutationReport, BranchError> {
        match self {
            BranchManager::Graphite(inner) => Ok(inner.graphite.submit_branch(worktree, branch)?),
            BranchManager::Git(inner) => Ok(inner.git.push_branch(worktree, "origin", branch)?),
        }
    }
}

impl GraphiteBranches {
    /// Create the ref, check it out so `gt track` sees it, then restore.
    fn create(
        &self,
        worktree: &Path,
        branch: &str,
        base: &str,
    ) -> Result<MutationReport, BranchError> {
        let original = self
            .git
            .current_branch(worktree)?
            .ok_or_else(|| BranchError::DetachedHead(worktree.to_path_buf()))?;

        let created = self.git.create_branch(worktree, branch, base)?;
        self.git.checkout_branch(worktree, branch)?;
        let tracked = self.graphite.track_branch(worktree, branch, base);
        // Restore even when tracking failed.
        self.git.checkout_branch(worktree, &original)?;
        tracked?;

        Ok(MutationReport {
            status: created.status,
            action: format!("{} and track it", created.action),
        })
    }
}

/// Delete the local ref, treating an absent ref as done.
fn delete_ref(
    git: &dyn Git,
    repo: &Path,
    branch: &str,
    force: bool,
    released: Option<&Path>,
) -> Result<MutationReport, BranchError> {
    if !git.branch_exists(repo, branch)? {
        debug!(branch, "ref already absent");
        return Ok(MutationReport::unchanged(format!("delete branch {branch}")));
    }
    let bindings = git.list_worktrees(repo)?;
    if let Some(holder) = find_binding(&bindings, branch)
        && Some(holder.path.as_path()) != released
    {
        return Err(BranchError::Conflict {
            branch: branch.to_string(),
            path: holder.path.clone(),
        });
    }
    Ok(git.delete_branch(repo, branch, force)?)
}
