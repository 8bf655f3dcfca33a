use std::path::Path;
use std::rc::Rc;

use super::{Graphite, GraphiteError, submit_action, track_action, untrack_action};
use crate::core::types::MutationReport;
use crate::io::sink::{TraceSink, preview_notice};

/// Dry-run decorator for [`Graphite`].
pub struct PreviewGraphite {
    inner: Rc<dyn Graphite>,
    sink: Option<Rc<dyn TraceSink>>,
}

impl PreviewGraphite {
    pub fn new(inner: Rc<dyn Graphite>, sink: Option<Rc<dyn TraceSink>>) -> Self {
        Self { inner, sink }
    }

    fn preview(&self, action: String) -> Result<MutationReport, GraphiteError> {
        preview_notice(self.sink.as_ref(), &action);
        Ok(MutationReport::previewed(action))
    }
}

impl Graphite for PreviewGraphite {
    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn is_initialized(&self, git_dir: &Path) -> Result<bool, GraphiteError> {
        self.inner.is_initialized(git_dir)
    }

    fn branch_parent(&self, git_dir: &Path, branch: &str) -> Result<Option<String>, GraphiteError> {
        self.inner.branch_parent(git_dir, branch)
    }

    fn branch_children(&self, git_dir: &Path, branch: &str) -> Result<Vec<String>, GraphiteError> {
        self.inner.branch_children(git_dir, branch)
    }

    fn is_tracked(&self, git_dir: &Path, branch: &str) -> Result<bool, GraphiteError> {
        self.inner.is_tracked(git_dir, branch)
    }

    fn track_branch(&self, _worktree: &Path, branch: &str, parent: &str) -> Result<MutationReport, GraphiteError> {
        self.preview(track_action(branch, parent))
    }

    fn untrack_branch(&self, _worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError> {
        self.preview(untrack_action(branch))
    }

    fn submit_branch(&self, _worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError> {
        self.preview(submit_action(branch))
    }
}
