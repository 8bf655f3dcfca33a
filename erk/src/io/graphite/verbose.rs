use std::fmt::Debug;
use std::path::Path;
use std::rc::Rc;

use super::{Graphite, GraphiteError};
use crate::core::types::MutationReport;
use crate::io::sink::{TraceSink, trace_call};

/// Tracing decorator for [`Graphite`].
pub struct VerboseGraphite {
    inner: Rc<dyn Graphite>,
    sink: Rc<dyn TraceSink>,
}

impl VerboseGraphite {
    pub fn new(inner: Rc<dyn Graphite>, sink: Rc<dyn TraceSink>) -> Self {
        Self { inner, sink }
    }

    fn traced<T: Debug>(&self, call: String, result: Result<T, GraphiteError>) -> Result<T, GraphiteError> {
        trace_call(self.sink.as_ref(), &call, &result);
        result
    }
}

impl Graphite for VerboseGraphite {
    fn is_available(&self) -> bool {
        let available = self.inner.is_available();
        self.sink
            .emit(&format!("[trace] gt.is_available() -> {available}"));
        available
    }

    fn is_initialized(&self, git_dir: &Path) -> Result<bool, GraphiteError> {
        self.traced(
            "gt.is_initialized()".to_string(),
            self.inner.is_initialized(git_dir),
        )
    }

    fn branch_parent(&self, git_dir: &Path, branch: &str) -> Result<Option<String>, GraphiteError> {
        self.traced(
            format!("gt.branch_parent({branch})"),
            self.inner.branch_parent(git_dir, branch),
        )
    }

    fn branch_children(&self, git_dir: &Path, branch: &str) -> Result<Vec<String>, GraphiteError> {
        self.traced(
            format!("gt.branch_children({branch})"),
            self.inner.branch_children(git_dir, branch),
        )
    }

    fn is_tracked(&self, git_dir: &Path, branch: &str) -> Result<bool, GraphiteError> {
        self.traced(
            format!("gt.is_tracked({branch})"),
            self.inner.is_tracked(git_dir, branch),
        )
    }

    fn track_branch(&self, worktree: &Path, branch: &str, parent: &str) -> Result<MutationReport, GraphiteError> {
        self.traced(
            format!("gt.track_branch({branch}, {parent})"),
            self.inner.track_branch(worktree, branch, parent),
        )
    }

    fn untrack_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError> {
        self.traced(
            format!("gt.untrack_branch({branch})"),
            self.inner.untrack_branch(worktree, branch),
        )
    }

    fn submit_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError> {
        self.traced(
            format!("gt.submit_branch({branch})"),
            self.inner.submit_branch(worktree, branch),
        )
    }
}
