//! In-memory [`Graphite`] for tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use super::{Graphite, GraphiteError, submit_action, track_action, untrack_action};
use crate::core::types::MutationReport;

#[derive(Debug, Default)]
struct Logs {
    tracked: Vec<(String, String)>,
    untracked: Vec<String>,
    submitted: Vec<String>,
}

/// Stack metadata model: tracked branch name to parent.
#[derive(Debug)]
pub struct SimulatedGraphite {
    available: bool,
    initialized: bool,
    parents: RefCell<BTreeMap<String, Option<String>>>,
    logs: RefCell<Logs>,
    failures: RefCell<BTreeMap<&'static str, GraphiteError>>,
}

impl SimulatedGraphite {
    /// Installed and initialized, with `main` tracked as trunk.
    pub fn new() -> Self {
        Self {
            available: true,
            initialized: true,
            parents: RefCell::new(BTreeMap::from([("main".to_string(), None)])),
            logs: RefCell::new(Logs::default()),
            failures: RefCell::new(BTreeMap::new()),
        }
    }

    /// `gt` missing from PATH.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            initialized: false,
            ..Self::new()
        }
    }

    pub fn uninitialized(mut self) -> Self {
        self.initialized = false;
        self
    }

    pub fn with_tracked(self, branch: &str, parent: &str) -> Self {
        self.parents
            .borrow_mut()
            .insert(branch.to_string(), Some(parent.to_string()));
        self
    }

    /// Make the next call of mutation `operation` fail with `err`.
    pub fn fail_next(&self, operation: &'static str, err: GraphiteError) {
        self.failures.borrow_mut().insert(operation, err);
    }

    /// Snapshot of the parent map.
    pub fn parents(&self) -> BTreeMap<String, Option<String>> {
        self.parents.borrow().clone()
    }

    pub fn tracked_calls(&self) -> Vec<(String, String)> {
        self.logs.borrow().tracked.clone()
    }

    pub fn untracked_calls(&self) -> Vec<String> {
        self.logs.borrow().untracked.clone()
    }

    pub fn submitted(&self) -> Vec<String> {
        self.logs.borrow().submitted.clone()
    }

    pub fn mutation_count(&self) -> usize {
        let logs = self.logs.borrow();
        logs.tracked.len() + logs.untracked.len() + logs.submitted.len()
    }

    fn injected(&self, operation: &'static str) -> Result<(), GraphiteError> {
        if !self.available {
            return Err(GraphiteError::NotInstalled);
        }
        match self.failures.borrow_mut().remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for SimulatedGraphite {
    fn default() -> Self {
        Self::new()
    }
}

impl Graphite for SimulatedGraphite {
    fn is_available(&self) -> bool {
        self.available
    }

    fn is_initialized(&self, _git_dir: &Path) -> Result<bool, GraphiteError> {
        Ok(self.initialized)
    }

    fn branch_parent(&self, _git_dir: &Path, branch: &str) -> Result<Option<String>, GraphiteError> {
        Ok(self.parents.borrow().get(branch).cloned().flatten())
    }

    fn branch_children(&self, _git_dir: &Path, branch: &str) -> Result<Vec<String>, GraphiteError> {
        Ok(self
            .parents
            .borrow()
            .iter()
            .filter(|(_, parent)| parent.as_deref() == Some(branch))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn is_tracked(&self, _git_dir: &Path, branch: &str) -> Result<bool, GraphiteError> {
        Ok(self.parents.borrow().contains_key(branch))
    }

    fn track_branch(&self, _worktree: &Path, branch: &str, parent: &str) -> Result<MutationReport, GraphiteError> {
        self.injected("track_branch")?;
        self.parents
            .borrow_mut()
            .insert(branch.to_string(), Some(parent.to_string()));
        self.logs
            .borrow_mut()
            .tracked
            .push((branch.to_string(), parent.to_string()));
        Ok(MutationReport::applied(track_action(branch, parent)))
    }

    fn untrack_branch(&self, _worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError> {
        self.injected("untrack_branch")?;
        if self.parents.borrow_mut().remove(branch).is_none() {
            return Err(GraphiteError::NotTracked(branch.to_string()));
        }
        self.logs.borrow_mut().untracked.push(branch.to_string());
        Ok(MutationReport::applied(untrack_action(branch)))
    }

    fn submit_branch(&self, _worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError> {
        self.injected("submit_branch")?;
        if !self.parents.borrow().contains_key(branch) {
            return Err(GraphiteError::NotTracked(branch.to_string()));
        }
        self.logs.borrow_mut().submitted.push(branch.to_string());
        Ok(MutationReport::applied(submit_action(branch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_follow_parent_links() {
        let gt = SimulatedGraphite::new()
            .with_tracked("a", "main")
            .with_tracked("b", "main")
            .with_tracked("c", "a");
        let dir = Path::new("/repo/.git");
        assert_eq!(
            gt.branch_children(dir, "main").expect("children"),
            vec!["a".to_string(), "b".to_string()]
        );
        gt.track_branch(Path::new("/repo"), "c", "main").expect("retrack");
        assert_eq!(gt.branch_children(dir, "a").expect("children"), Vec::<String>::new());
    }

    #[test]
    fn untracking_unknown_branch_fails() {
        let gt = SimulatedGraphite::new();
        let err = gt.untrack_branch(Path::new("/repo"), "ghost").unwrap_err();
        assert_eq!(err, GraphiteError::NotTracked("ghost".to_string()));
        assert_eq!(gt.mutation_count(), 0);
    }

    #[test]
    fn unavailable_tool_rejects_mutations() {
        let gt = SimulatedGraphite::unavailable();
        assert!(!gt.is_available());
        let err = gt.track_branch(Path::new("/repo"), "a", "main").unwrap_err();
        assert_eq!(err, GraphiteError::NotInstalled);
    }
}
