//! Queries over a worktree listing.
//!
//! Callers fetch a fresh listing from the version-control gateway before each
//! check; nothing here caches bindings.

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::types::WorktreeBinding;

/// Worktree currently holding `branch`, if any.
pub fn find_binding<'a>(
    bindings: &'a [WorktreeBinding],
    branch: &str,
) -> Option<&'a WorktreeBinding> {
    bindings
        .iter()
        .find(|binding| binding.branch.as_deref() == Some(branch))
}

/// Worktree other than `target` that already holds `branch`.
///
/// This is the single-checkout guard: a `Some` result means checking out
/// `branch` in `target` must be refused.
pub fn conflicting_binding<'a>(
    bindings: &'a [WorktreeBinding],
    branch: &str,
    target: &Path,
) -> Option<&'a WorktreeBinding> {
    bindings
        .iter()
        .find(|binding| binding.branch.as_deref() == Some(branch) && binding.path != target)
}

/// Worktree containing `path` (the deepest match wins, since worktrees may nest).
pub fn binding_containing<'a>(
    bindings: &'a [WorktreeBinding],
    path: &Path,
) -> Option<&'a WorktreeBinding> {
    bindings
        .iter()
        .filter(|binding| path.starts_with(&binding.path))
        .max_by_key(|binding| binding.path.components().count())
}

/// Worktree at exactly `path`.
pub fn binding_at<'a>(bindings: &'a [WorktreeBinding], path: &Path) -> Option<&'a WorktreeBinding> {
    bindings.iter().find(|binding| binding.path == path)
}

/// The main checkout.
pub fn root_binding(bindings: &[WorktreeBinding]) -> Option<&WorktreeBinding> {
    bindings
        .iter()
        .find(|binding| binding.is_root)
        .or_else(|| bindings.first())
}

/// Branches bound to more than one worktree, sorted by name.
///
/// Always empty for a healthy repository.
pub fn duplicate_bindings(bindings: &[WorktreeBinding]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for binding in bindings {
        if let Some(branch) = binding.branch.as_deref() {
            *counts.entry(branch).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(branch, _)| branch.to_string())
        .collect()
}
