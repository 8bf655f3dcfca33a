//! Shared value types for erk core logic.
//!
//! These types describe repository state as reported by gateways. They carry
//! no behavior that touches the outside world.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One checked-out copy of the repository.
///
/// Produced by the version-control gateway; the branch manager only queries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeBinding {
    pub path: PathBuf,
    /// Branch occupying the worktree, `None` when HEAD is detached.
    pub branch: Option<String>,
    /// True for the main checkout (the first entry git reports).
    pub is_root: bool,
}

/// A local branch with its stack linkage, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRecord {
    pub name: String,
    /// Parent branch; only meaningful under the graphite backend.
    pub parent: Option<String>,
    /// True when the ref exists locally.
    pub has_ref: bool,
    /// True when the stack overlay tracks the branch.
    pub tracked: bool,
}

/// Which backend manages branches for this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Graphite,
    Git,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Graphite => f.write_str("graphite"),
            Backend::Git => f.write_str("git"),
        }
    }
}

/// How a mutation call ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// The external system was changed.
    Applied,
    /// Nothing was changed; the report describes what would have happened.
    Previewed,
    /// The desired end state already held.
    Unchanged,
}

/// Successful result of a gateway mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub status: MutationStatus,
    /// Human-readable description, e.g. `delete branch feature-x`.
    pub action: String,
}

impl MutationReport {
    pub fn applied(action: impl Into<String>) -> Self {
        Self {
            status: MutationStatus::Applied,
            action: action.into(),
        }
    }

    pub fn previewed(action: impl Into<String>) -> Self {
        Self {
            status: MutationStatus::Previewed,
            action: action.into(),
        }
    }

    pub fn unchanged(action: impl Into<String>) -> Self {
        Self {
            status: MutationStatus::Unchanged,
            action: action.into(),
        }
    }

    pub fn is_previewed(&self) -> bool {
        self.status == MutationStatus::Previewed
    }
}

impl fmt::Display for MutationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            MutationStatus::Applied => write!(f, "{}", self.action),
            MutationStatus::Previewed => write!(f, "would {}", self.action),
            MutationStatus::Unchanged => write!(f, "{} (already done)", self.action),
        }
    }
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// Mergeability as reported by the hosting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mergeable {
    Mergeable,
    Conflicting,
    #[default]
    Unknown,
}

/// Change request on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: PrState,
    #[serde(rename = "headRefName")]
    pub head: String,
    #[serde(rename = "baseRefName")]
    pub base: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mergeable: Mergeable,
}

/// Merge strategy passed to the hosting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Squash,
    Merge,
    Rebase,
}

impl MergeMethod {
    pub fn as_flag(self) -> &'static str {
        match self {
            MergeMethod::Squash => "--squash",
            MergeMethod::Merge => "--merge",
            MergeMethod::Rebase => "--rebase",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_request_parses_gh_json() {
        let raw = r#"{"number":42,"title":"Add x","state":"OPEN","headRefName":"feature-x","baseRefName":"main","url":"https://example.test/pr/42","mergeable":"MERGEABLE"}"#;
        let pr: PullRequest = serde_json::from_str(raw).expect("parse");
        assert_eq!(pr.number, 42);
        assert_eq!(pr.head, "feature-x");
        assert_eq!(pr.base, "main");
        assert_eq!(pr.state, PrState::Open);
        assert_eq!(pr.mergeable, Mergeable::Mergeable);
    }

    #[test]
    fn report_display_marks_previews() {
        assert_eq!(
            MutationReport::previewed("delete branch x").to_string(),
            "would delete branch x"
        );
        assert_eq!(
            MutationReport::unchanged("merge PR #1").to_string(),
            "merge PR #1 (already done)"
        );
    }
}
