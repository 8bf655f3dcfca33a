//! `gt` subprocess implementation of [`Graphite`].
//!
//! Queries read Graphite's persisted branch cache directly instead of
//! spawning `gt`, which is slow and may prompt.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{Graphite, GraphiteError, submit_action, track_action, untrack_action};
use crate::core::types::MutationReport;
use crate::io::process::ProcessRunner;

const REPO_CONFIG_FILE: &str = ".graphite_repo_config";
const CACHE_FILE: &str = ".graphite_cache_persist";

#[derive(Debug, Deserialize)]
struct CacheFile {
    #[serde(default)]
    branches: Vec<(String, CachedBranch)>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedBranch {
    parent_branch_name: Option<String>,
    #[serde(default)]
    children: Vec<String>,
}

/// Parent and children per tracked branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackCache {
    pub parents: BTreeMap<String, Option<String>>,
    pub children: BTreeMap<String, Vec<String>>,
}

/// Parse the contents of `.graphite_cache_persist`.
pub fn parse_cache(raw: &str) -> Result<StackCache, GraphiteError> {
    let file: CacheFile = serde_json::from_str(raw)
        .map_err(|e| GraphiteError::Infrastructure(format!("parse graphite cache: {e}")))?;
    let mut cache = StackCache::default();
    for (name, entry) in file.branches {
        let mut children = entry.children;
        children.sort();
        cache.children.insert(name.clone(), children);
        cache.parents.insert(name, entry.parent_branch_name);
    }
    Ok(cache)
}

#[derive(Debug, Clone)]
pub struct LiveGraphite {
    runner: ProcessRunner,
}

impl LiveGraphite {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }

    fn load_cache(&self, git_dir: &Path) -> Result<StackCache, GraphiteError> {
        let path = git_dir.join(CACHE_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "graphite cache missing");
            return Ok(StackCache::default());
        }
        let raw = fs::read_to_string(&path).map_err(|e| {
            GraphiteError::Infrastructure(format!("read {}: {e}", path.display()))
        })?;
        parse_cache(&raw)
    }

    fn run_checked(&self, worktree: &Path, args: &[&str]) -> Result<(), GraphiteError> {
        if !self.is_available() {
            return Err(GraphiteError::NotInstalled);
        }
        let output = self
            .runner
            .run("gt", args, worktree)
            .map_err(|e| GraphiteError::Infrastructure(format!("{e:#}")))?;
        if output.timed_out {
            return Err(GraphiteError::Infrastructure(format!(
                "gt {} timed out",
                args.join(" ")
            )));
        }
        if !output.success() {
            let command = args.first().copied().unwrap_or_default().to_string();
            let stderr = output.stderr_text();
            warn!(command = %command, stderr = %stderr, "gt command failed");
            return Err(GraphiteError::CommandFailed { command, stderr });
        }
        Ok(())
    }
}

impl Graphite for LiveGraphite {
    fn is_available(&self) -> bool {
        which::which("gt").is_ok()
    }

    fn is_initialized(&self, git_dir: &Path) -> Result<bool, GraphiteError> {
        Ok(git_dir.join(REPO_CONFIG_FILE).exists())
    }

    fn branch_parent(&self, git_dir: &Path, branch: &str) -> Result<Option<String>, GraphiteError> {
        Ok(self.load_cache(git_dir)?.parents.remove(branch).flatten())
    }

    fn branch_children(&self, git_dir: &Path, branch: &str) -> Result<Vec<String>, GraphiteError> {
        Ok(self
            .load_cache(git_dir)?
            .children
            .remove(branch)
            .unwrap_or_default())
    }

    fn is_tracked(&self, git_dir: &Path, branch: &str) -> Result<bool, GraphiteError> {
        Ok(self.load_cache(git_dir)?.parents.contains_key(branch))
    }

    #[instrument(skip_all, fields(branch, parent))]
    fn track_branch(&self, worktree: &Path, branch: &str, parent: &str) -> Result<MutationReport, GraphiteError> {
        self.run_checked(
            worktree,
            &["track", branch, "--parent", parent, "--no-interactive"],
        )?;
        Ok(MutationReport::applied(track_action(branch, parent)))
    }

    #[instrument(skip_all, fields(branch))]
    fn untrack_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError> {
        self.run_checked(worktree, &["untrack", branch, "--force", "--no-interactive"])?;
        Ok(MutationReport::applied(untrack_action(branch)))
    }

    #[instrument(skip_all, fields(branch))]
    fn submit_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GraphiteError> {
        // gt submits the stack of whatever is checked out in `worktree`.
        self.run_checked(worktree, &["submit", "--no-interactive"])?;
        Ok(MutationReport::applied(submit_action(branch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CACHE: &str = r#"{
        "sha": "abc",
        "branches": [
            ["main", {"validationResult": "TRUNK", "children": ["feature-b", "feature-a"]}],
            ["feature-a", {"parentBranchName": "main", "children": []}],
            ["feature-b", {"parentBranchName": "main", "children": ["feature-c"]}],
            ["feature-c", {"parentBranchName": "feature-b"}]
        ]
    }"#;

    #[test]
    fn parses_parents_and_sorted_children() {
        let cache = parse_cache(CACHE).expect("parse");
        assert_eq!(cache.parents["feature-c"].as_deref(), Some("feature-b"));
        assert_eq!(cache.parents["main"], None);
        assert_eq!(
            cache.children["main"],
            vec!["feature-a".to_string(), "feature-b".to_string()]
        );
        assert!(cache.children["feature-c"].is_empty());
    }

    #[test]
    fn malformed_cache_is_infrastructure_error() {
        let err = parse_cache("{not json").unwrap_err();
        assert!(matches!(err, GraphiteError::Infrastructure(_)));
    }

    #[test]
    fn missing_files_mean_uninitialized_and_untracked() {
        let temp = tempfile::tempdir().expect("tempdir");
        let gt = LiveGraphite::new(ProcessRunner::new(std::time::Duration::from_secs(5)));
        assert!(!gt.is_initialized(temp.path()).expect("initialized"));
        assert!(!gt.is_tracked(temp.path(), "main").expect("tracked"));

        fs::write(temp.path().join(REPO_CONFIG_FILE), "{}").expect("write config");
        fs::write(temp.path().join(CACHE_FILE), CACHE).expect("write cache");
        assert!(gt.is_initialized(temp.path()).expect("initialized"));
        assert_eq!(
            gt.branch_parent(temp.path(), "feature-a").expect("parent").as_deref(),
            Some("main")
        );
    }
}
