//! `git` subprocess implementation of [`Git`].

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use super::{
    Git, GitError, add_worktree_action, checkout_action, create_branch_action,
    delete_branch_action, pull_action, push_action, remove_worktree_action,
};
use crate::core::types::{MutationReport, WorktreeBinding};
use crate::io::process::{CommandOutput, ProcessRunner};

/// Matches git's "already checked out" / "already used by worktree" refusals.
static CHECKED_OUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:already checked out at|already used by worktree at) '([^']+)'")
        .expect("valid checked-out regex")
});

/// Runs `git` in whichever directory each call names.
#[derive(Debug, Clone)]
pub struct LiveGit {
    runner: ProcessRunner,
}

impl LiveGit {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }

    fn run(&self, cwd: &Path, args: &[&str]) -> Result<CommandOutput, GitError> {
        let output = self
            .runner
            .run("git", args, cwd)
            .map_err(|e| GitError::Infrastructure(format!("{e:#}")))?;
        if output.timed_out {
            return Err(GitError::Infrastructure(format!(
                "git {} timed out",
                args.join(" ")
            )));
        }
        Ok(output)
    }

    fn run_checked(&self, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(cwd, args)?;
        if !output.success() {
            return Err(classify_failure(args, &output.stderr_text()));
        }
        Ok(output.stdout_text())
    }
}

impl Git for LiveGit {
    fn repo_root(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError> {
        let out = self.run(cwd, &["rev-parse", "--show-toplevel"])?;
        if !out.success() {
            debug!(cwd = %cwd.display(), "not inside a git worktree");
            return Ok(None);
        }
        Ok(Some(PathBuf::from(out.stdout_text().trim())))
    }

    fn common_dir(&self, cwd: &Path) -> Result<Option<PathBuf>, GitError> {
        let out = self.run(cwd, &["rev-parse", "--git-common-dir"])?;
        if !out.success() {
            return Ok(None);
        }
        let raw = PathBuf::from(out.stdout_text().trim());
        // Relative output is relative to the directory git ran in.
        Ok(Some(if raw.is_absolute() { raw } else { cwd.join(raw) }))
    }

    fn current_branch(&self, cwd: &Path) -> Result<Option<String>, GitError> {
        let out = self.run(cwd, &["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if !out.success() {
            debug!(cwd = %cwd.display(), "HEAD is detached");
            return Ok(None);
        }
        Ok(Some(out.stdout_text().trim().to_string()))
    }

    fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, GitError> {
        let reference = format!("refs/heads/{branch}");
        let out = self.run(repo, &["show-ref", "--verify", "--quiet", &reference])?;
        Ok(out.success())
    }

    fn list_local_branches(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        let out = self.run_checked(
            repo,
            &["for-each-ref", "--format=%(refname:short)", "refs/heads/"],
        )?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn list_worktrees(&self, repo: &Path) -> Result<Vec<WorktreeBinding>, GitError> {
        let out = self.run_checked(repo, &["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_list(&out))
    }

    fn is_worktree_clean(&self, worktree: &Path) -> Result<bool, GitError> {
        let out = self.run_checked(worktree, &["status", "--porcelain=v1"])?;
        let dirty = out.lines().filter(|l| !l.trim().is_empty()).count();
        if dirty > 0 {
            debug!(worktree = %worktree.display(), dirty, "worktree has changes");
        }
        Ok(dirty == 0)
    }

    fn trunk_branch(&self, repo: &Path) -> Result<Option<String>, GitError> {
        let out = self.run(
            repo,
            &["symbolic-ref", "--quiet", "--short", "refs/remotes/origin/HEAD"],
        )?;
        if out.success() {
            let name = out.stdout_text();
            let name = name.trim();
            let name = name.strip_prefix("origin/").unwrap_or(name);
            if !name.is_empty() {
                return Ok(Some(name.to_string()));
            }
        }
        for candidate in ["main", "master"] {
            if self.branch_exists(repo, candidate)? {
                return Ok(Some(candidate.to_string()));
            }
        }
        warn!(repo = %repo.display(), "could not detect trunk branch");
        Ok(None)
    }

    #[instrument(skip_all, fields(branch, start_point))]
    fn create_branch(
        &self,
        repo: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<MutationReport, GitError> {
        if self.branch_exists(repo, branch)? {
            return Err(GitError::BranchExists(branch.to_string()));
        }
        self.run_checked(repo, &["branch", branch, start_point])?;
        debug!("created branch");
        Ok(MutationReport::applied(create_branch_action(branch, start_point)))
    }

    #[instrument(skip_all, fields(branch, force))]
    fn delete_branch(
        &self,
        repo: &Path,
        branch: &str,
        force: bool,
    ) -> Result<MutationReport, GitError> {
        if !self.branch_exists(repo, branch)? {
            return Err(GitError::BranchNotFound(branch.to_string()));
        }
        let flag = if force { "-D" } else { "-d" };
        self.run_checked(repo, &["branch", flag, branch])?;
        debug!("deleted branch");
        Ok(MutationReport::applied(delete_branch_action(branch, force)))
    }

    #[instrument(skip_all, fields(branch, worktree = %worktree.display()))]
    fn checkout_branch(&self, worktree: &Path, branch: &str) -> Result<MutationReport, GitError> {
        if !self.branch_exists(worktree, branch)? {
            return Err(GitError::BranchNotFound(branch.to_string()));
        }
        self.run_checked(worktree, &["checkout", branch])?;
        debug!("checked out branch");
        Ok(MutationReport::applied(checkout_action(worktree, branch)))
    }

    #[instrument(skip_all, fields(branch, path = %path.display()))]
    fn add_worktree(&self, repo: &Path, path: &Path, branch: &str) -> Result<MutationReport, GitError> {
        if path.exists() {
            return Err(GitError::WorktreePathExists(path.to_path_buf()));
        }
        if !self.branch_exists(repo, branch)? {
            return Err(GitError::BranchNotFound(branch.to_string()));
        }
        let path_arg = path.to_string_lossy();
        self.run_checked(repo, &["worktree", "add", &path_arg, branch])?;
        debug!("added worktree");
        Ok(MutationReport::applied(add_worktree_action(path, branch)))
    }

    #[instrument(skip_all, fields(path = %path.display(), force))]
    fn remove_worktree(&self, repo: &Path, path: &Path, force: bool) -> Result<MutationReport, GitError> {
        let known = self
            .list_worktrees(repo)?
            .into_iter()
            .any(|b| b.path == path);
        if !known {
            return Err(GitError::WorktreeNotFound(path.to_path_buf()));
        }
        let path_arg = path.to_string_lossy();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_arg);
        self.run_checked(repo, &args)?;
        debug!("removed worktree");
        Ok(MutationReport::applied(remove_worktree_action(path)))
    }

    #[instrument(skip_all, fields(remote, branch))]
    fn pull(&self, worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError> {
        self.run_checked(worktree, &["pull", "--ff-only", remote, branch])?;
        Ok(MutationReport::applied(pull_action(worktree, remote, branch)))
    }

    #[instrument(skip_all, fields(remote, branch))]
    fn push_branch(&self, worktree: &Path, remote: &str, branch: &str) -> Result<MutationReport, GitError> {
        self.run_checked(worktree, &["push", "--set-upstream", remote, branch])?;
        Ok(MutationReport::applied(push_action(remote, branch)))
    }
}

/// Turn a failed git invocation into the most specific [`GitError`].
fn classify_failure(args: &[&str], stderr: &str) -> GitError {
    if let Some(caps) = CHECKED_OUT_RE.captures(stderr) {
        let branch = args.last().copied().unwrap_or_default().to_string();
        return GitError::BranchCheckedOut {
            branch,
            path: PathBuf::from(&caps[1]),
        };
    }
    let command = args.first().copied().unwrap_or_default().to_string();
    warn!(command = %command, stderr, "git command failed");
    GitError::CommandFailed {
        command,
        stderr: stderr.to_string(),
    }
}

/// Parse `git worktree list --porcelain` output. The first entry is the root.
pub fn parse_worktree_list(output: &str) -> Vec<WorktreeBinding> {
    let mut bindings = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut branch: Option<String> = None;

    let mut flush = |path: &mut Option<PathBuf>, branch: &mut Option<String>| {
        if let Some(p) = path.take() {
            let is_root = bindings.is_empty();
            bindings.push(WorktreeBinding {
                path: p,
                branch: branch.take(),
                is_root,
            });
        }
        *branch = None;
    };

    for line in output.lines() {
        if line.trim().is_empty() {
            flush(&mut path, &mut branch);
            continue;
        }
        if let Some(rest) = line.strip_prefix("worktree ") {
            flush(&mut path, &mut branch);
            path = Some(PathBuf::from(rest));
        } else if let Some(rest) = line.strip_prefix("branch ") {
            let name = rest.strip_prefix("refs/heads/").unwrap_or(rest);
            branch = Some(name.to_string());
        }
    }
    flush(&mut path, &mut branch);
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_porcelain_worktrees() {
        let raw = "worktree /code/app\nHEAD 1111\nbranch refs/heads/main\n\n\
                   worktree /code/app-worktrees/feature\nHEAD 2222\nbranch refs/heads/feature/x\n\n\
                   worktree /code/app-worktrees/erk-slot-01\nHEAD 3333\ndetached\n";
        let bindings = parse_worktree_list(raw);
        assert_eq!(bindings.len(), 3);
        assert!(bindings[0].is_root);
        assert_eq!(bindings[0].branch.as_deref(), Some("main"));
        assert_eq!(bindings[1].branch.as_deref(), Some("feature/x"));
        assert!(!bindings[1].is_root);
        assert_eq!(
            bindings[2].path,
            PathBuf::from("/code/app-worktrees/erk-slot-01")
        );
        assert_eq!(bindings[2].branch, None);
    }

    #[test]
    fn parses_empty_output() {
        assert!(parse_worktree_list("").is_empty());
    }

    #[test]
    fn checked_out_refusal_names_the_holding_worktree() {
        let err = classify_failure(
            &["checkout", "feature"],
            "fatal: 'feature' is already checked out at '/code/other'",
        );
        assert_eq!(
            err,
            GitError::BranchCheckedOut {
                branch: "feature".to_string(),
                path: PathBuf::from("/code/other"),
            }
        );

        let err = classify_failure(
            &["checkout", "feature"],
            "fatal: 'feature' is already used by worktree at '/code/third'",
        );
        assert!(matches!(err, GitError::BranchCheckedOut { .. }));
    }

    #[test]
    fn other_failures_keep_stderr() {
        let err = classify_failure(&["pull", "origin", "main"], "fatal: not possible to fast-forward");
        assert_eq!(
            err,
            GitError::CommandFailed {
                command: "pull".to_string(),
                stderr: "fatal: not possible to fast-forward".to_string(),
            }
        );
    }
}
