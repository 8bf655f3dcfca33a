//! Live gateways against a real repository in a tempdir.

use std::path::Path;
use std::process::Command as Process;

use erk::branch::{run_create, run_delete};
use erk::branch_manager::BranchError;
use erk::core::worktrees::find_binding;
use erk::exit_codes;
use erk::io::confirm::AssumeYes;
use erk::io::git::GitError;
use erk::test_support::TestRepo;

fn erk(dir: &Path, args: &[&str]) -> std::process::Output {
    Process::new(env!("CARGO_BIN_EXE_erk"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run erk")
}

#[test]
fn context_resolves_root_and_trunk() {
    let repo = TestRepo::new().expect("repo");
    let ctx = repo.live_context().expect("context");

    assert_eq!(ctx.root_worktree, repo.path());
    assert_eq!(ctx.worktree, repo.path());
    assert_eq!(ctx.trunk().expect("trunk"), "main");
}

#[test]
fn create_and_delete_through_pipelines() {
    let repo = TestRepo::new().expect("repo");
    let ctx = repo.live_context().expect("context");

    let reports = run_create(&ctx, &AssumeYes, "feature-x", None, false).expect("create");
    assert!(!reports.is_empty());
    assert_eq!(repo.git(&["branch", "--list", "feature-x"]).expect("list"), "feature-x");

    run_delete(&ctx, &AssumeYes, "feature-x", true).expect("delete");
    assert_eq!(repo.git(&["branch", "--list", "feature-x"]).expect("list"), "");
}

#[test]
fn branch_held_by_another_worktree_is_a_conflict() {
    let repo = TestRepo::new().expect("repo");
    let ctx = repo.live_context().expect("context");
    let parent = repo.path().parent().expect("tempdir parent");
    let feature = parent.join("feature-x");

    ctx.branches
        .create(repo.path(), "feature-x", "main")
        .expect("create");
    ctx.branches
        .add_worktree(repo.path(), &feature, "feature-x")
        .expect("add worktree");

    let bindings = ctx.git.list_worktrees(repo.path()).expect("list");
    let holder = find_binding(&bindings, "feature-x").expect("binding");
    assert_eq!(holder.path, feature);

    // The manager refuses before asking git.
    let err = ctx
        .branches
        .checkout(repo.path(), "feature-x")
        .unwrap_err();
    assert!(matches!(err, BranchError::Conflict { ref path, .. } if *path == feature));

    // Git's own refusal is classified the same way.
    let err = ctx.git.checkout_branch(repo.path(), "feature-x").unwrap_err();
    assert!(
        matches!(err, GitError::BranchCheckedOut { ref path, .. } if *path == feature),
        "{err:?}"
    );
}

#[test]
fn dirty_worktree_is_reported() {
    let repo = TestRepo::new().expect("repo");
    let ctx = repo.live_context().expect("context");
    assert!(ctx.git.is_worktree_clean(repo.path()).expect("clean"));

    std::fs::write(repo.path().join("notes.txt"), "wip\n").expect("write");
    assert!(!ctx.git.is_worktree_clean(repo.path()).expect("dirty"));
}

#[test]
fn init_writes_config_once() {
    let repo = TestRepo::new().expect("repo");

    let first = erk(repo.path(), &["init"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let config = repo.path().join(".erk/config.toml");
    assert!(config.is_file());
    assert!(String::from_utf8_lossy(&first.stdout).contains("config.toml"));

    let second = erk(repo.path(), &["init"]);
    assert_eq!(second.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&second.stderr).contains("already exists"));
}

#[test]
fn dry_run_init_writes_nothing() {
    let repo = TestRepo::new().expect("repo");

    let output = erk(repo.path(), &["--dry-run", "init"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(!repo.path().join(".erk").exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("[dry-run] would write"));
}

/// A re-sourced script may start erk from a worktree that is already gone.
#[test]
fn repo_flag_runs_from_a_removed_directory() {
    let repo = TestRepo::new().expect("repo");
    let temp = tempfile::tempdir().expect("tempdir");
    let removed = temp.path().join("feature-x");
    std::fs::create_dir_all(&removed).expect("mkdir");

    let output = Process::new("sh")
        .arg("-c")
        .arg(r#"cd "$1" && rm -rf "$1" && exec "$2" --repo "$3" init"#)
        .arg("sh")
        .arg(&removed)
        .arg(env!("CARGO_BIN_EXE_erk"))
        .arg(repo.path())
        .output()
        .expect("run sh");

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(repo.path().join(".erk/config.toml").is_file());
}
