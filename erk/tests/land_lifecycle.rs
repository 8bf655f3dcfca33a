//! End-to-end `erk land` runs over simulated gateways.
//!
//! Covers the full validate-then-execute flow, re-running a finished land,
//! partial failures, slot release, stack navigation, and deferral to a script.

use std::path::{Path, PathBuf};

use erk::context::ValidationContext;
use erk::core::errors::{ErrorKind, PipelineError};
use erk::core::types::{MergeMethod, MutationStatus};
use erk::deferred::CommandOutcome;
use erk::io::confirm::AssumeYes;
use erk::io::git::{GitError, SimulatedGit};
use erk::io::graphite::SimulatedGraphite;
use erk::land::{Cleanup, LandState, execution_pipeline, run_land, validation_pipeline};
use erk::test_support::SimulatedEnv;

fn land_args(target: &str) -> erk::cli::LandArgs {
    erk::cli::LandArgs {
        target: Some(target.to_string()),
        ..erk::cli::LandArgs::default()
    }
}

/// `feature-x` in its own worktree with PR #7, and `feature-y` stacked on it.
fn stacked_env() -> SimulatedEnv {
    SimulatedEnv::new()
        .with_feature_worktree("feature-x", "/wt/feature-x", 7)
        .with_branch("feature-y")
        .with_tracked("feature-y", "feature-x")
}

#[test]
fn land_from_root_merges_reparents_and_cleans_up() {
    let env = stacked_env();
    let ctx = env.context().expect("context");

    let outcome = run_land(&ctx, &AssumeYes, &land_args("7")).expect("land");

    let CommandOutcome::Completed {
        reports,
        destination,
    } = outcome
    else {
        panic!("landing from the root worktree runs in-process");
    };
    assert_eq!(destination, None);
    assert_eq!(env.github.merged(), vec![(7, MergeMethod::Squash)]);
    assert!(
        env.graphite
            .tracked_calls()
            .contains(&("feature-y".to_string(), "main".to_string()))
    );
    assert_eq!(env.git.removed_worktrees(), vec![PathBuf::from("/wt/feature-x")]);
    assert_eq!(env.git.deleted_branches(), vec!["feature-x".to_string()]);
    assert_eq!(env.graphite.untracked_calls(), vec!["feature-x".to_string()]);
    assert_eq!(
        env.git.pulls(),
        vec![(PathBuf::from("/repo"), "main".to_string())]
    );
    assert!(reports.iter().all(|r| r.status == MutationStatus::Applied));
}

#[test]
fn rerunning_a_finished_land_is_a_noop_success() {
    let env = stacked_env();
    let ctx = env.context().expect("context");
    let vctx = ValidationContext {
        erk: &ctx,
        confirm: &AssumeYes,
    };
    let validated = validation_pipeline()
        .run(&vctx, LandState::from_cli(&land_args("7")))
        .expect("validate");

    execution_pipeline()
        .run(&ctx, LandState::from_decision(validated.decision.clone()))
        .expect("first run");
    let again = execution_pipeline()
        .run(&ctx, LandState::from_decision(validated.decision))
        .expect("second run");

    assert_eq!(env.github.merged().len(), 1);
    assert_eq!(env.git.removed_worktrees().len(), 1);
    assert_eq!(env.git.deleted_branches().len(), 1);
    assert_eq!(env.graphite.untracked_calls().len(), 1);
    let unchanged: Vec<_> = again
        .derived
        .reports
        .iter()
        .filter(|r| r.status == MutationStatus::Unchanged)
        .map(|r| r.action.clone())
        .collect();
    assert!(unchanged.contains(&"merge PR #7".to_string()));
    assert!(unchanged.contains(&"delete branch feature-x".to_string()));
}

#[test]
fn failure_after_merge_is_partial_and_retry_finishes() {
    let env = stacked_env();
    env.git
        .fail_next("remove_worktree", GitError::Infrastructure("disk full".to_string()));
    let ctx = env.context().expect("context");

    let err = run_land(&ctx, &AssumeYes, &land_args("7")).unwrap_err();
    let err = err.downcast::<PipelineError>().expect("pipeline error");

    assert_eq!(err.step, "cleanup_worktree");
    assert_eq!(err.kind, ErrorKind::PartialMutation);
    assert_eq!(err.origin, ErrorKind::Infrastructure);
    assert!(err.completed.contains(&"merge"));
    assert_eq!(err.pending, vec!["delete_branch", "pull_trunk"]);
    assert_eq!(env.github.merged().len(), 1);
    assert!(env.git.deleted_branches().is_empty());

    // Validation accepts the merged PR; execution skips the merge.
    run_land(&ctx, &AssumeYes, &land_args("7")).expect("retry");
    assert_eq!(env.github.merged().len(), 1);
    assert_eq!(env.git.deleted_branches(), vec!["feature-x".to_string()]);
}

#[test]
fn slot_worktree_is_released_to_placeholder() {
    let env = SimulatedEnv::new().with_feature_worktree("feature-s", "/wt/erk-slot-03", 9);
    let ctx = env.context().expect("context");

    run_land(&ctx, &AssumeYes, &land_args("9")).expect("land");

    let placeholder = "__erk-slot-03-placeholder__".to_string();
    assert!(env.git.branches().contains(&placeholder));
    assert!(
        env.git
            .checkouts()
            .contains(&(PathBuf::from("/wt/erk-slot-03"), placeholder.clone()))
    );
    assert!(env.git.removed_worktrees().is_empty());
    assert_eq!(env.git.deleted_branches(), vec!["feature-s".to_string()]);
    // Placeholders never enter the stack.
    assert!(!env.graphite.parents().contains_key(&placeholder));
}

#[test]
fn up_targets_the_single_child_worktree() {
    let env = SimulatedEnv::new()
        .with_feature_worktree("feature-a", "/wt/feature-a", 10)
        .with_feature_worktree("feature-b", "/wt/feature-b", 11)
        .with_tracked("feature-b", "feature-a");
    let ctx = env.context_at("/wt/feature-a").expect("context");
    let vctx = ValidationContext {
        erk: &ctx,
        confirm: &AssumeYes,
    };
    let args = erk::cli::LandArgs {
        up: true,
        ..erk::cli::LandArgs::default()
    };

    let state = validation_pipeline()
        .run(&vctx, LandState::from_cli(&args))
        .expect("validate");

    assert_eq!(state.derived.children, vec!["feature-b".to_string()]);
    assert_eq!(state.derived.destination, Some(PathBuf::from("/wt/feature-b")));
    assert_eq!(state.decision.cleanup, Some(Cleanup::Remove));
    env.assert_no_mutations();
}

#[test]
fn up_requires_the_stack_backend() {
    let env = SimulatedEnv::with_gateways(
        SimulatedGit::new("/repo").with_worktree("/wt/feature-a", Some("feature-a")),
        SimulatedGraphite::unavailable(),
    )
    .with_stacked_pr(10, "feature-a", "main");
    let ctx = env.context_at("/wt/feature-a").expect("context");
    let args = erk::cli::LandArgs {
        up: true,
        ..erk::cli::LandArgs::default()
    };

    let err = run_land(&ctx, &AssumeYes, &args).unwrap_err();
    let err = err.downcast::<PipelineError>().expect("pipeline error");

    assert_eq!(err.step, "resolve_navigation");
    assert_eq!(err.kind, ErrorKind::Precondition);
}

#[test]
fn dirty_worktree_blocks_land_unless_forced() {
    let env = stacked_env().with_dirty("/wt/feature-x");
    let ctx = env.context().expect("context");

    let err = run_land(&ctx, &AssumeYes, &land_args("7")).unwrap_err();
    let err = err.downcast::<PipelineError>().expect("pipeline error");
    assert_eq!(err.step, "check_clean");
    env.assert_no_mutations();

    let forced = erk::cli::LandArgs {
        force: true,
        ..land_args("7")
    };
    run_land(&ctx, &AssumeYes, &forced).expect("forced land");
    assert_eq!(env.git.removed_worktrees(), vec![PathBuf::from("/wt/feature-x")]);
}

/// `--dry-run` walks every cleanup mode to the end without changing anything.
#[test]
fn dry_run_land_describes_each_cleanup_mode() {
    let cases = [
        (
            SimulatedEnv::new().with_feature_worktree("feature-x", "/wt/feature-x", 7),
            "7",
            "remove worktree /wt/feature-x",
            "force-delete branch feature-x",
        ),
        (
            SimulatedEnv::new().with_feature_worktree("feature-s", "/wt/erk-slot-03", 9),
            "9",
            "check out __erk-slot-03-placeholder__ in /wt/erk-slot-03",
            "force-delete branch feature-s",
        ),
        (
            SimulatedEnv::with_gateways(
                SimulatedGit::new("/repo").with_root_branch("feature-r"),
                SimulatedGraphite::new(),
            )
            .with_stacked_pr(5, "feature-r", "main"),
            "5",
            "check out main in /repo",
            "force-delete branch feature-r",
        ),
    ];

    for (env, target, cleanup, delete) in cases {
        let ctx = env.dry_run_context_at("/repo").expect("context");

        let outcome = run_land(&ctx, &AssumeYes, &land_args(target))
            .unwrap_or_else(|err| panic!("{cleanup}: {err:#}"));

        let CommandOutcome::Completed { reports, .. } = outcome else {
            panic!("a dry run never defers");
        };
        let previewed: Vec<_> = reports
            .iter()
            .filter(|r| r.status == MutationStatus::Previewed)
            .map(|r| r.action.as_str())
            .collect();
        assert!(previewed.contains(&cleanup), "{previewed:?}");
        assert!(previewed.contains(&delete), "{previewed:?}");
        env.assert_no_mutations();
    }
}

/// Landing the worktree the shell stands in only validates, then writes a
/// script that finishes the job and moves to the root worktree.
#[test]
fn landing_own_worktree_defers_to_script() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("repo");
    let feature = temp.path().join("wt").join("feature-x");
    let env = SimulatedEnv::with_gateways(
        SimulatedGit::new(&root).with_worktree(&feature, Some("feature-x")),
        SimulatedGraphite::new().with_tracked("feature-x", "main"),
    )
    .with_stacked_pr(7, "feature-x", "main");
    let ctx = env.context_at(&feature).expect("context");

    let outcome = run_land(&ctx, &AssumeYes, &erk::cli::LandArgs::default()).expect("land");

    let CommandOutcome::Deferred(script) = outcome else {
        panic!("expected a deferred script");
    };
    env.assert_no_mutations();
    assert_eq!(script.destination, root);
    assert_eq!(script.path, root.join(".git/erk/scripts/land.sh"));
    let text = std::fs::read_to_string(&script.path).expect("read script");
    assert!(text.starts_with("#!/bin/sh\nset -eu\n"));
    assert!(text.contains(&format!("--repo {} land --exec", root.display())));
    assert!(text.contains("land --exec --pr-number 7 --branch feature-x"));
    assert!(text.contains("--cleanup remove"));
    assert!(text.contains("--confirmed"));
    assert!(text.lines().any(|line| line.starts_with("cd ")));
    assert!(Path::new(&script.path).is_file());
}
