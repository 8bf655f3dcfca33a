//! Generated-script flags parse back into the same decision, and the binary
//! maps failures to stable exit codes.

use std::path::PathBuf;
use std::process::Command as Process;

use clap::Parser;

use erk::branch::CheckoutState;
use erk::cli::{BranchCommand, Cli, Command};
use erk::exit_codes;
use erk::land::{Cleanup, LandDecision, LandState, to_exec_args};

fn parse(args: Vec<String>) -> Cli {
    let argv = std::iter::once("erk".to_string()).chain(args);
    Cli::try_parse_from(argv).expect("exec args parse")
}

#[test]
fn land_decision_survives_script_round_trip() {
    let decisions = [
        LandDecision {
            pr_number: Some(42),
            branch: Some("feature/with space".to_string()),
            worktree_path: Some(PathBuf::from("/wt/feature with space")),
            cleanup: Some(Cleanup::Remove),
            up: true,
            pull: false,
            force: true,
            confirmed: true,
        },
        LandDecision {
            pr_number: Some(7),
            branch: Some("feature-x".to_string()),
            worktree_path: None,
            cleanup: Some(Cleanup::Keep),
            up: false,
            pull: true,
            force: false,
            confirmed: true,
        },
        LandDecision {
            pr_number: Some(9),
            branch: Some("feature-s".to_string()),
            worktree_path: Some(PathBuf::from("/wt/erk-slot-03")),
            cleanup: Some(Cleanup::Release),
            pull: true,
            confirmed: true,
            ..LandDecision::default()
        },
    ];

    for decision in decisions {
        let cli = parse(to_exec_args(&decision));
        let Command::Land(args) = cli.command else {
            panic!("expected land");
        };
        assert!(args.exec);
        assert_eq!(LandState::from_exec_args(&args).decision, decision);
    }
}

#[test]
fn switch_to_trunk_cleanup_uses_kebab_case() {
    let decision = LandDecision {
        pr_number: Some(1),
        branch: Some("feature-r".to_string()),
        worktree_path: Some(PathBuf::from("/repo")),
        cleanup: Some(Cleanup::SwitchToTrunk),
        pull: true,
        confirmed: true,
        ..LandDecision::default()
    };
    let args = to_exec_args(&decision);
    assert!(args.windows(2).any(|w| w == ["--cleanup", "switch-to-trunk"]));
    let Command::Land(parsed) = parse(args).command else {
        panic!("expected land");
    };
    assert_eq!(parsed.cleanup, Some(Cleanup::SwitchToTrunk));
}

#[test]
fn checkout_state_survives_script_round_trip() {
    let state = CheckoutState {
        name: "feature-x".to_string(),
        worktree: true,
        worktree_path: Some(PathBuf::from("/wt/feature-x")),
        ..CheckoutState::default()
    };
    let cli = parse(state.to_exec_args());
    let Command::Branch(BranchCommand::Checkout(args)) = cli.command else {
        panic!("expected branch checkout");
    };
    assert!(args.exec);
    assert_eq!(CheckoutState::from_exec_args(&args), state);
}

#[test]
fn outside_a_repository_exits_with_precondition() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = Process::new(env!("CARGO_BIN_EXE_erk"))
        .current_dir(temp.path())
        .env("GIT_CEILING_DIRECTORIES", temp.path())
        .args(["branch", "delete", "feature-x", "--force"])
        .output()
        .expect("run erk");

    assert_eq!(output.status.code(), Some(exit_codes::PRECONDITION));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not inside a git repository"), "{stderr}");
}
