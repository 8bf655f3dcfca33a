use std::path::PathBuf;

use anyhow::Result;
use tracing::instrument;

use crate::cli::CheckoutArgs;
use crate::context::{ErkContext, ValidationContext};
use crate::core::errors::{StepError, required};
use crate::core::pipeline::{Phase, Pipeline};
use crate::core::types::MutationReport;
use crate::core::worktrees::{binding_at, conflicting_binding, find_binding};
use crate::deferred::{CommandOutcome, defer};
use crate::io::confirm::Confirm;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutState {
    pub name: String,
    pub worktree: bool,
    /// Dedicated worktree to use; user-controlled once validated.
    pub worktree_path: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub reports: Vec<MutationReport>,
}

impl CheckoutState {
    pub fn from_cli(args: &CheckoutArgs) -> Self {
        Self {
            name: args.name.clone(),
            worktree: args.worktree,
            ..Self::default()
        }
    }

    pub fn from_exec_args(args: &CheckoutArgs) -> Self {
        Self {
            name: args.name.clone(),
            worktree: args.worktree,
            worktree_path: args.worktree_path.clone(),
            ..Self::default()
        }
    }

    pub fn to_exec_args(&self) -> Vec<String> {
        let mut args = vec![
            "branch".to_string(),
            "checkout".to_string(),
            self.name.clone(),
            "--exec".to_string(),
        ];
        if self.worktree {
            args.push("--worktree".to_string());
        }
        if let Some(path) = &self.worktree_path {
            args.extend(["--worktree-path".to_string(), path.display().to_string()]);
        }
        args
    }
}

pub fn checkout_validation<'a>() -> Pipeline<ValidationContext<'a>, CheckoutState> {
    Pipeline::new(Phase::Validation)
        .query("check_exists", checkout_check_exists)
        .query("resolve_worktree", checkout_resolve_worktree)
}

pub fn checkout_execution() -> Pipeline<ErkContext, CheckoutState> {
    Pipeline::new(Phase::Execution).mutation("checkout", checkout_branch)
}

fn checkout_check_exists(ctx: &ValidationContext<'_>, state: &CheckoutState) -> Result<CheckoutState, StepError> {
    let erk = ctx.erk;
    if !erk.git.branch_exists(&erk.worktree, &state.name)? {
        return Err(StepError::precondition(format!("branch '{}' does not exist", state.name))
            .with_hint(format!("erk branch create {}", state.name)));
    }
    Ok(state.clone())
}

fn checkout_resolve_worktree(
    ctx: &ValidationContext<'_>,
    state: &CheckoutState,
) -> Result<CheckoutState, StepError> {
    let erk = ctx.erk;
    let bindings = erk.git.list_worktrees(&erk.worktree)?;
    let mut next = state.clone();

    if !state.worktree {
        if let Some(holder) = conflicting_binding(&bindings, &state.name, &erk.worktree) {
            return Err(StepError::conflict(format!(
                "branch '{}' is checked out in {}",
                state.name,
                holder.path.display()
            ))
            .with_hint(format!("cd {}", holder.path.display())));
        }
        return Ok(next);
    }

    // An existing holder is reused; otherwise a fresh dedicated worktree.
    let path = match find_binding(&bindings, &state.name) {
        Some(holder) => holder.path.clone(),
        None => {
            let path = erk.worktree_path_for(&state.name);
            if binding_at(&bindings, &path).is_some() || path.exists() {
                return Err(StepError::conflict(format!(
                    "{} already exists",
                    path.display()
                )));
            }
            path
        }
    };
    next.destination = Some(path.clone());
    next.worktree_path = Some(path);
    Ok(next)
}

fn checkout_branch(ctx: &ErkContext, state: &CheckoutState) -> Result<CheckoutState, StepError> {
    let report = match (state.worktree, &state.worktree_path) {
        (false, _) => ctx.branches.checkout(&ctx.worktree, &state.name)?,
        (true, path) => {
            let path = required(path, "worktree_path")?;
            ctx.branches.add_worktree(&ctx.root_worktree, path, &state.name)?
        }
    };
    let mut next = state.clone();
    next.reports.push(report);
    Ok(next)
}

#[instrument(skip_all, fields(name = %args.name, exec = args.exec))]
pub fn run_checkout(ctx: &ErkContext, confirm: &dyn Confirm, args: &CheckoutArgs) -> Result<CommandOutcome> {
    if args.exec {
        let done = checkout_execution()
            .previewing(ctx.dry_run)
            .run(ctx, CheckoutState::from_exec_args(args))?;
        return Ok(CommandOutcome::Completed {
            reports: done.reports,
            destination: None,
        });
    }

    let vctx = ValidationContext { erk: ctx, confirm };
    let validated = checkout_validation().run(&vctx, CheckoutState::from_cli(args))?;
    match validated.destination.clone() {
        Some(dest) if !ctx.dry_run && dest != ctx.worktree => {
            let script = defer(ctx, "checkout", validated.to_exec_args(), &dest)?;
            Ok(CommandOutcome::Deferred(script))
        }
        destination => {
            let done = checkout_execution().previewing(ctx.dry_run).run(ctx, validated)?;
            Ok(CommandOutcome::Completed {
                reports: done.reports,
                destination,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use crate::io::git::Git;

    use super::*;
    use crate::branch::run_create;
    use crate::core::errors::{ErrorKind, PipelineError};
    use crate::core::types::MutationStatus;
    use crate::io::confirm::AssumeYes;
    use crate::test_support::SimulatedEnv;

    fn args(name: &str, worktree: bool) -> CheckoutArgs {
        CheckoutArgs {
            name: name.to_string(),
            worktree,
            ..CheckoutArgs::default()
        }
    }

    #[test]
    fn checkout_after_create_switches_branch() {
        let env = SimulatedEnv::new();
        let ctx = env.context().expect("context");

        run_create(&ctx, &AssumeYes, "feature-x", None, false).expect("create");
        run_checkout(&ctx, &AssumeYes, &args("feature-x", false)).expect("checkout");

        assert_eq!(
            env.git.current_branch(Path::new("/repo")).expect("branch").as_deref(),
            Some("feature-x")
        );
    }

    #[test]
    fn validation_alone_mutates_nothing() {
        let env = SimulatedEnv::new().with_branch("feature-x");
        let ctx = env.context().expect("context");
        let vctx = ValidationContext {
            erk: &ctx,
            confirm: &AssumeYes,
        };

        let state = checkout_validation()
            .run(&vctx, CheckoutState::from_cli(&args("feature-x", true)))
            .expect("validate");

        assert_eq!(state.worktree_path, Some(ctx.worktree_path_for("feature-x")));
        env.assert_no_mutations();
    }

    #[test]
    fn checkout_of_branch_held_elsewhere_is_conflict() {
        let env = SimulatedEnv::new().with_feature_worktree("feature-a", "/wt/feature-a", 3);
        let ctx = env.context().expect("context");
        let before = env.git.worktrees();

        let err = run_checkout(&ctx, &AssumeYes, &args("feature-a", false)).unwrap_err();
        let err = err.downcast::<PipelineError>().expect("pipeline error");

        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(err.message.contains("/wt/feature-a"));
        assert_eq!(env.git.worktrees(), before);
    }

    #[test]
    fn dry_run_checkout_into_worktree_previews_in_process() {
        let env = SimulatedEnv::new().with_branch("feature-x");
        let ctx = env.dry_run_context_at("/repo").expect("context");

        let outcome = run_checkout(&ctx, &AssumeYes, &args("feature-x", true)).expect("checkout");

        let CommandOutcome::Completed {
            reports,
            destination,
        } = outcome
        else {
            panic!("dry run must not defer");
        };
        assert_eq!(destination, Some(ctx.worktree_path_for("feature-x")));
        assert!(reports.iter().all(|r| r.status == MutationStatus::Previewed));
        env.assert_no_mutations();
    }

    #[test]
    fn checkout_exec_args_round_trip() {
        let state = CheckoutState {
            name: "feature-x".to_string(),
            worktree: true,
            worktree_path: Some(PathBuf::from("/wt/feature-x")),
            ..CheckoutState::default()
        };
        assert_eq!(
            state.to_exec_args().join(" "),
            "branch checkout feature-x --exec --worktree --worktree-path /wt/feature-x"
        );
    }
}
