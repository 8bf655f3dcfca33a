use anyhow::Result;
use tracing::{debug, instrument};

use crate::context::{ErkContext, ValidationContext};
use crate::core::errors::StepError;
use crate::core::pipeline::{Phase, Pipeline};
use crate::core::types::MutationReport;
use crate::core::worktrees::find_binding;
use crate::io::confirm::Confirm;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteBranchState {
    pub name: String,
    pub force: bool,
    pub confirmed: bool,
    pub reports: Vec<MutationReport>,
}

pub fn delete_validation<'a>() -> Pipeline<ValidationContext<'a>, DeleteBranchState> {
    Pipeline::new(Phase::Validation)
        .query("check_target", delete_check_target)
        .query("check_unbound", delete_check_unbound)
        .query("confirm", delete_confirm)
}

pub fn delete_execution() -> Pipeline<ErkContext, DeleteBranchState> {
    Pipeline::new(Phase::Execution)
        .query("require_confirmation", delete_require_confirmation)
        .mutation("delete", delete_branch)
}

fn delete_check_target(
    ctx: &ValidationContext<'_>,
    state: &DeleteBranchState,
) -> Result<DeleteBranchState, StepError> {
    let erk = ctx.erk;
    if state.name == erk.trunk()? {
        return Err(StepError::precondition(format!(
            "'{}' is the trunk branch",
            state.name
        )));
    }
    if erk.branches.record(&erk.root_worktree, &state.name)?.is_none() {
        return Err(StepError::precondition(format!("branch '{}' does not exist", state.name)));
    }
    Ok(state.clone())
}

fn delete_check_unbound(
    ctx: &ValidationContext<'_>,
    state: &DeleteBranchState,
) -> Result<DeleteBranchState, StepError> {
    let erk = ctx.erk;
    let bindings = erk.git.list_worktrees(&erk.root_worktree)?;
    if let Some(holder) = find_binding(&bindings, &state.name) {
        return Err(StepError::conflict(format!(
            "branch '{}' is checked out in {}",
            state.name,
            holder.path.display()
        ))
        .with_hint(format!("check out another branch in {} first", holder.path.display())));
    }
    Ok(state.clone())
}

fn delete_confirm(ctx: &ValidationContext<'_>, state: &DeleteBranchState) -> Result<DeleteBranchState, StepError> {
    let mut next = state.clone();
    if state.force {
        next.confirmed = true;
        return Ok(next);
    }
    let children = ctx.erk.branches.children(&state.name)?;
    let question = match children.as_slice() {
        [] => format!("Delete branch '{}'?", state.name),
        many => format!(
            "Delete branch '{}'? Its children ({}) lose their parent.",
            state.name,
            many.join(", ")
        ),
    };
    let accepted = ctx
        .confirm
        .confirm(&question)
        .map_err(|e| StepError::precondition(format!("{e:#}")).with_hint("pass --force"))?;
    if !accepted {
        return Err(StepError::precondition("delete cancelled"));
    }
    next.confirmed = true;
    Ok(next)
}

fn delete_require_confirmation(
    _ctx: &ErkContext,
    state: &DeleteBranchState,
) -> Result<DeleteBranchState, StepError> {
    if !state.confirmed {
        return Err(StepError::missing_field("confirmed"));
    }
    Ok(state.clone())
}

fn delete_branch(ctx: &ErkContext, state: &DeleteBranchState) -> Result<DeleteBranchState, StepError> {
    let report = ctx
        .branches
        .delete(&ctx.root_worktree, &state.name, state.force)?;
    debug!(report = %report, "deleted");
    let mut next = state.clone();
    next.reports.push(report);
    Ok(next)
}

#[instrument(skip_all, fields(name = %name, force = force))]
pub fn run_delete(ctx: &ErkContext, confirm: &dyn Confirm, name: &str, force: bool) -> Result<Vec<MutationReport>> {
    let initial = DeleteBranchState {
        name: name.to_string(),
        force,
        ..DeleteBranchState::default()
    };
    let vctx = ValidationContext { erk: ctx, confirm };
    let validated = delete_validation().run(&vctx, initial)?;
    let done = delete_execution().previewing(ctx.dry_run).run(ctx, validated)?;
    Ok(done.reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{ErrorKind, PipelineError};
    use crate::io::confirm::AssumeYes;
    use crate::test_support::{ScriptedConfirm, SimulatedEnv};

    fn pipeline_error(err: anyhow::Error) -> PipelineError {
        err.downcast::<PipelineError>().expect("pipeline error")
    }

    #[test]
    fn validation_alone_mutates_nothing() {
        let env = SimulatedEnv::new()
            .with_branch("feature-x")
            .with_tracked("feature-x", "main");
        let ctx = env.context().expect("context");
        let confirm = ScriptedConfirm::new([true]);
        let vctx = ValidationContext {
            erk: &ctx,
            confirm: &confirm,
        };
        let initial = DeleteBranchState {
            name: "feature-x".to_string(),
            ..DeleteBranchState::default()
        };

        let state = delete_validation().run(&vctx, initial).expect("validate");

        assert!(state.confirmed);
        env.assert_no_mutations();
    }

    #[test]
    fn delete_refuses_checked_out_branch() {
        let env = SimulatedEnv::new().with_feature_worktree("feature-a", "/wt/feature-a", 3);
        let ctx = env.context().expect("context");
        let err = pipeline_error(run_delete(&ctx, &AssumeYes, "feature-a", true).unwrap_err());
        assert_eq!(err.step, "check_unbound");
        assert_eq!(err.kind, ErrorKind::Conflict);
        env.assert_no_mutations();
    }

    #[test]
    fn delete_asks_and_removes_ref_and_metadata() {
        let env = SimulatedEnv::new()
            .with_branch("feature-x")
            .with_tracked("feature-x", "main");
        let ctx = env.context().expect("context");
        let confirm = ScriptedConfirm::new([true]);

        run_delete(&ctx, &confirm, "feature-x", false).expect("delete");

        assert_eq!(confirm.questions(), vec!["Delete branch 'feature-x'?".to_string()]);
        assert_eq!(env.git.deleted_branches(), vec!["feature-x".to_string()]);
        assert_eq!(env.graphite.untracked_calls(), vec!["feature-x".to_string()]);
    }

    #[test]
    fn delete_of_trunk_is_refused() {
        let env = SimulatedEnv::new();
        let ctx = env.context().expect("context");
        let err = pipeline_error(run_delete(&ctx, &AssumeYes, "main", true).unwrap_err());
        assert_eq!(err.step, "check_target");
        assert_eq!(err.kind, ErrorKind::Precondition);
    }
}
