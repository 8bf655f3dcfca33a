use anyhow::Result;
use tracing::instrument;

use crate::context::{ErkContext, ValidationContext};
use crate::core::errors::{StepError, required};
use crate::core::names::validate_branch_name;
use crate::core::pipeline::{Phase, Pipeline};
use crate::core::types::MutationReport;
use crate::io::confirm::Confirm;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBranchState {
    pub name: String,
    /// Explicit base; trunk when absent.
    pub from: Option<String>,
    pub checkout: bool,
    pub base: Option<String>,
    pub reports: Vec<MutationReport>,
}

impl CreateBranchState {
    pub fn from_cli(name: &str, from: Option<&str>, checkout: bool) -> Self {
        Self {
            name: name.to_string(),
            from: from.map(str::to_string),
            checkout,
            ..Self::default()
        }
    }
}

pub fn create_validation<'a>() -> Pipeline<ValidationContext<'a>, CreateBranchState> {
    Pipeline::new(Phase::Validation)
        .query("check_name", create_check_name)
        .query("resolve_base", create_resolve_base)
        .query("check_absent", create_check_absent)
}

pub fn create_execution() -> Pipeline<ErkContext, CreateBranchState> {
    Pipeline::new(Phase::Execution)
        .mutation("create", create_branch)
        .mutation("checkout", create_checkout)
}

fn create_check_name(
    _ctx: &ValidationContext<'_>,
    state: &CreateBranchState,
) -> Result<CreateBranchState, StepError> {
    validate_branch_name(&state.name)?;
    Ok(state.clone())
}

fn create_resolve_base(
    ctx: &ValidationContext<'_>,
    state: &CreateBranchState,
) -> Result<CreateBranchState, StepError> {
    let erk = ctx.erk;
    let base = match &state.from {
        Some(base) => base.clone(),
        None => erk.trunk()?,
    };
    if !erk.git.branch_exists(&erk.worktree, &base)? {
        return Err(StepError::precondition(format!("base branch '{base}' does not exist")));
    }
    Ok(CreateBranchState {
        base: Some(base),
        ..state.clone()
    })
}

fn create_check_absent(
    ctx: &ValidationContext<'_>,
    state: &CreateBranchState,
) -> Result<CreateBranchState, StepError> {
    let erk = ctx.erk;
    if erk.git.branch_exists(&erk.worktree, &state.name)? {
        return Err(StepError::conflict(format!("branch '{}' already exists", state.name))
            .with_hint(format!("erk branch checkout {}", state.name)));
    }
    Ok(state.clone())
}

fn create_branch(ctx: &ErkContext, state: &CreateBranchState) -> Result<CreateBranchState, StepError> {
    let base = required(&state.base, "base")?;
    let report = if ctx.git.branch_exists(&ctx.worktree, &state.name)? {
        MutationReport::unchanged(format!("create branch {} from {base}", state.name))
    } else {
        ctx.branches.create(&ctx.worktree, &state.name, base)?
    };
    let mut next = state.clone();
    next.reports.push(report);
    Ok(next)
}

fn create_checkout(ctx: &ErkContext, state: &CreateBranchState) -> Result<CreateBranchState, StepError> {
    if !state.checkout {
        return Ok(state.clone());
    }
    let report = ctx.branches.checkout(&ctx.worktree, &state.name)?;
    let mut next = state.clone();
    next.reports.push(report);
    Ok(next)
}

#[instrument(skip_all, fields(name = %name, checkout = checkout))]
pub fn run_create(
    ctx: &ErkContext,
    confirm: &dyn Confirm,
    name: &str,
    from: Option<&str>,
    checkout: bool,
) -> Result<Vec<MutationReport>> {
    let vctx = ValidationContext { erk: ctx, confirm };
    let validated = create_validation().run(&vctx, CreateBranchState::from_cli(name, from, checkout))?;
    let done = create_execution().previewing(ctx.dry_run).run(ctx, validated)?;
    Ok(done.reports)
}
