//! `erk implement`: a fresh branch and worktree handed to the agent.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument};

use crate::cli::ImplementArgs;
use crate::context::{ErkContext, ValidationContext};
use crate::core::errors::{StepError, required};
use crate::core::names::validate_branch_name;
use crate::core::pipeline::{Phase, Pipeline};
use crate::core::types::MutationReport;
use crate::core::worktrees::{binding_at, find_binding};
use crate::io::agent::WorkflowRequest;
use crate::io::confirm::Confirm;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImplementState {
    pub branch: String,
    pub from: Option<String>,
    pub workflow: String,
    pub prompt: String,
    pub headless: bool,
    pub submit: bool,
    pub base: Option<String>,
    pub worktree_path: Option<PathBuf>,
    /// Tail of the agent's output after a headless run.
    pub summary: Option<String>,
    pub reports: Vec<MutationReport>,
}

impl ImplementState {
    pub fn from_cli(args: &ImplementArgs) -> Self {
        Self {
            branch: args.branch.clone(),
            from: args.from.clone(),
            workflow: args.workflow.clone(),
            prompt: args.prompt.clone(),
            headless: args.headless,
            submit: args.submit,
            ..Self::default()
        }
    }

    fn request(&self, worktree: PathBuf, timeout: Duration) -> WorkflowRequest {
        WorkflowRequest {
            worktree,
            workflow: self.workflow.clone(),
            prompt: self.prompt.clone(),
            timeout,
        }
    }

    fn with_report(&self, report: MutationReport) -> Self {
        let mut next = self.clone();
        next.reports.push(report);
        next
    }
}

pub fn validation_pipeline<'a>() -> Pipeline<ValidationContext<'a>, ImplementState> {
    Pipeline::new(Phase::Validation)
        .query("check_name", check_name)
        .query("check_agent", check_agent)
        .query("resolve_base", resolve_base)
        .query("resolve_worktree", resolve_worktree)
}

pub fn execution_pipeline() -> Pipeline<ErkContext, ImplementState> {
    Pipeline::new(Phase::Execution)
        .mutation("create_branch", create_branch)
        .mutation("add_worktree", add_worktree)
        .mutation("run_agent", run_agent)
        .mutation("submit", submit)
}

fn check_name(_ctx: &ValidationContext<'_>, state: &ImplementState) -> Result<ImplementState, StepError> {
    validate_branch_name(&state.branch)?;
    Ok(state.clone())
}

fn check_agent(ctx: &ValidationContext<'_>, state: &ImplementState) -> Result<ImplementState, StepError> {
    if !ctx.erk.agent.is_available() {
        let command = ctx.erk.config.agent.command.join(" ");
        return Err(StepError::precondition(format!("agent command '{command}' is not installed"))
            .with_hint("install the agent CLI or set agent.command in .erk/config.toml"));
    }
    Ok(state.clone())
}

fn resolve_base(ctx: &ValidationContext<'_>, state: &ImplementState) -> Result<ImplementState, StepError> {
    let erk = ctx.erk;
    let base = match &state.from {
        Some(base) => base.clone(),
        None => erk.trunk()?,
    };
    if !erk.git.branch_exists(&erk.root_worktree, &base)? {
        return Err(StepError::precondition(format!("base branch '{base}' does not exist")));
    }
    if erk.git.branch_exists(&erk.root_worktree, &state.branch)? {
        return Err(StepError::conflict(format!("branch '{}' already exists", state.branch))
            .with_hint(format!("erk branch checkout {} --worktree", state.branch)));
    }
    Ok(ImplementState {
        base: Some(base),
        ..state.clone()
    })
}

fn resolve_worktree(ctx: &ValidationContext<'_>, state: &ImplementState) -> Result<ImplementState, StepError> {
    let erk = ctx.erk;
    let path = erk.worktree_path_for(&state.branch);
    let bindings = erk.git.list_worktrees(&erk.root_worktree)?;
    if binding_at(&bindings, &path).is_some() || path.exists() {
        return Err(StepError::conflict(format!("{} already exists", path.display())));
    }
    Ok(ImplementState {
        worktree_path: Some(path),
        ..state.clone()
    })
}

fn create_branch(ctx: &ErkContext, state: &ImplementState) -> Result<ImplementState, StepError> {
    let base = required(&state.base, "base")?;
    if ctx.git.branch_exists(&ctx.root_worktree, &state.branch)? {
        return Ok(state.with_report(MutationReport::unchanged(format!(
            "create branch {} from {base}",
            state.branch
        ))));
    }
    let report = ctx.branches.create(&ctx.root_worktree, &state.branch, base)?;
    Ok(state.with_report(report))
}

fn add_worktree(ctx: &ErkContext, state: &ImplementState) -> Result<ImplementState, StepError> {
    let path = required(&state.worktree_path, "worktree_path")?;
    let bindings = ctx.git.list_worktrees(&ctx.root_worktree)?;
    if let Some(holder) = find_binding(&bindings, &state.branch)
        && holder.path == *path
    {
        return Ok(state.with_report(MutationReport::unchanged(format!(
            "add worktree {} for {}",
            path.display(),
            state.branch
        ))));
    }
    let report = ctx
        .branches
        .add_worktree(&ctx.root_worktree, path, &state.branch)?;
    Ok(state.with_report(report))
}

fn run_agent(ctx: &ErkContext, state: &ImplementState) -> Result<ImplementState, StepError> {
    let path = required(&state.worktree_path, "worktree_path")?;
    let timeout = Duration::from_secs(ctx.config.agent.workflow_timeout_secs);
    let request = state.request(path.clone(), timeout);

    if !state.headless {
        // Live take_over replaces this process; reaching the next line means
        // the call was recorded or previewed.
        let report = ctx.agent.take_over(&request)?;
        return Ok(state.with_report(report));
    }

    let outcome = ctx.agent.run_workflow(&request)?;
    info!(exit_code = ?outcome.exit_code, "agent workflow finished");
    let mut next = state.with_report(outcome.report);
    next.summary = Some(outcome.summary).filter(|s| !s.is_empty());
    Ok(next)
}

fn submit(ctx: &ErkContext, state: &ImplementState) -> Result<ImplementState, StepError> {
    if !(state.headless && state.submit) {
        return Ok(state.clone());
    }
    let path = required(&state.worktree_path, "worktree_path")?;
    let report = ctx.branches.submit(path, &state.branch)?;
    Ok(state.with_report(report))
}

/// Run `erk implement`. Returns the final state so callers can show the
/// agent summary.
#[instrument(skip_all, fields(branch = %args.branch, headless = args.headless))]
pub fn run_implement(ctx: &ErkContext, confirm: &dyn Confirm, args: &ImplementArgs) -> Result<ImplementState> {
    let vctx = ValidationContext { erk: ctx, confirm };
    let validated = validation_pipeline().run(&vctx, ImplementState::from_cli(args))?;
    Ok(execution_pipeline().previewing(ctx.dry_run).run(ctx, validated)?)
}
