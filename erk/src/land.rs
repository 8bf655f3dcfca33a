//! `erk land`: merge a pull request and clean up after it.
//!
//! Validation resolves the pull request, the worktree holding its branch, and
//! where the shell should end up, then asks for confirmation. Execution
//! merges, moves stack children onto trunk, releases or removes the
//! worktree, deletes the branch, and pulls trunk.
//!
//! When the landed worktree is the caller's own (or `--up` is given) the
//! execution half runs in a second process started from a generated script,
//! because only the shell itself can change its directory.
//!
//! Every execution step checks the current state first, so re-running a
//! finished land is a successful no-op.

use std::path::PathBuf;

use anyhow::Result;
use clap::ValueEnum;
use tracing::{debug, info, instrument};

use crate::cli::LandArgs;
use crate::context::{ErkContext, ValidationContext};
use crate::core::errors::{StepError, required};
use crate::core::names::{placeholder_branch, slot_number};
use crate::core::pipeline::{Phase, Pipeline};
use crate::core::types::{Backend, Mergeable, MutationReport, PrState, PullRequest};
use crate::core::worktrees::{binding_at, find_binding};
use crate::deferred::{CommandOutcome, defer};
use crate::io::confirm::Confirm;

/// What happens to the worktree holding the landed branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Cleanup {
    /// Leave the worktree and the branch alone.
    Keep,
    /// Pooled slot: park it on a placeholder branch.
    Release,
    /// Dedicated worktree: remove it.
    Remove,
    /// Root worktree: switch it to trunk.
    SwitchToTrunk,
}

impl Cleanup {
    pub fn as_arg(self) -> &'static str {
        match self {
            Cleanup::Keep => "keep",
            Cleanup::Release => "release",
            Cleanup::Remove => "remove",
            Cleanup::SwitchToTrunk => "switch-to-trunk",
        }
    }
}

/// What the user asked to land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LandTarget {
    CurrentBranch,
    PullRequest(u64),
    Branch(String),
}

impl LandTarget {
    /// Accepts `123`, `#123`, a pull request URL, or a branch name.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return LandTarget::CurrentBranch;
        };
        let digits = raw
            .rsplit_once("/pull/")
            .map(|(_, tail)| tail.trim_end_matches('/'))
            .unwrap_or_else(|| raw.trim_start_matches('#'));
        match digits.parse() {
            Ok(number) => LandTarget::PullRequest(number),
            Err(_) => LandTarget::Branch(raw.to_string()),
        }
    }
}

/// User-controlled fields. These are exactly what the generated script
/// passes to the execution process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandDecision {
    pub pr_number: Option<u64>,
    pub branch: Option<String>,
    pub worktree_path: Option<PathBuf>,
    pub cleanup: Option<Cleanup>,
    pub up: bool,
    pub pull: bool,
    pub force: bool,
    pub confirmed: bool,
}

/// Recomputed on every run, never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandDerived {
    pub pull_request: Option<PullRequest>,
    pub trunk: Option<String>,
    pub children: Vec<String>,
    /// Directory the shell should end up in, when it has to move.
    pub destination: Option<PathBuf>,
    /// Worktree whose cleanup was only previewed, so it still holds the branch.
    pub released_worktree: Option<PathBuf>,
    pub reports: Vec<MutationReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandState {
    pub target: LandTarget,
    pub keep_worktree: bool,
    pub decision: LandDecision,
    pub derived: LandDerived,
}

impl LandState {
    pub fn from_cli(args: &LandArgs) -> Self {
        Self {
            target: LandTarget::parse(args.target.as_deref()),
            keep_worktree: args.keep_worktree,
            decision: LandDecision {
                up: args.up,
                pull: !args.no_pull,
                force: args.force,
                ..LandDecision::default()
            },
            derived: LandDerived::default(),
        }
    }

    /// Rebuild from the flags a generated script passes.
    pub fn from_exec_args(args: &LandArgs) -> Self {
        Self::from_decision(LandDecision {
            pr_number: args.pr_number,
            branch: args.branch.clone(),
            worktree_path: args.worktree_path.clone(),
            cleanup: args.cleanup,
            up: args.up,
            pull: !args.no_pull,
            force: args.force,
            confirmed: args.confirmed,
        })
    }

    pub fn from_decision(decision: LandDecision) -> Self {
        let target = match (&decision.branch, decision.pr_number) {
            (_, Some(number)) => LandTarget::PullRequest(number),
            (Some(branch), None) => LandTarget::Branch(branch.clone()),
            (None, None) => LandTarget::CurrentBranch,
        };
        Self {
            target,
            keep_worktree: decision.cleanup == Some(Cleanup::Keep),
            decision,
            derived: LandDerived::default(),
        }
    }

    fn with_report(&self, report: MutationReport) -> Self {
        let mut next = self.clone();
        debug!(report = %report, "land step");
        next.derived.reports.push(report);
        next
    }
}

/// Arguments for `erk land --exec ...` reproducing `decision`.
pub fn to_exec_args(decision: &LandDecision) -> Vec<String> {
    let mut args = vec!["land".to_string(), "--exec".to_string()];
    if let Some(number) = decision.pr_number {
        args.extend(["--pr-number".to_string(), number.to_string()]);
    }
    if let Some(branch) = &decision.branch {
        args.extend(["--branch".to_string(), branch.clone()]);
    }
    if let Some(path) = &decision.worktree_path {
        args.extend(["--worktree-path".to_string(), path.display().to_string()]);
    }
    if let Some(cleanup) = decision.cleanup {
        args.extend(["--cleanup".to_string(), cleanup.as_arg().to_string()]);
    }
    if decision.up {
        args.push("--up".to_string());
    }
    if !decision.pull {
        args.push("--no-pull".to_string());
    }
    if decision.force {
        args.push("--force".to_string());
    }
    if decision.confirmed {
        args.push("--confirmed".to_string());
    }
    args
}

pub fn validation_pipeline<'a>() -> Pipeline<ValidationContext<'a>, LandState> {
    Pipeline::new(Phase::Validation)
        .query("resolve_target", resolve_target)
        .query("resolve_pull_request", resolve_pull_request)
        .query("resolve_worktree", resolve_worktree)
        .query("resolve_navigation", resolve_navigation)
        .query("check_clean", check_clean)
        .query("confirm", confirm)
}

pub fn execution_pipeline() -> Pipeline<ErkContext, LandState> {
    Pipeline::new(Phase::Execution)
        .query("require_decision", require_decision)
        .query("rederive", rederive)
        .mutation("label", label)
        .mutation("merge", merge)
        .mutation("reparent_children", reparent_children)
        .mutation("cleanup_worktree", cleanup_worktree)
        .mutation("delete_branch", delete_branch)
        .mutation("pull_trunk", pull_trunk)
}

fn resolve_target(ctx: &ValidationContext<'_>, state: &LandState) -> Result<LandState, StepError> {
    let mut next = state.clone();
    match &state.target {
        LandTarget::CurrentBranch => {
            let branch = ctx.erk.git.current_branch(&ctx.erk.cwd)?.ok_or_else(|| {
                StepError::precondition("HEAD is detached; nothing to land")
                    .with_hint("erk land <pr-number>")
            })?;
            next.decision.branch = Some(branch);
        }
        LandTarget::PullRequest(number) => next.decision.pr_number = Some(*number),
        LandTarget::Branch(branch) => next.decision.branch = Some(branch.clone()),
    }
    Ok(next)
}

fn resolve_pull_request(ctx: &ValidationContext<'_>, state: &LandState) -> Result<LandState, StepError> {
    let erk = ctx.erk;
    let pr = match (state.decision.pr_number, &state.decision.branch) {
        (Some(number), _) => erk
            .github
            .pull_request(&erk.worktree, number)?
            .ok_or_else(|| StepError::precondition(format!("pull request #{number} not found")))?,
        (None, Some(branch)) => erk
            .github
            .pull_request_for_branch(&erk.worktree, branch)?
            .ok_or_else(|| {
                StepError::precondition(format!("no pull request for branch '{branch}'"))
                    .with_hint(format!("gh pr create --head {branch}"))
            })?,
        (None, None) => return Err(StepError::missing_field("branch")),
    };
    check_pull_request(&pr, state.decision.branch.as_deref())?;

    let trunk = erk.trunk()?;
    if pr.head == trunk {
        return Err(StepError::precondition(format!(
            "'{trunk}' is the trunk branch and cannot be landed"
        )));
    }
    if pr.base != trunk {
        return Err(StepError::precondition(format!(
            "pull request #{} targets '{}', not trunk '{trunk}'",
            pr.number, pr.base
        ))
        .with_hint(format!("land '{}' first", pr.base)));
    }

    let mut next = state.clone();
    next.decision.pr_number = Some(pr.number);
    next.decision.branch = Some(pr.head.clone());
    next.derived.trunk = Some(trunk);
    next.derived.pull_request = Some(pr);
    Ok(next)
}

fn check_pull_request(pr: &PullRequest, branch: Option<&str>) -> Result<(), StepError> {
    if let Some(branch) = branch
        && branch != pr.head
    {
        return Err(StepError::precondition(format!(
            "pull request #{} is for '{}', not '{branch}'",
            pr.number, pr.head
        )));
    }
    match (pr.state, pr.mergeable) {
        (PrState::Closed, _) => Err(StepError::precondition(format!(
            "pull request #{} is closed without merging",
            pr.number
        ))),
        (PrState::Open, Mergeable::Conflicting) => Err(StepError::conflict(format!(
            "pull request #{} has merge conflicts",
            pr.number
        ))
        .with_hint(format!("gh pr checkout {} and resolve the conflicts", pr.number))),
        _ => Ok(()),
    }
}

fn resolve_worktree(ctx: &ValidationContext<'_>, state: &LandState) -> Result<LandState, StepError> {
    let erk = ctx.erk;
    let branch = required(&state.decision.branch, "branch")?;
    let bindings = erk.git.list_worktrees(&erk.worktree)?;

    let mut next = state.clone();
    match find_binding(&bindings, branch) {
        None => {
            next.decision.worktree_path = None;
            next.decision.cleanup = Some(Cleanup::Keep);
        }
        Some(binding) => {
            let is_slot = binding
                .path
                .file_name()
                .and_then(|n| slot_number(&n.to_string_lossy()))
                .is_some();
            let cleanup = if binding.is_root {
                Cleanup::SwitchToTrunk
            } else if state.keep_worktree {
                Cleanup::Keep
            } else if is_slot {
                Cleanup::Release
            } else {
                Cleanup::Remove
            };
            next.decision.worktree_path = Some(binding.path.clone());
            next.decision.cleanup = Some(cleanup);
        }
    }
    Ok(next)
}

fn resolve_navigation(ctx: &ValidationContext<'_>, state: &LandState) -> Result<LandState, StepError> {
    let erk = ctx.erk;
    let branch = required(&state.decision.branch, "branch")?;
    let children = erk.branches.children(branch)?;

    let mut next = state.clone();
    if state.decision.up {
        if erk.branches.backend() != Backend::Graphite {
            return Err(StepError::precondition("--up needs the graphite backend"));
        }
        let child = match children.as_slice() {
            [only] => only,
            [] => {
                return Err(StepError::precondition(format!(
                    "'{branch}' has no stacked child to move up to"
                )));
            }
            many => {
                return Err(StepError::precondition(format!(
                    "'{branch}' has several children ({}); --up is ambiguous",
                    many.join(", ")
                )));
            }
        };
        let bindings = erk.git.list_worktrees(&erk.worktree)?;
        let holder = find_binding(&bindings, child).ok_or_else(|| {
            StepError::precondition(format!("child branch '{child}' is not checked out anywhere"))
                .with_hint(format!("erk branch checkout {child} --worktree"))
        })?;
        next.derived.destination = Some(holder.path.clone());
    } else {
        let leaving = state.decision.worktree_path.as_deref() == Some(erk.worktree.as_path());
        let moves = matches!(
            state.decision.cleanup,
            Some(Cleanup::Remove | Cleanup::Release)
        );
        next.derived.destination = (leaving && moves).then(|| erk.root_worktree.clone());
    }
    next.derived.children = children;
    Ok(next)
}

fn check_clean(ctx: &ValidationContext<'_>, state: &LandState) -> Result<LandState, StepError> {
    if state.decision.force || state.decision.cleanup == Some(Cleanup::Keep) {
        return Ok(state.clone());
    }
    if let Some(path) = &state.decision.worktree_path
        && !ctx.erk.git.is_worktree_clean(path)?
    {
        return Err(StepError::precondition(format!(
            "worktree {} has uncommitted changes",
            path.display()
        ))
        .with_hint("commit or stash them, or pass --force"));
    }
    Ok(state.clone())
}

fn confirm(ctx: &ValidationContext<'_>, state: &LandState) -> Result<LandState, StepError> {
    let mut next = state.clone();
    if state.decision.force {
        next.decision.confirmed = true;
        return Ok(next);
    }
    let pr = required(&state.derived.pull_request, "pull_request")?;
    let question = format!(
        "Land #{} '{}' ({} -> {})?",
        pr.number, pr.title, pr.head, pr.base
    );
    let accepted = ctx.confirm.confirm(&question).map_err(|e| {
        StepError::precondition(format!("{e:#}")).with_hint("pass --force to skip confirmation")
    })?;
    if !accepted {
        return Err(StepError::precondition("land cancelled"));
    }
    next.decision.confirmed = true;
    Ok(next)
}

fn require_decision(_ctx: &ErkContext, state: &LandState) -> Result<LandState, StepError> {
    required(&state.decision.pr_number, "pr_number")?;
    required(&state.decision.branch, "branch")?;
    required(&state.decision.cleanup, "cleanup")?;
    if state.decision.cleanup != Some(Cleanup::Keep) {
        required(&state.decision.worktree_path, "worktree_path")?;
    }
    if !state.decision.confirmed {
        return Err(StepError::missing_field("confirmed"));
    }
    Ok(state.clone())
}

fn rederive(ctx: &ErkContext, state: &LandState) -> Result<LandState, StepError> {
    let number = *required(&state.decision.pr_number, "pr_number")?;
    let branch = required(&state.decision.branch, "branch")?;
    let pr = ctx
        .github
        .pull_request(&ctx.root_worktree, number)?
        .ok_or_else(|| StepError::precondition(format!("pull request #{number} not found")))?;
    check_pull_request(&pr, Some(branch))?;

    let mut next = state.clone();
    next.derived.trunk = Some(ctx.trunk()?);
    next.derived.children = ctx.branches.children(branch)?;
    next.derived.pull_request = Some(pr);
    Ok(next)
}

fn label(ctx: &ErkContext, state: &LandState) -> Result<LandState, StepError> {
    let Some(label) = &ctx.config.land_label else {
        return Ok(state.clone());
    };
    let pr = required(&state.derived.pull_request, "pull_request")?;
    if pr.state == PrState::Merged {
        return Ok(state.clone());
    }
    let report = ctx.github.add_label(&ctx.root_worktree, pr.number, label)?;
    Ok(state.with_report(report))
}

fn merge(ctx: &ErkContext, state: &LandState) -> Result<LandState, StepError> {
    let pr = required(&state.derived.pull_request, "pull_request")?;
    if pr.state == PrState::Merged {
        return Ok(state.with_report(MutationReport::unchanged(format!(
            "merge PR #{}",
            pr.number
        ))));
    }
    let report = ctx
        .github
        .merge_pull_request(&ctx.root_worktree, pr.number, ctx.config.merge_method)?;
    Ok(state.with_report(report))
}

fn reparent_children(ctx: &ErkContext, state: &LandState) -> Result<LandState, StepError> {
    let trunk = required(&state.derived.trunk, "trunk")?;
    let mut next = state.clone();
    for child in &state.derived.children {
        let report = ctx.branches.set_parent(&ctx.root_worktree, child, trunk)?;
        next = next.with_report(report);
    }
    Ok(next)
}

fn cleanup_worktree(ctx: &ErkContext, state: &LandState) -> Result<LandState, StepError> {
    let cleanup = *required(&state.decision.cleanup, "cleanup")?;
    let path = match (cleanup, &state.decision.worktree_path) {
        (Cleanup::Keep, _) => return Ok(state.clone()),
        (_, path) => required(path, "worktree_path")?,
    };
    let trunk = required(&state.derived.trunk, "trunk")?;

    let report = match cleanup {
        Cleanup::Keep => return Ok(state.clone()),
        Cleanup::SwitchToTrunk => ctx.branches.checkout(path, trunk)?,
        Cleanup::Release => {
            let slot = path
                .file_name()
                .and_then(|n| slot_number(&n.to_string_lossy()))
                .ok_or_else(|| {
                    StepError::internal(format!("{} is not a slot worktree", path.display()))
                })?;
            let placeholder = placeholder_branch(slot);
            let plain = ctx.branches.plain();
            if !ctx.git.branch_exists(&ctx.root_worktree, &placeholder)? {
                let created = plain.create(path, &placeholder, trunk)?;
                debug!(report = %created, "created placeholder");
            }
            plain.checkout(path, &placeholder)?
        }
        Cleanup::Remove => {
            let bindings = ctx.git.list_worktrees(&ctx.root_worktree)?;
            if binding_at(&bindings, path).is_none() {
                MutationReport::unchanged(format!("remove worktree {}", path.display()))
            } else {
                ctx.git
                    .remove_worktree(&ctx.root_worktree, path, state.decision.force)?
            }
        }
    };
    let previewed = report.is_previewed();
    let mut next = state.with_report(report);
    if previewed {
        next.derived.released_worktree = Some(path.clone());
    }
    Ok(next)
}

fn delete_branch(ctx: &ErkContext, state: &LandState) -> Result<LandState, StepError> {
    let branch = required(&state.decision.branch, "branch")?;
    if state.decision.cleanup == Some(Cleanup::Keep) && state.decision.worktree_path.is_some() {
        debug!(branch = %branch, "worktree kept, keeping branch");
        return Ok(state.clone());
    }
    // Squash and rebase merges leave the branch unmerged as far as git knows.
    let report = ctx.branches.delete_released(
        &ctx.root_worktree,
        branch,
        true,
        state.derived.released_worktree.as_deref(),
    )?;
    Ok(state.with_report(report))
}

fn pull_trunk(ctx: &ErkContext, state: &LandState) -> Result<LandState, StepError> {
    if !state.decision.pull || !ctx.config.pull_after_land {
        return Ok(state.clone());
    }
    let trunk = required(&state.derived.trunk, "trunk")?;
    let root_branch = ctx.git.current_branch(&ctx.root_worktree)?;
    if root_branch.as_deref() != Some(trunk.as_str()) {
        debug!(?root_branch, "root worktree not on trunk, skipping pull");
        return Ok(state.clone());
    }
    let report = ctx.git.pull(&ctx.root_worktree, "origin", trunk)?;
    Ok(state.with_report(report))
}

/// Run `erk land` from the command line.
#[instrument(skip_all, fields(exec = args.exec, dry_run = ctx.dry_run))]
pub fn run_land(ctx: &ErkContext, confirm: &dyn Confirm, args: &LandArgs) -> Result<CommandOutcome> {
    if args.exec {
        let state = execution_pipeline()
            .previewing(ctx.dry_run)
            .run(ctx, LandState::from_exec_args(args))?;
        return Ok(CommandOutcome::Completed {
            reports: state.derived.reports,
            destination: None,
        });
    }

    let vctx = ValidationContext { erk: ctx, confirm };
    let validated = validation_pipeline().run(&vctx, LandState::from_cli(args))?;
    let destination = validated.derived.destination.clone();

    match destination {
        Some(dest) if !ctx.dry_run => {
            let script = defer(ctx, "land", to_exec_args(&validated.decision), &dest)?;
            Ok(CommandOutcome::Deferred(script))
        }
        destination => {
            info!("executing land in-process");
            let state = execution_pipeline()
                .previewing(ctx.dry_run)
                .run(ctx, LandState::from_decision(validated.decision))?;
            Ok(CommandOutcome::Completed {
                reports: state.derived.reports,
                destination,
            })
        }
    }
}
