//! erk: worktree, stack, and agent workflow orchestration.
//!
//! This binary parses the command line, builds the context (live gateways,
//! optionally wrapped for `--dry-run` and `--verbose`), dispatches to a
//! command, and maps failures to [`erk::exit_codes`].

use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;

use erk::branch::{run_checkout, run_create, run_delete};
use erk::cli::{BranchCommand, Cli, Command};
use erk::context::{ErkContext, Gateways, load_repo_config};
use erk::core::errors::PipelineError;
use erk::core::types::MutationReport;
use erk::deferred::CommandOutcome;
use erk::exit_codes;
use erk::implement::run_implement;
use erk::io::confirm::ConsoleConfirm;
use erk::io::init::{InitOptions, init_repo};
use erk::io::sink::{StderrSink, TraceSink};
use erk::land::run_land;
use erk::logging;

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => exit_codes::OK,
        Err(err) => report_error(&err),
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    let cwd = match cli.repo {
        Some(dir) => dir,
        None => std::env::current_dir().context("read current directory")?,
    };
    let config = load_repo_config(&cwd)?;
    let sink: Rc<dyn TraceSink> = Rc::new(StderrSink);
    let gateways = Gateways::live(&config).wrap(cli.dry_run, cli.verbose, sink);
    let ctx = ErkContext::new(cwd, config, gateways)?
        .with_program(program_path())
        .with_dry_run(cli.dry_run);
    let confirm = ConsoleConfirm;

    match cli.command {
        Command::Init { force } => cmd_init(&ctx, force),
        Command::Land(args) => {
            print_outcome(run_land(&ctx, &confirm, &args)?);
            Ok(())
        }
        Command::Branch(BranchCommand::Create {
            name,
            from,
            checkout,
        }) => {
            print_reports(&run_create(&ctx, &confirm, &name, from.as_deref(), checkout)?);
            Ok(())
        }
        Command::Branch(BranchCommand::Checkout(args)) => {
            print_outcome(run_checkout(&ctx, &confirm, &args)?);
            Ok(())
        }
        Command::Branch(BranchCommand::Delete { name, force }) => {
            print_reports(&run_delete(&ctx, &confirm, &name, force)?);
            Ok(())
        }
        Command::Implement(args) => {
            let state = run_implement(&ctx, &confirm, &args)?;
            print_reports(&state.reports);
            if let Some(summary) = state.summary {
                println!("{summary}");
            }
            Ok(())
        }
    }
}

/// Path generated scripts use to re-invoke this binary.
fn program_path() -> String {
    std::env::current_exe()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "erk".to_string())
}

fn cmd_init(ctx: &ErkContext, force: bool) -> Result<()> {
    if ctx.dry_run {
        let path = erk::io::config::config_path(&ctx.root_worktree);
        eprintln!("[dry-run] would write {}", path.display());
        return Ok(());
    }
    let outcome = init_repo(&ctx.root_worktree, &InitOptions { force })?;
    if outcome.written {
        println!("{}", outcome.config_path.display());
    } else {
        eprintln!(
            "{} already exists (pass --force to overwrite)",
            outcome.config_path.display()
        );
    }
    Ok(())
}

fn print_reports(reports: &[MutationReport]) {
    for report in reports {
        println!("{report}");
    }
}

/// Deferred commands print only the script path on stdout, so shells can
/// `source "$(erk land)"`.
fn print_outcome(outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Completed {
            reports,
            destination,
        } => {
            print_reports(&reports);
            if let Some(dest) = destination {
                eprintln!("[dry-run] would move to {}", dest.display());
            }
        }
        CommandOutcome::Deferred(script) => {
            println!("{}", script.path.display());
            eprintln!("{}", script.instructions());
        }
    }
}

fn report_error(err: &anyhow::Error) -> i32 {
    let Some(failure) = err.downcast_ref::<PipelineError>() else {
        eprintln!("error: {err:#}");
        return exit_codes::PRECONDITION;
    };
    eprintln!("error: {failure}");
    if let Some(hint) = &failure.hint {
        eprintln!("hint: {hint}");
    }
    if failure.is_partial() {
        eprintln!("completed: {}", list_or_none(&failure.completed));
        eprintln!("not run: {}", list_or_none(&failure.pending));
    }
    exit_codes::for_kind(failure.kind)
}

fn list_or_none(steps: &[&'static str]) -> String {
    if steps.is_empty() {
        return "(none)".to_string();
    }
    steps.join(", ")
}
