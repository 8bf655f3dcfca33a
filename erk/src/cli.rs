//! Command-line surface.
//!
//! Flags marked `hide = true` exist for generated scripts only: they carry a
//! validated decision into the execution process.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::land::Cleanup;

#[derive(Debug, Parser)]
#[command(
    name = "erk",
    version,
    about = "Worktree, stack, and agent workflow orchestration"
)]
pub struct Cli {
    /// Describe mutations instead of performing them.
    #[arg(long, global = true)]
    pub dry_run: bool,
    /// Trace every git, gt, gh, and agent call to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Run as if started in this directory. Generated scripts pin it to the
    /// root worktree, which outlives the worktree being cleaned up.
    #[arg(long, global = true, hide = true)]
    pub repo: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write `.erk/config.toml` with default settings.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Merge a pull request, then clean up its branch and worktree.
    Land(LandArgs),
    /// Create, check out, or delete branches.
    #[command(subcommand)]
    Branch(BranchCommand),
    /// Create a branch and worktree, then hand it to the agent.
    Implement(ImplementArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct LandArgs {
    /// Pull request number or URL, or branch name. Defaults to the current branch.
    pub target: Option<String>,
    /// Move to the worktree of the single stacked child afterwards.
    #[arg(long)]
    pub up: bool,
    /// Skip pulling trunk in the root worktree.
    #[arg(long)]
    pub no_pull: bool,
    /// Leave the worktree and local branch in place.
    #[arg(long)]
    pub keep_worktree: bool,
    /// Skip confirmation and the clean-worktree check.
    #[arg(short, long)]
    pub force: bool,

    #[arg(long, hide = true)]
    pub exec: bool,
    #[arg(long, hide = true)]
    pub pr_number: Option<u64>,
    #[arg(long, hide = true)]
    pub branch: Option<String>,
    #[arg(long, hide = true)]
    pub worktree_path: Option<PathBuf>,
    #[arg(long, hide = true, value_enum)]
    pub cleanup: Option<Cleanup>,
    #[arg(long, hide = true)]
    pub confirmed: bool,
}

#[derive(Debug, Subcommand)]
pub enum BranchCommand {
    /// Create NAME from BASE without switching to it.
    Create {
        name: String,
        /// Base branch. Defaults to trunk.
        #[arg(long)]
        from: Option<String>,
        /// Check the new branch out in the current worktree.
        #[arg(long)]
        checkout: bool,
    },
    /// Check out NAME, refusing if another worktree has it.
    Checkout(CheckoutArgs),
    /// Delete NAME and its stack metadata.
    Delete {
        name: String,
        /// Skip confirmation and delete unmerged work.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct CheckoutArgs {
    pub name: String,
    /// Use a dedicated worktree and move the shell there.
    #[arg(long)]
    pub worktree: bool,

    #[arg(long, hide = true)]
    pub exec: bool,
    #[arg(long, hide = true)]
    pub worktree_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ImplementArgs {
    /// Branch to create for the work.
    pub branch: String,
    /// Base branch. Defaults to trunk.
    #[arg(long)]
    pub from: Option<String>,
    /// Agent workflow to start.
    #[arg(long, default_value = "erk:plan-implement")]
    pub workflow: String,
    /// Task description passed to the workflow.
    #[arg(long, default_value = "")]
    pub prompt: String,
    /// Run the workflow to completion instead of handing over the terminal.
    #[arg(long)]
    pub headless: bool,
    /// Publish the branch after a successful headless run.
    #[arg(long, requires = "headless")]
    pub submit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["erk", "init"]).expect("parse");
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["erk", "land", "42", "--dry-run", "-v"]).expect("parse");
        assert!(cli.dry_run);
        assert!(cli.verbose);
        let Command::Land(args) = cli.command else {
            panic!("expected land");
        };
        assert_eq!(args.target.as_deref(), Some("42"));
        assert!(!args.exec);
    }

    #[test]
    fn repo_flag_precedes_generated_exec_line() {
        let argv = ["erk", "--repo", "/repo", "land", "--exec", "--pr-number", "7"];
        let cli = Cli::try_parse_from(argv).expect("parse");
        assert_eq!(cli.repo, Some(PathBuf::from("/repo")));
        let Command::Land(args) = cli.command else {
            panic!("expected land");
        };
        assert!(args.exec);
        assert_eq!(args.pr_number, Some(7));
    }

    #[test]
    fn hidden_flags_stay_out_of_help() {
        use clap::CommandFactory;
        let mut cmd = Cli::command();
        let help = cmd
            .find_subcommand_mut("land")
            .expect("land")
            .render_help()
            .to_string();
        assert!(help.contains("--keep-worktree"));
        assert!(!help.contains("--pr-number"));
        assert!(!help.contains("--confirmed"));
        assert!(!Cli::command().render_help().to_string().contains("--repo"));
    }

    #[test]
    fn submit_requires_headless() {
        assert!(Cli::try_parse_from(["erk", "implement", "feature-x", "--submit"]).is_err());
        Cli::try_parse_from(["erk", "implement", "feature-x", "--headless", "--submit"])
            .expect("parse");
    }
}
