//! Per-invocation context: gateways, resolved repository paths, backend.
//!
//! Built once at startup. The execution context carries no way to prompt;
//! validation pipelines get a [`ValidationContext`] that adds a [`Confirm`].

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::branch_manager::{BranchManager, resolve_backend};
use crate::core::errors::StepError;
use crate::core::worktrees::root_binding;
use crate::io::agent::{AgentExecutor, LiveAgent, PreviewAgent, VerboseAgent};
use crate::io::config::{ErkConfig, config_path, load_config};
use crate::io::confirm::Confirm;
use crate::io::git::{Git, LiveGit, PreviewGit, VerboseGit};
use crate::io::github::{GitHub, LiveGitHub, PreviewGitHub, VerboseGitHub};
use crate::io::graphite::{Graphite, LiveGraphite, PreviewGraphite, VerboseGraphite};
use crate::io::process::ProcessRunner;
use crate::io::sink::TraceSink;

/// Timeout for the probe that locates the config file.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// One implementation of each gateway.
#[derive(Clone)]
pub struct Gateways {
    pub git: Rc<dyn Git>,
    pub graphite: Rc<dyn Graphite>,
    pub github: Rc<dyn GitHub>,
    pub agent: Rc<dyn AgentExecutor>,
}

impl Gateways {
    /// Subprocess-backed gateways.
    pub fn live(config: &ErkConfig) -> Self {
        let runner = ProcessRunner::new(Duration::from_secs(config.command_timeout_secs));
        Self {
            git: Rc::new(LiveGit::new(runner.clone())),
            graphite: Rc::new(LiveGraphite::new(runner.clone())),
            github: Rc::new(LiveGitHub::new(runner.clone())),
            agent: Rc::new(LiveAgent::new(config.agent.command.clone(), runner)),
        }
    }

    /// Apply `--dry-run` (Preview) and then `--verbose` (Verbose) decorators.
    pub fn wrap(self, dry_run: bool, verbose: bool, sink: Rc<dyn TraceSink>) -> Self {
        let mut gateways = self;
        if dry_run {
            let notices = Some(sink.clone());
            gateways = Gateways {
                git: Rc::new(PreviewGit::new(gateways.git, notices.clone())),
                graphite: Rc::new(PreviewGraphite::new(gateways.graphite, notices.clone())),
                github: Rc::new(PreviewGitHub::new(gateways.github, notices.clone())),
                agent: Rc::new(PreviewAgent::new(gateways.agent, notices)),
            };
        }
        if verbose {
            gateways = Gateways {
                git: Rc::new(VerboseGit::new(gateways.git, sink.clone())),
                graphite: Rc::new(VerboseGraphite::new(gateways.graphite, sink.clone())),
                github: Rc::new(VerboseGitHub::new(gateways.github, sink.clone())),
                agent: Rc::new(VerboseAgent::new(gateways.agent, sink)),
            };
        }
        gateways
    }
}

/// Everything an execution step may use.
pub struct ErkContext {
    pub git: Rc<dyn Git>,
    pub graphite: Rc<dyn Graphite>,
    pub github: Rc<dyn GitHub>,
    pub agent: Rc<dyn AgentExecutor>,
    pub branches: BranchManager,
    pub config: ErkConfig,
    /// Directory erk was invoked from.
    pub cwd: PathBuf,
    /// Worktree containing `cwd`.
    pub worktree: PathBuf,
    /// Main checkout of the repository.
    pub root_worktree: PathBuf,
    /// Git directory shared by every worktree.
    pub common_dir: PathBuf,
    /// Command that generated scripts invoke.
    pub program: String,
    pub dry_run: bool,
}

impl ErkContext {
    /// Resolve repository paths and the branch backend for `cwd`.
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn new(cwd: PathBuf, config: ErkConfig, gateways: Gateways) -> Result<Self> {
        let Gateways {
            git,
            graphite,
            github,
            agent,
        } = gateways;

        let worktree = git
            .repo_root(&cwd)
            .context("locate worktree")?
            .ok_or_else(|| anyhow!("{} is not inside a git repository", cwd.display()))?;
        let common_dir = git
            .common_dir(&cwd)
            .context("locate git common dir")?
            .ok_or_else(|| anyhow!("could not resolve git common dir for {}", cwd.display()))?;
        let bindings = git.list_worktrees(&worktree).context("list worktrees")?;
        let root_worktree = root_binding(&bindings)
            .map(|b| b.path.clone())
            .unwrap_or_else(|| worktree.clone());

        let initialized = graphite
            .is_initialized(&common_dir)
            .context("probe graphite")?;
        let backend = resolve_backend(config.backend, graphite.is_available(), initialized)
            .context("backend = \"graphite\" in .erk/config.toml")?;
        debug!(%backend, worktree = %worktree.display(), "resolved context");

        let branches = BranchManager::new(backend, git.clone(), graphite.clone(), common_dir.clone());
        Ok(Self {
            git,
            graphite,
            github,
            agent,
            branches,
            config,
            cwd,
            worktree,
            root_worktree,
            common_dir,
            program: "erk".to_string(),
            dry_run: false,
        })
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Trunk branch: config override, else detected from the remote.
    pub fn trunk(&self) -> Result<String, StepError> {
        if let Some(trunk) = &self.config.trunk {
            return Ok(trunk.clone());
        }
        self.git
            .trunk_branch(&self.root_worktree)?
            .ok_or_else(|| {
                StepError::precondition("could not detect the trunk branch")
                    .with_hint("set trunk = \"main\" in .erk/config.toml")
            })
    }

    /// Where a dedicated worktree for `branch` is created.
    pub fn worktree_path_for(&self, branch: &str) -> PathBuf {
        self.config
            .worktrees_dir_for(&self.root_worktree)
            .join(crate::core::names::worktree_dir_name(branch))
    }
}

/// Validation steps additionally get to ask the user.
pub struct ValidationContext<'a> {
    pub erk: &'a ErkContext,
    pub confirm: &'a dyn Confirm,
}

/// Load config for the repository containing `cwd`, before gateways exist.
///
/// Outside a repository the defaults are returned; context construction
/// reports the missing repository afterwards.
pub fn load_repo_config(cwd: &Path) -> Result<ErkConfig> {
    let probe = LiveGit::new(ProcessRunner::new(PROBE_TIMEOUT));
    let bindings = match probe.repo_root(cwd).context("locate worktree")? {
        Some(worktree) => probe.list_worktrees(&worktree).context("list worktrees")?,
        None => return Ok(ErkConfig::default()),
    };
    match root_binding(&bindings) {
        Some(root) => load_config(&config_path(&root.path)),
        None => Ok(ErkConfig::default()),
    }
}
