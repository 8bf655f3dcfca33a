//! Test-only helpers: simulated environments, scripted prompts, real repos.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};

use crate::context::{ErkContext, Gateways};
use crate::core::types::PullRequest;
use crate::io::agent::SimulatedAgent;
use crate::io::config::{BackendPreference, ErkConfig};
use crate::io::confirm::Confirm;
use crate::io::git::SimulatedGit;
use crate::io::github::SimulatedGitHub;
use crate::io::graphite::SimulatedGraphite;
use crate::io::sink::{MemorySink, TraceSink};

/// Root worktree of every simulated repository.
pub const SIMULATED_ROOT: &str = "/repo";

/// Simulated gateways plus config, seeded through builder methods.
///
/// Builders must run before [`SimulatedEnv::context`] shares the gateways.
pub struct SimulatedEnv {
    pub git: Rc<SimulatedGit>,
    pub graphite: Rc<SimulatedGraphite>,
    pub github: Rc<SimulatedGitHub>,
    pub agent: Rc<SimulatedAgent>,
    pub config: ErkConfig,
}

impl Default for SimulatedEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEnv {
    /// `/repo` on `main`, Graphite installed and initialized, no pull requests.
    pub fn new() -> Self {
        Self::with_gateways(SimulatedGit::new(SIMULATED_ROOT), SimulatedGraphite::new())
    }

    pub fn with_gateways(git: SimulatedGit, graphite: SimulatedGraphite) -> Self {
        Self {
            git: Rc::new(git),
            graphite: Rc::new(graphite),
            github: Rc::new(SimulatedGitHub::new()),
            agent: Rc::new(SimulatedAgent::new()),
            config: ErkConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ErkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_agent(mut self, agent: SimulatedAgent) -> Self {
        self.agent = Rc::new(agent);
        self
    }

    pub fn with_branch(mut self, name: &str) -> Self {
        self.git = Rc::new(unshared(self.git).with_branch(name));
        self
    }

    pub fn with_dirty(mut self, worktree: &str) -> Self {
        self.git = Rc::new(unshared(self.git).with_dirty(worktree));
        self
    }

    pub fn with_tracked(mut self, branch: &str, parent: &str) -> Self {
        self.graphite = Rc::new(unshared(self.graphite).with_tracked(branch, parent));
        self
    }

    pub fn with_pull_request(mut self, pr: PullRequest) -> Self {
        self.github = Rc::new(unshared(self.github).with_pull_request(pr));
        self
    }

    /// `branch` stacked on `main`, checked out at `path`, with open PR `number`.
    pub fn with_feature_worktree(mut self, branch: &str, path: &str, number: u64) -> Self {
        self.git = Rc::new(unshared(self.git).with_worktree(path, Some(branch)));
        self.github = Rc::new(unshared(self.github).with_open_pr(number, branch, "main"));
        self.with_tracked(branch, "main")
    }

    /// Open PR `number` from `head` into `base`, with `head` stacked on `base`.
    pub fn with_stacked_pr(mut self, number: u64, head: &str, base: &str) -> Self {
        self.github = Rc::new(unshared(self.github).with_open_pr(number, head, base));
        self.with_tracked(head, base)
    }

    pub fn gateways(&self) -> Gateways {
        Gateways {
            git: self.git.clone(),
            graphite: self.graphite.clone(),
            github: self.github.clone(),
            agent: self.agent.clone(),
        }
    }

    /// Context for a command run from the root worktree.
    pub fn context(&self) -> Result<ErkContext> {
        self.context_at(SIMULATED_ROOT)
    }

    pub fn context_at(&self, cwd: impl Into<PathBuf>) -> Result<ErkContext> {
        ErkContext::new(cwd.into(), self.config.clone(), self.gateways())
    }

    /// Context as `--dry-run` builds it: Preview over the simulated gateways.
    pub fn dry_run_context_at(&self, cwd: impl Into<PathBuf>) -> Result<ErkContext> {
        let sink: Rc<dyn TraceSink> = Rc::new(MemorySink::new());
        let gateways = self.gateways().wrap(true, false, sink);
        Ok(ErkContext::new(cwd.into(), self.config.clone(), gateways)?.with_dry_run(true))
    }

    /// Panics if any simulated gateway logged a mutation.
    pub fn assert_no_mutations(&self) {
        assert_eq!(self.git.mutation_count(), 0, "git mutations: {:?}", self.git);
        assert_eq!(
            self.graphite.mutation_count(),
            0,
            "graphite mutations: {:?}",
            self.graphite
        );
        assert_eq!(self.github.mutation_count(), 0, "github mutations: {:?}", self.github);
        assert_eq!(self.agent.mutation_count(), 0, "agent calls: {:?}", self.agent);
    }
}

fn unshared<T: std::fmt::Debug>(gateway: Rc<T>) -> T {
    Rc::try_unwrap(gateway).expect("seed SimulatedEnv before building a context")
}

/// Answers confirmations from a fixed script and records the questions.
pub struct ScriptedConfirm {
    answers: RefCell<VecDeque<bool>>,
    questions: RefCell<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            questions: RefCell::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, question: &str) -> Result<bool> {
        self.questions.borrow_mut().push(question.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected confirmation: {question}"))
    }
}

/// A real git repository in a temporary directory, on `main` with one commit.
pub struct TestRepo {
    _temp: tempfile::TempDir,
    root: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        // git reports canonical paths; compare against the same form.
        let dir = temp.path().join("repo");
        std::fs::create_dir_all(&dir).context("create repo dir")?;
        let root = dir.canonicalize().context("canonicalize repo dir")?;
        let repo = Self { _temp: temp, root };
        repo.git(&["-c", "init.defaultBranch=main", "init", "-q"])?;
        repo.git(&["config", "user.name", "erk tests"])?;
        repo.git(&["config", "user.email", "erk@example.invalid"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.git(&["commit", "-q", "--allow-empty", "-m", "initial"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Run git in the repository root and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.root, args)
    }

    /// Context over live gateways with the plain git backend.
    pub fn live_context(&self) -> Result<ErkContext> {
        let config = ErkConfig {
            backend: BackendPreference::Git,
            ..ErkConfig::default()
        };
        ErkContext::new(self.root.clone(), config.clone(), Gateways::live(&config))
    }
}

/// Run git in `dir`, failing on a non-zero exit.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
