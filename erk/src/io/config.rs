//! erk configuration stored under `<root worktree>/.erk/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::MergeMethod;

/// Relative location of the config file inside the root worktree.
pub const CONFIG_RELATIVE_PATH: &str = ".erk/config.toml";

/// Branch backend preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Graphite when `gt` is installed and the repo is initialized for it.
    #[default]
    Auto,
    Graphite,
    Git,
}

/// erk configuration (TOML).
///
/// Edited by humans; missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ErkConfig {
    pub backend: BackendPreference,

    /// Trunk branch override. Detected from `origin/HEAD` when unset.
    pub trunk: Option<String>,

    pub merge_method: MergeMethod,

    /// Pull trunk in the root worktree after landing.
    pub pull_after_land: bool,

    /// Label applied to a pull request right before it is merged.
    pub land_label: Option<String>,

    /// Activation script sourced after a deferred `cd`, relative to the destination.
    pub activate_script: Option<String>,

    /// Directory holding per-branch worktrees. Defaults to `../<repo>-worktrees`.
    pub worktrees_dir: Option<PathBuf>,

    /// Timeout for a single git/gt/gh invocation.
    pub command_timeout_secs: u64,

    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent command line prefix (e.g. `["claude"]`).
    pub command: Vec<String>,
    /// Budget for a headless workflow run.
    pub workflow_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string()],
            workflow_timeout_secs: 60 * 60,
        }
    }
}

impl Default for ErkConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            trunk: None,
            merge_method: MergeMethod::Squash,
            pull_after_land: true,
            land_label: None,
            activate_script: Some(".venv/bin/activate".to_string()),
            worktrees_dir: None,
            command_timeout_secs: 120,
            agent: AgentConfig::default(),
        }
    }
}

impl ErkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.agent.workflow_timeout_secs == 0 {
            return Err(anyhow!("agent.workflow_timeout_secs must be > 0"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        if let Some(trunk) = &self.trunk
            && trunk.trim().is_empty()
        {
            return Err(anyhow!("trunk must not be empty when set"));
        }
        if let Some(script) = &self.activate_script
            && Path::new(script).is_absolute()
        {
            return Err(anyhow!("activate_script must be relative (got '{script}')"));
        }
        Ok(())
    }

    /// Where new worktrees for `repo_root` are created.
    pub fn worktrees_dir_for(&self, repo_root: &Path) -> PathBuf {
        if let Some(dir) = &self.worktrees_dir {
            if dir.is_absolute() {
                return dir.clone();
            }
            return repo_root.join(dir);
        }
        let name = repo_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repo".to_string());
        let parent = repo_root.parent().unwrap_or(repo_root);
        parent.join(format!("{name}-worktrees"))
    }
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_RELATIVE_PATH)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ErkConfig::default()`.
pub fn load_config(path: &Path) -> Result<ErkConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = ErkConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ErkConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ErkConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ErkConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = config_path(temp.path());
        let cfg = ErkConfig {
            backend: BackendPreference::Git,
            trunk: Some("develop".to_string()),
            land_label: Some("landed".to_string()),
            ..ErkConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "backend = \"graphite\"\nmerge_method = \"rebase\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.backend, BackendPreference::Graphite);
        assert_eq!(cfg.merge_method, MergeMethod::Rebase);
        assert!(cfg.pull_after_land);
        assert_eq!(cfg.agent.command, vec!["claude".to_string()]);
    }

    #[test]
    fn rejects_zero_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "command_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("command_timeout_secs"));
    }

    #[test]
    fn worktrees_dir_defaults_next_to_repo() {
        let cfg = ErkConfig::default();
        assert_eq!(
            cfg.worktrees_dir_for(Path::new("/code/app")),
            PathBuf::from("/code/app-worktrees")
        );
        let cfg = ErkConfig {
            worktrees_dir: Some(PathBuf::from(".worktrees")),
            ..ErkConfig::default()
        };
        assert_eq!(
            cfg.worktrees_dir_for(Path::new("/code/app")),
            PathBuf::from("/code/app/.worktrees")
        );
    }
}
