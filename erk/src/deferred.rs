//! Hand-off from a validating process to an executing one.
//!
//! A process cannot change its parent shell's directory. Commands that must
//! move the shell (or that delete the worktree the shell stands in) validate,
//! then write a script that re-invokes erk in execution mode followed by `cd`.
//! The user sources the script; nothing else carries state between the two
//! processes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::context::ErkContext;
use crate::core::script::GeneratedScript;
use crate::core::types::MutationReport;
use crate::io::script_store::write_script;

/// Where a deferred command left its script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredScript {
    pub path: PathBuf,
    pub destination: PathBuf,
}

impl DeferredScript {
    /// Shell instructions printed to stderr.
    pub fn instructions(&self) -> String {
        format!(
            "To finish and move to {}, run:\n  source {}",
            self.destination.display(),
            self.path.display()
        )
    }
}

/// Result of a command that may hand its execution phase to a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Everything ran in this process.
    Completed {
        reports: Vec<MutationReport>,
        /// Where the shell would have to move (dry runs only).
        destination: Option<PathBuf>,
    },
    /// Execution was handed to a script the user must source.
    Deferred(DeferredScript),
}

/// Build the script for `exec_args` ending in `destination`.
///
/// The exec line names the root worktree with `--repo`, so sourcing the
/// script again works even after the shell's worktree was removed. The
/// configured activation script is sourced when it exists at `destination`.
pub fn build_script(ctx: &ErkContext, exec_args: Vec<String>, destination: &Path) -> GeneratedScript {
    let mut args = vec!["--repo".to_string(), ctx.root_worktree.display().to_string()];
    args.extend(exec_args);
    let mut script = GeneratedScript::new(ctx.program.clone(), args).change_dir(destination);
    if let Some(relative) = &ctx.config.activate_script {
        let activate = destination.join(relative);
        if activate.is_file() {
            script = script.source(activate);
        }
    }
    script
}

/// Write the script for `operation` and describe it.
pub fn defer(
    ctx: &ErkContext,
    operation: &str,
    exec_args: Vec<String>,
    destination: &Path,
) -> Result<DeferredScript> {
    let script = build_script(ctx, exec_args, destination);
    let path = write_script(&ctx.common_dir, operation, &script)?;
    info!(operation, path = %path.display(), "deferred execution to script");
    Ok(DeferredScript {
        path,
        destination: destination.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;

    #[test]
    fn sources_activation_script_only_when_present() {
        let repo = TestRepo::new().expect("repo");
        let ctx = repo.live_context().expect("context");
        let dest = repo.path().to_path_buf();

        let without = build_script(&ctx, vec!["land".into()], &dest)
            .render()
            .expect("render");
        assert!(!without.contains("\n. "));

        std::fs::create_dir_all(dest.join(".venv/bin")).expect("mkdir");
        std::fs::write(dest.join(".venv/bin/activate"), "").expect("write");
        let with = build_script(&ctx, vec!["land".into()], &dest)
            .render()
            .expect("render");
        assert!(with.contains(".venv/bin/activate"));
    }

    #[test]
    fn exec_line_pins_the_root_worktree() {
        let repo = TestRepo::new().expect("repo");
        let ctx = repo.live_context().expect("context");
        let text = build_script(&ctx, vec!["land".into(), "--exec".into()], repo.path())
            .render()
            .expect("render");
        let expected = format!("--repo {} land --exec", repo.path().display());
        assert!(text.contains(&expected), "{text}");
    }

    #[test]
    fn defer_writes_into_common_dir() {
        let repo = TestRepo::new().expect("repo");
        let ctx = repo.live_context().expect("context");
        let deferred = defer(&ctx, "land", vec!["land".into(), "--exec".into()], repo.path())
            .expect("defer");
        assert!(deferred.path.starts_with(&ctx.common_dir));
        assert!(deferred.path.ends_with("erk/scripts/land.sh"));
        assert!(deferred.instructions().contains("source "));
    }
}
