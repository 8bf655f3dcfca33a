//! Persistence of deferred-execution scripts.
//!
//! Scripts live under `<git-common-dir>/erk/scripts/`, shared by every
//! worktree of the repository. Each logical operation owns one file name and
//! every invocation overwrites it. Scripts are never deleted automatically so
//! a failed execution can be re-sourced.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::script::GeneratedScript;

/// Deterministic path of the script for `operation`.
pub fn script_path(common_dir: &Path, operation: &str) -> PathBuf {
    common_dir
        .join("erk")
        .join("scripts")
        .join(format!("{operation}.sh"))
}

/// Render and write `script`, replacing any previous version.
pub fn write_script(common_dir: &Path, operation: &str, script: &GeneratedScript) -> Result<PathBuf> {
    let path = script_path(common_dir, operation);
    let text = script
        .render()
        .with_context(|| format!("render {operation} script"))?;
    let parent = path
        .parent()
        .with_context(|| format!("script path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;

    let tmp_path = path.with_extension("sh.tmp");
    fs::write(&tmp_path, &text)
        .with_context(|| format!("write temp script {}", tmp_path.display()))?;
    make_executable(&tmp_path)?;
    fs::rename(&tmp_path, &path).with_context(|| format!("replace script {}", path.display()))?;

    debug!(path = %path.display(), bytes = text.len(), "wrote deferred script");
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrites_previous_script() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = GeneratedScript::new("erk", vec!["land".into(), "--pr-number".into(), "1".into()]);
        let second = GeneratedScript::new("erk", vec!["land".into(), "--pr-number".into(), "2".into()]);

        let path = write_script(temp.path(), "land", &first).expect("first");
        let again = write_script(temp.path(), "land", &second).expect("second");
        assert_eq!(path, again);
        assert_eq!(path, temp.path().join("erk/scripts/land.sh"));

        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.contains("--pr-number 2"));
        assert!(!contents.contains("--pr-number 1"));
    }

    #[cfg(unix)]
    #[test]
    fn script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_script(temp.path(), "land", &GeneratedScript::new("erk", vec![]))
            .expect("write");
        let mode = fs::metadata(&path).expect("stat").permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
