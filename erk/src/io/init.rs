//! `erk init`: write the repository config.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use super::config::{ErkConfig, config_path, write_config};

/// Options for [`init_repo`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub config_path: PathBuf,
    /// False when an existing config was left alone.
    pub written: bool,
}

/// Write the default `.erk/config.toml` under `root`.
pub fn init_repo(root: &Path, options: &InitOptions) -> Result<InitOutcome> {
    let path = config_path(root);
    if path.exists() && !options.force {
        return Ok(InitOutcome {
            config_path: path,
            written: false,
        });
    }
    write_config(&path, &ErkConfig::default())?;
    info!(path = %path.display(), "wrote config");
    Ok(InitOutcome {
        config_path: path,
        written: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    #[test]
    fn init_keeps_existing_config_unless_forced() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = init_repo(temp.path(), &InitOptions { force: false }).expect("init");
        assert!(first.written);
        assert_eq!(load_config(&first.config_path).expect("load"), ErkConfig::default());

        std::fs::write(&first.config_path, "trunk = \"develop\"\n").expect("edit");
        let second = init_repo(temp.path(), &InitOptions { force: false }).expect("init");
        assert!(!second.written);
        assert_eq!(
            load_config(&second.config_path).expect("load").trunk.as_deref(),
            Some("develop")
        );

        let forced = init_repo(temp.path(), &InitOptions { force: true }).expect("init");
        assert!(forced.written);
        assert_eq!(load_config(&forced.config_path).expect("load").trunk, None);
    }
}
