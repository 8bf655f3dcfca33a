//! Rendering of deferred-execution scripts.
//!
//! A [`GeneratedScript`] re-invokes erk in execution mode with every
//! pre-resolved flag, then performs the shell-level follow-ups (changing
//! directory, re-sourcing an environment) that a child process cannot do for
//! its parent shell. Rendering is pure: the same script value always renders
//! to the same text.

use std::path::PathBuf;

use thiserror::Error;

/// Shell-level action appended after the execution line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    ChangeDir(PathBuf),
    Source(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script fragment {index} contains a newline or NUL")]
    MultilineFragment { index: usize },
    #[error("script has no command to run")]
    EmptyInvocation,
}

/// A replayable hand-off between the validating and the executing process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    /// Program followed by its arguments, unescaped.
    pub invocation: Vec<String>,
    pub follow_ups: Vec<FollowUp>,
}

impl GeneratedScript {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let mut invocation = vec![program.into()];
        invocation.extend(args);
        Self {
            invocation,
            follow_ups: Vec::new(),
        }
    }

    pub fn change_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.follow_ups.push(FollowUp::ChangeDir(path.into()));
        self
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.follow_ups.push(FollowUp::Source(path.into()));
        self
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.invocation.get(1..).unwrap_or_default()
    }

    /// Render as POSIX shell text ending in a newline.
    pub fn render(&self) -> Result<String, ScriptError> {
        if self.invocation.is_empty() {
            return Err(ScriptError::EmptyInvocation);
        }
        let mut fragments: Vec<String> = self.invocation.clone();
        for follow_up in &self.follow_ups {
            let path = match follow_up {
                FollowUp::ChangeDir(path) | FollowUp::Source(path) => path,
            };
            fragments.push(path.display().to_string());
        }
        if let Some(index) = fragments
            .iter()
            .position(|f| f.contains('\n') || f.contains('\r') || f.contains('\0'))
        {
            return Err(ScriptError::MultilineFragment { index });
        }

        let mut lines = vec!["#!/bin/sh".to_string(), "set -eu".to_string()];
        lines.push(
            self.invocation
                .iter()
                .map(|arg| shell_escape(arg))
                .collect::<Vec<_>>()
                .join(" "),
        );
        for follow_up in &self.follow_ups {
            lines.push(match follow_up {
                FollowUp::ChangeDir(path) => {
                    format!("cd {}", shell_escape(&path.display().to_string()))
                }
                FollowUp::Source(path) => {
                    format!(". {}", shell_escape(&path.display().to_string()))
                }
            });
        }
        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out)
    }
}

/// Quote `s` for a POSIX shell, leaving plain words untouched.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}
