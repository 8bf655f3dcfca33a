//! Subprocess implementation of [`AgentExecutor`].

use std::path::Path;
use std::process::Command;

use tracing::{debug, info, instrument, warn};

use super::{AgentError, AgentExecutor, WorkflowOutcome, WorkflowRequest, workflow_action};
use crate::core::types::MutationReport;
use crate::io::process::ProcessRunner;

/// Lines of agent output kept in [`WorkflowOutcome::summary`].
const SUMMARY_LINES: usize = 20;

/// Runs the configured agent command (default `claude`).
#[derive(Debug, Clone)]
pub struct LiveAgent {
    command: Vec<String>,
    runner: ProcessRunner,
}

impl LiveAgent {
    pub fn new(command: Vec<String>, runner: ProcessRunner) -> Self {
        Self { command, runner }
    }

    fn program(&self) -> Result<&str, AgentError> {
        self.command
            .first()
            .map(String::as_str)
            .ok_or_else(|| AgentError::Infrastructure("agent command is empty".to_string()))
    }
}

fn summarize(stdout: &str) -> String {
    let lines: Vec<&str> = stdout.lines().collect();
    let start = lines.len().saturating_sub(SUMMARY_LINES);
    lines[start..].join("\n")
}

impl AgentExecutor for LiveAgent {
    fn is_available(&self) -> bool {
        self.program().is_ok_and(|program| which::which(program).is_ok())
    }

    #[instrument(skip_all, fields(worktree = %request.worktree.display(), timeout_secs = request.timeout.as_secs()))]
    fn run_workflow(&self, request: &WorkflowRequest) -> Result<WorkflowOutcome, AgentError> {
        let program = self.program()?;
        if !self.is_available() {
            return Err(AgentError::NotInstalled(program.to_string()));
        }
        let prompt = request.agent_prompt();
        let mut args: Vec<&str> = self.command[1..].iter().map(String::as_str).collect();
        args.extend(["--print", prompt.as_str()]);

        info!(workflow = %request.workflow, "starting headless agent workflow");
        let output = self
            .runner
            .with_timeout(request.timeout)
            .run(program, &args, &request.worktree)
            .map_err(|e| AgentError::Infrastructure(format!("{e:#}")))?;

        if output.timed_out {
            warn!("agent workflow timed out");
            return Err(AgentError::TimedOut(request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent workflow failed");
            return Err(AgentError::WorkflowFailed {
                exit_code: output.status.code(),
                stderr: output.stderr_text(),
            });
        }
        debug!("agent workflow completed");
        Ok(WorkflowOutcome {
            report: MutationReport::applied(workflow_action(request)),
            exit_code: output.status.code(),
            summary: summarize(&output.stdout_text()),
        })
    }

    /// Replaces the current process with an interactive agent session.
    ///
    /// Returns only when the agent could not be started.
    #[instrument(skip_all, fields(worktree = %request.worktree.display()))]
    fn take_over(&self, request: &WorkflowRequest) -> Result<MutationReport, AgentError> {
        let program = self.program()?;
        if !self.is_available() {
            return Err(AgentError::NotInstalled(program.to_string()));
        }
        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]).current_dir(&request.worktree);
        let prompt = request.agent_prompt();
        if !prompt.is_empty() {
            cmd.arg(prompt);
        }
        info!("handing the terminal to the agent");
        Err(exec(cmd, &request.worktree))
    }
}

#[cfg(unix)]
fn exec(mut cmd: Command, worktree: &Path) -> AgentError {
    use std::os::unix::process::CommandExt;

    let err = cmd.exec();
    AgentError::Infrastructure(format!(
        "exec agent in {}: {err}",
        worktree.display()
    ))
}

#[cfg(not(unix))]
fn exec(_cmd: Command, _worktree: &Path) -> AgentError {
    AgentError::Infrastructure("handing the terminal to the agent requires a unix platform".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn request(worktree: &Path) -> WorkflowRequest {
        WorkflowRequest {
            worktree: worktree.to_path_buf(),
            workflow: String::new(),
            prompt: "ignored".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn summary_keeps_tail_of_output() {
        let text: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let summary = summarize(&text);
        assert!(summary.starts_with("line 10"));
        assert!(summary.ends_with("line 29"));
    }

    /// `sh -c` stands in for the agent: extra arguments become positional
    /// parameters, so the script controls the exit code.
    #[test]
    fn failing_workflow_reports_exit_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        let agent = LiveAgent::new(
            vec!["sh".to_string(), "-c".to_string(), "echo broke >&2; exit 4".to_string()],
            ProcessRunner::new(Duration::from_secs(10)),
        );
        let err = agent.run_workflow(&request(temp.path())).unwrap_err();
        assert_eq!(
            err,
            AgentError::WorkflowFailed {
                exit_code: Some(4),
                stderr: "broke".to_string(),
            }
        );
    }

    #[test]
    fn successful_workflow_is_applied() {
        let temp = tempfile::tempdir().expect("tempdir");
        let agent = LiveAgent::new(
            vec!["sh".to_string(), "-c".to_string(), "echo done".to_string()],
            ProcessRunner::new(Duration::from_secs(10)),
        );
        let outcome = agent.run_workflow(&request(temp.path())).expect("run");
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.summary, "done");
    }

    #[test]
    fn missing_binary_is_not_installed() {
        let agent = LiveAgent::new(
            vec!["erk-test-no-such-agent".to_string()],
            ProcessRunner::new(Duration::from_secs(10)),
        );
        assert!(!agent.is_available());
        let err = agent
            .run_workflow(&request(&PathBuf::from("/")))
            .unwrap_err();
        assert_eq!(
            err,
            AgentError::NotInstalled("erk-test-no-such-agent".to_string())
        );
    }
}
