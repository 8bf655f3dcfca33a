//! Coding-agent gateway (Claude, binary `claude`).
//!
//! Two ways to hand work to the agent:
//!
//! - [`AgentExecutor::run_workflow`] runs a headless workflow to completion and
//!   reports how it ended.
//! - [`AgentExecutor::take_over`] gives the agent the terminal. The live
//!   implementation replaces the erk process and never returns on success;
//!   the simulated and preview implementations record the call and return
//!   `Ok`. Callers must treat `Ok` from `take_over` as "nothing left to do".

mod live;
mod preview;
mod simulated;
mod verbose;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::errors::StepError;
use crate::core::types::MutationReport;

pub use live::LiveAgent;
pub use preview::PreviewAgent;
pub use simulated::SimulatedAgent;
pub use verbose::VerboseAgent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("agent command '{0}' is not installed")]
    NotInstalled(String),
    #[error("agent workflow timed out after {0:?}")]
    TimedOut(Duration),
    #[error("agent workflow failed (exit code {exit_code:?}): {stderr}")]
    WorkflowFailed { exit_code: Option<i32>, stderr: String },
    #[error("agent unavailable: {0}")]
    Infrastructure(String),
}

impl From<AgentError> for StepError {
    fn from(err: AgentError) -> Self {
        let message = err.to_string();
        match err {
            AgentError::NotInstalled(_) => StepError::precondition(message)
                .with_hint("install the agent CLI or set agent.command in .erk/config.toml"),
            AgentError::TimedOut(_)
            | AgentError::WorkflowFailed { .. }
            | AgentError::Infrastructure(_) => StepError::infrastructure(message),
        }
    }
}

/// Parameters for an agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRequest {
    /// Worktree the agent works in.
    pub worktree: PathBuf,
    /// Slash-command workflow, e.g. `erk:plan-implement`. Empty for a bare prompt.
    pub workflow: String,
    pub prompt: String,
    /// Only applies to headless runs.
    pub timeout: Duration,
}

impl WorkflowRequest {
    /// Text handed to the agent: `/<workflow> <prompt>`.
    pub fn agent_prompt(&self) -> String {
        match (self.workflow.is_empty(), self.prompt.is_empty()) {
            (true, _) => self.prompt.clone(),
            (false, true) => format!("/{}", self.workflow),
            (false, false) => format!("/{} {}", self.workflow, self.prompt),
        }
    }
}

/// How a headless workflow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOutcome {
    pub report: MutationReport,
    /// `None` when the workflow did not actually run.
    pub exit_code: Option<i32>,
    /// Last lines of agent output.
    pub summary: String,
}

pub trait AgentExecutor {
    fn is_available(&self) -> bool;
    fn run_workflow(&self, request: &WorkflowRequest) -> Result<WorkflowOutcome, AgentError>;
    /// Hand the terminal to an interactive agent session.
    fn take_over(&self, request: &WorkflowRequest) -> Result<MutationReport, AgentError>;
}

pub(crate) fn workflow_action(request: &WorkflowRequest) -> String {
    format!(
        "run agent workflow '{}' in {}",
        request.agent_prompt(),
        request.worktree.display()
    )
}

pub(crate) fn take_over_action(request: &WorkflowRequest) -> String {
    format!(
        "hand the terminal to the agent in {}",
        request.worktree.display()
    )
}
