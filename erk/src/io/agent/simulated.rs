//! Recording [`AgentExecutor`] for tests.

use std::cell::RefCell;

use super::{
    AgentError, AgentExecutor, WorkflowOutcome, WorkflowRequest, take_over_action,
    workflow_action,
};
use crate::core::types::MutationReport;

#[derive(Debug)]
pub struct SimulatedAgent {
    available: bool,
    workflows: RefCell<Vec<WorkflowRequest>>,
    take_overs: RefCell<Vec<WorkflowRequest>>,
    next_failure: RefCell<Option<AgentError>>,
}

impl SimulatedAgent {
    pub fn new() -> Self {
        Self {
            available: true,
            workflows: RefCell::new(Vec::new()),
            take_overs: RefCell::new(Vec::new()),
            next_failure: RefCell::new(None),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Make the next workflow run fail with `err`.
    pub fn fail_next(&self, err: AgentError) {
        *self.next_failure.borrow_mut() = Some(err);
    }

    pub fn workflows(&self) -> Vec<WorkflowRequest> {
        self.workflows.borrow().clone()
    }

    pub fn take_overs(&self) -> Vec<WorkflowRequest> {
        self.take_overs.borrow().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.workflows.borrow().len() + self.take_overs.borrow().len()
    }
}

impl Default for SimulatedAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentExecutor for SimulatedAgent {
    fn is_available(&self) -> bool {
        self.available
    }

    fn run_workflow(&self, request: &WorkflowRequest) -> Result<WorkflowOutcome, AgentError> {
        if !self.available {
            return Err(AgentError::NotInstalled("claude".to_string()));
        }
        if let Some(err) = self.next_failure.borrow_mut().take() {
            return Err(err);
        }
        self.workflows.borrow_mut().push(request.clone());
        Ok(WorkflowOutcome {
            report: MutationReport::applied(workflow_action(request)),
            exit_code: Some(0),
            summary: String::new(),
        })
    }

    fn take_over(&self, request: &WorkflowRequest) -> Result<MutationReport, AgentError> {
        if !self.available {
            return Err(AgentError::NotInstalled("claude".to_string()));
        }
        self.take_overs.borrow_mut().push(request.clone());
        Ok(MutationReport::applied(take_over_action(request)))
    }
}
