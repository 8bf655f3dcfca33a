use std::rc::Rc;

use super::{
    AgentError, AgentExecutor, WorkflowOutcome, WorkflowRequest, take_over_action,
    workflow_action,
};
use crate::core::types::MutationReport;
use crate::io::sink::{TraceSink, preview_notice};

/// Dry-run decorator for [`AgentExecutor`]; the agent never starts.
pub struct PreviewAgent {
    inner: Rc<dyn AgentExecutor>,
    sink: Option<Rc<dyn TraceSink>>,
}

impl PreviewAgent {
    pub fn new(inner: Rc<dyn AgentExecutor>, sink: Option<Rc<dyn TraceSink>>) -> Self {
        Self { inner, sink }
    }
}

impl AgentExecutor for PreviewAgent {
    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn run_workflow(&self, request: &WorkflowRequest) -> Result<WorkflowOutcome, AgentError> {
        let action = workflow_action(request);
        preview_notice(self.sink.as_ref(), &action);
        Ok(WorkflowOutcome {
            report: MutationReport::previewed(action),
            exit_code: None,
            summary: String::new(),
        })
    }

    fn take_over(&self, request: &WorkflowRequest) -> Result<MutationReport, AgentError> {
        let action = take_over_action(request);
        preview_notice(self.sink.as_ref(), &action);
        Ok(MutationReport::previewed(action))
    }
}
