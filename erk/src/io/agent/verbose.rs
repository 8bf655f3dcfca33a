use std::rc::Rc;

use super::{AgentError, AgentExecutor, WorkflowOutcome, WorkflowRequest};
use crate::core::types::MutationReport;
use crate::io::sink::{TraceSink, trace_call};

/// Tracing decorator for [`AgentExecutor`].
pub struct VerboseAgent {
    inner: Rc<dyn AgentExecutor>,
    sink: Rc<dyn TraceSink>,
}

impl VerboseAgent {
    pub fn new(inner: Rc<dyn AgentExecutor>, sink: Rc<dyn TraceSink>) -> Self {
        Self { inner, sink }
    }
}

impl AgentExecutor for VerboseAgent {
    fn is_available(&self) -> bool {
        let available = self.inner.is_available();
        self.sink
            .emit(&format!("[trace] agent.is_available() -> {available}"));
        available
    }

    fn run_workflow(&self, request: &WorkflowRequest) -> Result<WorkflowOutcome, AgentError> {
        let result = self.inner.run_workflow(request);
        let call = format!("agent.run_workflow({})", request.agent_prompt());
        trace_call(self.sink.as_ref(), &call, &result.as_ref().map(|o| &o.report));
        result
    }

    fn take_over(&self, request: &WorkflowRequest) -> Result<MutationReport, AgentError> {
        // The live agent replaces this process, so trace before handing over.
        self.sink.emit(&format!(
            "[trace] agent.take_over({}) ...",
            request.worktree.display()
        ));
        let result = self.inner.take_over(request);
        trace_call(self.sink.as_ref(), "agent.take_over", &result);
        result
    }
}
