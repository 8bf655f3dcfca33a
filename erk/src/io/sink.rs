//! Side-channel output for preview and verbose gateway wrappers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Receives human-readable trace lines.
pub trait TraceSink {
    fn emit(&self, line: &str);
}

impl<T: TraceSink + ?Sized> TraceSink for Rc<T> {
    fn emit(&self, line: &str) {
        (**self).emit(line);
    }
}

/// Writes trace lines to stderr, keeping stdout for machine-readable output.
pub struct StderrSink;

impl TraceSink for StderrSink {
    fn emit(&self, line: &str) {
        eprintln!("{line}");
    }
}

/// Collects trace lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: RefCell<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl TraceSink for MemorySink {
    fn emit(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

/// Emit `call -> result` for a verbose wrapper.
pub fn trace_call<T: fmt::Debug, E: fmt::Display>(
    sink: &dyn TraceSink,
    call: &str,
    result: &Result<T, E>,
) {
    match result {
        Ok(value) => sink.emit(&format!("[trace] {call} -> {value:?}")),
        Err(err) => sink.emit(&format!("[trace] {call} -> error: {err}")),
    }
}

/// Emit a preview notice for a suppressed mutation.
pub fn preview_notice(sink: Option<&Rc<dyn TraceSink>>, action: &str) {
    if let Some(sink) = sink {
        sink.emit(&format!("[dry-run] would {action}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_formats_ok_and_err() {
        let sink = MemorySink::new();
        trace_call::<bool, String>(&sink, "git.branch_exists(x)", &Ok(true));
        trace_call::<bool, String>(&sink, "git.branch_exists(y)", &Err("boom".into()));
        assert_eq!(
            sink.lines(),
            vec![
                "[trace] git.branch_exists(x) -> true".to_string(),
                "[trace] git.branch_exists(y) -> error: boom".to_string(),
            ]
        );
    }
}
