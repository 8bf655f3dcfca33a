//! Error taxonomy for pipeline steps.
//!
//! Steps report a [`StepError`]; the pipeline runner attaches the step identity
//! and progress to produce a [`PipelineError`]. Only the top-level command
//! handler turns a `PipelineError` into exit codes and user-facing text.

use std::fmt;

use thiserror::Error;

/// Classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A requirement checked during validation is not met. Never retried.
    Precondition,
    /// The mutation target is unavailable (branch held elsewhere, merge conflict).
    Conflict,
    /// An execution step failed after an earlier step already mutated state.
    PartialMutation,
    /// The external tool is unreachable or misbehaving.
    Infrastructure,
    /// Programmer error, e.g. execution started without a validated field.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Precondition => "precondition failed",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PartialMutation => "partially applied",
            ErrorKind::Infrastructure => "infrastructure error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(label)
    }
}

/// Failure reported by a single step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
    /// Machine-actionable remediation, e.g. a command to run.
    pub hint: Option<String>,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Precondition, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infrastructure, message)
    }

    /// Execution reached a point validation should have ruled out.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Shorthand for a missing execution-phase field.
    pub fn missing_field(field: &str) -> Self {
        Self::internal(format!(
            "execution state is missing '{field}' (validation must run before execution)"
        ))
    }
}

/// Borrow a field validation must have filled in.
pub fn required<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, StepError> {
    value.as_ref().ok_or_else(|| StepError::missing_field(field))
}

/// Terminal failure of a pipeline run.
///
/// Carries the failing step plus the steps that completed before it and the
/// steps that never ran, so users can resume or reverse by hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step}: {message}")]
pub struct PipelineError {
    pub step: &'static str,
    pub kind: ErrorKind,
    /// Kind the step itself reported (differs from `kind` once upgraded to
    /// [`ErrorKind::PartialMutation`]).
    pub origin: ErrorKind,
    pub message: String,
    pub hint: Option<String>,
    pub completed: Vec<&'static str>,
    pub pending: Vec<&'static str>,
}

impl PipelineError {
    pub fn is_partial(&self) -> bool {
        self.kind == ErrorKind::PartialMutation
    }
}
