//! Ordered step sequencer shared by every mutating command.
//!
//! A [`Pipeline`] threads an immutable state value through named steps. Each
//! step receives the context and the previous state by reference and returns
//! a new state or a [`StepError`]. The runner stops at the first error.
//!
//! Steps are plain `fn` pointers, so they cannot capture hidden mutable state:
//! given the same context and input state, a run is deterministic. Tests rely
//! on this to inspect intermediate states via [`Pipeline::truncated`].

use tracing::{debug, instrument, warn};

use crate::core::errors::{ErrorKind, PipelineError, StepError};

/// Which half of a command a pipeline implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Queries and confirmations only.
    Validation,
    /// Mutations only; never prompts.
    Execution,
}

/// Signature of a single step.
pub type StepFn<C, S> = fn(&C, &S) -> Result<S, StepError>;

/// A named step.
pub struct Step<C, S> {
    pub name: &'static str,
    /// True when the step changes external state.
    pub mutates: bool,
    pub run: StepFn<C, S>,
}

// Manual impls: fn pointers are Copy regardless of `C`/`S`.
impl<C, S> Clone for Step<C, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, S> Copy for Step<C, S> {}

/// Ordered list of steps for one phase of one command.
pub struct Pipeline<C, S> {
    phase: Phase,
    /// Mutations only describe themselves (`--dry-run`).
    previewing: bool,
    steps: Vec<Step<C, S>>,
}

impl<C, S> Pipeline<C, S> {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            previewing: false,
            steps: Vec::new(),
        }
    }

    /// Mark every mutation in this run as previewed. A failure then keeps its
    /// own kind, since nothing was changed.
    pub fn previewing(mut self, previewing: bool) -> Self {
        self.previewing = previewing;
        self
    }

    /// Append a read-only step.
    pub fn query(mut self, name: &'static str, run: StepFn<C, S>) -> Self {
        self.steps.push(Step {
            name,
            mutates: false,
            run,
        });
        self
    }

    /// Append a step that changes external state.
    pub fn mutation(mut self, name: &'static str, run: StepFn<C, S>) -> Self {
        self.steps.push(Step {
            name,
            mutates: true,
            run,
        });
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Copy of this pipeline keeping only the first `count` steps.
    pub fn truncated(&self, count: usize) -> Self {
        Self {
            phase: self.phase,
            previewing: self.previewing,
            steps: self.steps.iter().take(count).copied().collect(),
        }
    }

    /// Run every step in order, threading the returned state into the next.
    #[instrument(skip_all, fields(phase = ?self.phase, steps = self.steps.len()))]
    pub fn run(&self, ctx: &C, initial: S) -> Result<S, PipelineError> {
        let mut state = initial;
        let mut completed: Vec<&'static str> = Vec::new();
        let mut mutated = false;

        for (index, step) in self.steps.iter().enumerate() {
            debug!(step = step.name, "running step");
            match (step.run)(ctx, &state) {
                Ok(next) => {
                    state = next;
                    completed.push(step.name);
                    mutated |= step.mutates && !self.previewing;
                }
                Err(err) => {
                    let pending = self.steps[index + 1..].iter().map(|s| s.name).collect();
                    let kind = self.classify(err.kind, mutated);
                    warn!(step = step.name, kind = ?kind, error = %err.message, "step failed");
                    return Err(PipelineError {
                        step: step.name,
                        kind,
                        origin: err.kind,
                        message: err.message,
                        hint: err.hint,
                        completed,
                        pending,
                    });
                }
            }
        }

        Ok(state)
    }

    /// Upgrade execution failures that follow a mutation.
    fn classify(&self, origin: ErrorKind, mutated: bool) -> ErrorKind {
        if self.phase == Phase::Execution && mutated && origin != ErrorKind::Internal {
            return ErrorKind::PartialMutation;
        }
        origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        log: RefCell<Vec<&'static str>>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct Counter {
        value: u32,
        seen: Vec<u32>,
    }

    fn add_one(_: &Recorder, state: &Counter) -> Result<Counter, StepError> {
        let mut seen = state.seen.clone();
        seen.push(state.value);
        Ok(Counter {
            value: state.value + 1,
            seen,
        })
    }

    fn record_a(rec: &Recorder, state: &Counter) -> Result<Counter, StepError> {
        rec.log.borrow_mut().push("a");
        Ok(state.clone())
    }

    fn fail_b(rec: &Recorder, _: &Counter) -> Result<Counter, StepError> {
        rec.log.borrow_mut().push("b");
        Err(StepError::conflict("b is held elsewhere").with_hint("cd /elsewhere"))
    }

    fn record_c(rec: &Recorder, state: &Counter) -> Result<Counter, StepError> {
        rec.log.borrow_mut().push("c");
        Ok(state.clone())
    }

    #[test]
    fn threads_returned_state_between_steps() {
        let pipeline = Pipeline::new(Phase::Validation)
            .query("one", add_one)
            .query("two", add_one)
            .query("three", add_one);
        let out = pipeline
            .run(&Recorder::default(), Counter::default())
            .expect("run");
        assert_eq!(out.value, 3);
        assert_eq!(out.seen, vec![0, 1, 2]);
    }

    #[test]
    fn input_state_stays_valid_after_run() {
        let pipeline = Pipeline::new(Phase::Validation).query("one", add_one);
        let input = Counter::default();
        let out = pipeline.run(&Recorder::default(), input.clone()).expect("run");
        assert_eq!(input, Counter::default());
        assert_ne!(out, input);
    }

    #[test]
    fn stops_at_first_error_and_names_step() {
        let rec = Recorder::default();
        let pipeline = Pipeline::new(Phase::Execution)
            .mutation("a", record_a)
            .mutation("b", fail_b)
            .mutation("c", record_c);

        let err = pipeline.run(&rec, Counter::default()).unwrap_err();
        assert_eq!(err.step, "b");
        assert_eq!(err.kind, ErrorKind::PartialMutation);
        assert_eq!(err.origin, ErrorKind::Conflict);
        assert_eq!(err.completed, vec!["a"]);
        assert_eq!(err.pending, vec!["c"]);
        assert_eq!(err.hint.as_deref(), Some("cd /elsewhere"));
        assert_eq!(*rec.log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn failure_before_any_mutation_keeps_origin_kind() {
        let pipeline = Pipeline::new(Phase::Execution)
            .query("check", record_a)
            .mutation("b", fail_b);
        let err = pipeline
            .run(&Recorder::default(), Counter::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(!err.is_partial());
    }

    #[test]
    fn previewed_mutations_never_make_a_failure_partial() {
        let pipeline = Pipeline::new(Phase::Execution)
            .previewing(true)
            .mutation("a", record_a)
            .mutation("b", fail_b);
        let err = pipeline
            .run(&Recorder::default(), Counter::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(err.completed, vec!["a"]);
        assert!(pipeline.truncated(1).previewing);
    }

    #[test]
    fn validation_failures_are_never_partial() {
        let pipeline = Pipeline::new(Phase::Validation)
            .query("a", record_a)
            .query("b", fail_b);
        let err = pipeline
            .run(&Recorder::default(), Counter::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn truncated_runs_prefix_only() {
        let pipeline = Pipeline::new(Phase::Validation)
            .query("one", add_one)
            .query("two", add_one)
            .query("three", add_one);
        let partial = pipeline.truncated(2);
        assert_eq!(partial.names(), vec!["one", "two"]);
        let out = partial
            .run(&Recorder::default(), Counter::default())
            .expect("run");
        assert_eq!(out.value, 2);
    }

    #[test]
    fn runs_are_deterministic() {
        let pipeline = Pipeline::new(Phase::Validation)
            .query("one", add_one)
            .query("two", add_one);
        let rec = Recorder::default();
        let first = pipeline.run(&rec, Counter::default()).expect("first");
        let second = pipeline.run(&rec, Counter::default()).expect("second");
        assert_eq!(first, second);
    }
}
