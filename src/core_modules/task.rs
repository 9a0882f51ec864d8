// THEORY:
// A `Task` is one atomic robot behavior with a three-call lifecycle:
//
//   CREATED --initialize()--> RUNNING --update()*--> done --finish()--> DONE(outcome)
//
// The trait is what behaviors implement. The lifecycle discipline is enforced by
// two wrapper types instead of runtime flags:
//
// - `PendingTask` can only be initialized, which consumes it.
// - `RunningTask` can be updated and finished; `finish` consumes it.
//
// Because `finish` takes the running task by value, nothing can call `update`
// on a task that has been finished, and an owner holding an
// `Option<RunningTask>` can never have two active tasks at once.
//
// A task that never reports done keeps its owner waiting. Time limits belong
// inside the task (see `tasks::AwaitStatus`).

use std::fmt::{self, Debug};
use tracing::debug;

/// Terminal result of a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failure,
}

impl TaskOutcome {
    pub fn from_done(done: bool) -> Self {
        if done { TaskOutcome::Success } else { TaskOutcome::Failure }
    }

    pub fn is_success(self) -> bool {
        self == TaskOutcome::Success
    }
}

/// Observable lifecycle state, for telemetry and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Done(TaskOutcome),
}

/// An atomic behavior. Implementors only describe the behavior; ordering is
/// guaranteed by `PendingTask`/`RunningTask`.
pub trait Task: Send {
    fn name(&self) -> &str;

    /// One-time setup, e.g. committing a setpoint.
    fn initialize(&mut self);

    /// Called once per control tick while running.
    fn update(&mut self);

    fn is_done(&self) -> bool;

    /// Called exactly once, also when the task is cancelled before it is done.
    fn finish(&mut self) -> TaskOutcome;
}

/// A task that has not been initialized yet.
pub struct PendingTask {
    task: Box<dyn Task>,
}

impl PendingTask {
    pub fn new(task: Box<dyn Task>) -> Self {
        Self { task }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn initialize(mut self) -> RunningTask {
        debug!(task = self.task.name(), "initialize");
        self.task.initialize();
        RunningTask { task: self.task }
    }
}

impl Debug for PendingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask").field("name", &self.task.name()).finish()
    }
}

/// An initialized task that has not been finished.
pub struct RunningTask {
    task: Box<dyn Task>,
}

impl RunningTask {
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Advances the task one tick and reports whether it is now done.
    pub fn update(&mut self) -> bool {
        self.task.update();
        self.task.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.task.is_done()
    }

    pub fn finish(mut self) -> TaskOutcome {
        let outcome = self.task.finish();
        debug!(task = self.task.name(), ?outcome, "finish");
        outcome
    }
}

impl Debug for RunningTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningTask")
            .field("name", &self.task.name())
            .field("done", &self.task.is_done())
            .finish()
    }
}
