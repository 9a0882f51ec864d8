// THEORY:
// A `Phase` is a mode-scoped, ordered list of tasks run one after another, one
// control tick at a time. It owns the cursor and is driven from outside through
// exactly three calls:
//
// - `init_phase`:   instantiate the plan, initialize the first task only. A
//                   task still running from an earlier init is finished first.
// - `update_phase`: update the current task; once it reports done, finish it
//                   and initialize the next one. With no current task this is a
//                   no-op, and a completed phase stays resident until
//                   `finish_phase`.
// - `finish_phase`: force-finish whatever is running and drop the rest. This is
//                   the only way to interrupt a phase mid-sequence.
//
// The cursor is an `Option<RunningTask>`, so at most one task is ever running.
// There is no phase-level timeout: a task that never finishes stalls the phase.
//
// What happens after a task reports `Failure` is decided by the phase's
// `FailurePolicy`. `Continue` advances exactly as on success; `Abort` drops the
// remaining tasks and marks the phase aborted.

use crate::core_modules::actuators::Actuators;
use crate::core_modules::task::{PendingTask, RunningTask, TaskOutcome, TaskState};
use crate::core_modules::tasks::TaskSpec;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Advance to the next task regardless of outcome.
    #[default]
    Continue,
    /// Stop the sequence at the first failed task.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Constructed, `init_phase` not called yet.
    Idle,
    Active,
    /// Every task finished; waiting for `finish_phase`.
    Complete,
    /// A task failed under `FailurePolicy::Abort`.
    Aborted,
    /// `finish_phase` was called.
    Finished,
}

/// Record of one finished task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub name: String,
    pub outcome: TaskOutcome,
    /// Finished by `finish_phase` rather than by completing.
    pub forced: bool,
}

#[derive(Debug)]
pub struct Phase {
    name: String,
    plan: Vec<TaskSpec>,
    actuators: Arc<dyn Actuators>,
    policy: FailurePolicy,
    pending: VecDeque<PendingTask>,
    current: Option<RunningTask>,
    finished: Vec<TaskRecord>,
    status: PhaseStatus,
}

impl Phase {
    pub fn new(
        name: impl Into<String>,
        plan: Vec<TaskSpec>,
        actuators: Arc<dyn Actuators>,
    ) -> Self {
        Self {
            name: name.into(),
            plan,
            actuators,
            policy: FailurePolicy::default(),
            pending: VecDeque::new(),
            current: None,
            finished: Vec::new(),
            status: PhaseStatus::Idle,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn init_phase(&mut self) {
        if let Some(name) = self.force_finish_current() {
            warn!(phase = %self.name, task = %name, "re-initialized with a task still running");
        }
        self.finished.clear();
        self.pending = self
            .plan
            .iter()
            .map(|spec| PendingTask::new(spec.instantiate(&self.actuators)))
            .collect();
        self.status = PhaseStatus::Active;
        info!(phase = %self.name, tasks = self.pending.len(), "phase initialized");
        self.start_next();
    }

    pub fn update_phase(&mut self) {
        let Some(running) = self.current.as_mut() else {
            return;
        };
        if !running.update() {
            return;
        }

        let Some(running) = self.current.take() else {
            return;
        };
        let name = running.name().to_string();
        let outcome = running.finish();
        self.finished.push(TaskRecord {
            name: name.clone(),
            outcome,
            forced: false,
        });

        if outcome == TaskOutcome::Failure && self.policy == FailurePolicy::Abort {
            warn!(
                phase = %self.name,
                task = %name,
                dropped = self.pending.len(),
                "task failed; aborting phase"
            );
            self.pending.clear();
            self.status = PhaseStatus::Aborted;
            return;
        }
        self.start_next();
    }

    pub fn finish_phase(&mut self) {
        self.force_finish_current();
        let dropped = self.pending.len();
        self.pending.clear();
        self.status = PhaseStatus::Finished;
        info!(phase = %self.name, dropped, "phase finished");
    }

    /// Finishes the running task, if any, and records it as forced.
    fn force_finish_current(&mut self) -> Option<String> {
        let running = self.current.take()?;
        let name = running.name().to_string();
        let outcome = running.finish();
        self.finished.push(TaskRecord {
            name: name.clone(),
            outcome,
            forced: true,
        });
        Some(name)
    }

    fn start_next(&mut self) {
        self.current = self.pending.pop_front().map(PendingTask::initialize);
        if self.current.is_none() {
            self.status = PhaseStatus::Complete;
            info!(phase = %self.name, "phase complete");
        }
    }

    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    /// Still owns a running or pending task.
    pub fn is_active(&self) -> bool {
        self.status == PhaseStatus::Active
    }

    pub fn current_task(&self) -> Option<&str> {
        self.current.as_ref().map(RunningTask::name)
    }

    pub fn finished_tasks(&self) -> &[TaskRecord] {
        &self.finished
    }

    /// State of every task instantiated by the last `init_phase`, in order.
    pub fn task_states(&self) -> Vec<TaskState> {
        self.finished
            .iter()
            .map(|record| TaskState::Done(record.outcome))
            .chain(self.current.iter().map(|_| TaskState::Running))
            .chain(self.pending.iter().map(|_| TaskState::Created))
            .collect()
    }
}
