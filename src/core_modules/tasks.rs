// THEORY:
// The concrete behaviors phases and controllers are built from. Each one owns
// its own completion condition (and time limit, where it has one); the phase
// engine only ever asks "are you done".
//
// `TaskSpec` is the not-yet-instantiated form a phase stores in its plan. The
// tasks themselves are created when the phase initializes, so a phase can be
// re-entered with a fresh set of tasks.

use crate::core_modules::actuators::{Actuators, Status};
use crate::core_modules::task::{Task, TaskOutcome};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Commits a winch setpoint and completes on the next tick.
#[derive(Debug)]
pub struct ExpandWinch {
    actuators: Arc<dyn Actuators>,
    target: f64,
    done: bool,
}

impl ExpandWinch {
    pub fn new(actuators: Arc<dyn Actuators>, target: f64) -> Self {
        Self {
            actuators,
            target,
            done: false,
        }
    }
}

impl Task for ExpandWinch {
    fn name(&self) -> &str {
        "expand-winch"
    }

    fn initialize(&mut self) {
        self.actuators.set_winch_target(self.target);
    }

    fn update(&mut self) {
        self.done = true;
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(&mut self) -> TaskOutcome {
        TaskOutcome::from_done(self.done)
    }
}

/// Turns in place by a relative angle until the heading error is within
/// tolerance.
#[derive(Debug)]
pub struct TurnDegrees {
    actuators: Arc<dyn Actuators>,
    degrees: f64,
    rate: f64,
    tolerance: f64,
    goal_heading: f64,
    done: bool,
}

impl TurnDegrees {
    pub fn new(actuators: Arc<dyn Actuators>, degrees: f64, rate: f64, tolerance: f64) -> Self {
        Self {
            actuators,
            degrees,
            rate: rate.abs(),
            tolerance: tolerance.abs(),
            goal_heading: 0.0,
            done: false,
        }
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    fn steer(&mut self) {
        let error = self.goal_heading - self.actuators.heading_degrees();
        if error.abs() <= self.tolerance {
            self.actuators.set_turn_rate(0.0);
            self.done = true;
        } else {
            self.actuators.set_turn_rate(self.rate.copysign(error));
        }
    }
}

impl Task for TurnDegrees {
    fn name(&self) -> &str {
        "turn-degrees"
    }

    fn initialize(&mut self) {
        self.goal_heading = self.actuators.heading_degrees() + self.degrees;
        self.steer();
    }

    fn update(&mut self) {
        if !self.done {
            self.steer();
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(&mut self) -> TaskOutcome {
        self.actuators.set_turn_rate(0.0);
        TaskOutcome::from_done(self.done)
    }
}

fn expired(started: Option<Instant>, timeout: Duration) -> bool {
    !timeout.is_zero() && started.is_some_and(|started| started.elapsed() >= timeout)
}

/// Waits for a mechanism status. A zero timeout waits indefinitely.
#[derive(Debug)]
pub struct AwaitStatus {
    actuators: Arc<dyn Actuators>,
    status: Status,
    timeout: Duration,
    started: Option<Instant>,
    reached: bool,
    timed_out: bool,
}

impl AwaitStatus {
    pub fn new(actuators: Arc<dyn Actuators>, status: Status, timeout: Duration) -> Self {
        Self {
            actuators,
            status,
            timeout,
            started: None,
            reached: false,
            timed_out: false,
        }
    }
}

impl Task for AwaitStatus {
    fn name(&self) -> &str {
        "await-status"
    }

    fn initialize(&mut self) {
        self.started = Some(Instant::now());
    }

    fn update(&mut self) {
        if self.actuators.status(self.status) {
            self.reached = true;
        } else if expired(self.started, self.timeout) {
            self.timed_out = true;
        }
    }

    fn is_done(&self) -> bool {
        self.reached || self.timed_out
    }

    fn finish(&mut self) -> TaskOutcome {
        TaskOutcome::from_done(self.reached)
    }
}

/// Commits a shooter elevation and waits until the measured angle is within
/// tolerance.
#[derive(Debug)]
pub struct SetShooterAngle {
    actuators: Arc<dyn Actuators>,
    degrees: f64,
    tolerance: f64,
    timeout: Duration,
    started: Option<Instant>,
    done: bool,
    timed_out: bool,
}

impl SetShooterAngle {
    pub fn new(actuators: Arc<dyn Actuators>, degrees: f64, tolerance: f64) -> Self {
        Self {
            actuators,
            degrees,
            tolerance: tolerance.abs(),
            timeout: Duration::ZERO,
            started: None,
            done: false,
            timed_out: false,
        }
    }

    /// Gives up with `Failure` once `timeout` has passed. Zero never gives up.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Task for SetShooterAngle {
    fn name(&self) -> &str {
        "set-shooter-angle"
    }

    fn initialize(&mut self) {
        self.started = Some(Instant::now());
        self.actuators.set_shooter_angle_target(self.degrees);
    }

    fn update(&mut self) {
        self.done = (self.actuators.shooter_angle_degrees() - self.degrees).abs() <= self.tolerance;
        self.timed_out = !self.done && expired(self.started, self.timeout);
    }

    fn is_done(&self) -> bool {
        self.done || self.timed_out
    }

    fn finish(&mut self) -> TaskOutcome {
        TaskOutcome::from_done(self.done)
    }
}

/// Commits a shooter wheel speed and waits until it is within tolerance.
#[derive(Debug)]
pub struct SetShooterSpeed {
    actuators: Arc<dyn Actuators>,
    rpm: f64,
    tolerance: f64,
    timeout: Duration,
    started: Option<Instant>,
    done: bool,
    timed_out: bool,
}

impl SetShooterSpeed {
    pub fn new(actuators: Arc<dyn Actuators>, rpm: f64, tolerance: f64) -> Self {
        Self {
            actuators,
            rpm,
            tolerance: tolerance.abs(),
            timeout: Duration::ZERO,
            started: None,
            done: false,
            timed_out: false,
        }
    }

    /// Gives up with `Failure` once `timeout` has passed. Zero never gives up.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Task for SetShooterSpeed {
    fn name(&self) -> &str {
        "set-shooter-speed"
    }

    fn initialize(&mut self) {
        self.started = Some(Instant::now());
        self.actuators.set_shooter_speed_target(self.rpm);
    }

    fn update(&mut self) {
        self.done = (self.actuators.shooter_speed_rpm() - self.rpm).abs() <= self.tolerance;
        self.timed_out = !self.done && expired(self.started, self.timeout);
    }

    fn is_done(&self) -> bool {
        self.done || self.timed_out
    }

    fn finish(&mut self) -> TaskOutcome {
        TaskOutcome::from_done(self.done)
    }
}

/// Idles for a fixed duration.
#[derive(Debug)]
pub struct Wait {
    duration: Duration,
    started: Option<Instant>,
    done: bool,
}

impl Wait {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
            done: false,
        }
    }
}

impl Task for Wait {
    fn name(&self) -> &str {
        "wait"
    }

    fn initialize(&mut self) {
        self.started = Some(Instant::now());
    }

    fn update(&mut self) {
        self.done = self.started.is_some_and(|started| started.elapsed() >= self.duration);
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(&mut self) -> TaskOutcome {
        TaskOutcome::from_done(self.done)
    }
}

pub type TaskFactory = Arc<dyn Fn() -> Box<dyn Task> + Send + Sync>;

/// Descriptor of a task in a phase plan.
#[derive(Clone)]
pub enum TaskSpec {
    ExpandWinch { target: f64 },
    TurnDegrees { degrees: f64, rate: f64, tolerance: f64 },
    AwaitStatus { status: Status, timeout: Duration },
    SetShooterAngle {
        degrees: f64,
        tolerance: f64,
        timeout: Duration,
    },
    SetShooterSpeed {
        rpm: f64,
        tolerance: f64,
        timeout: Duration,
    },
    Wait { duration: Duration },
    Custom { name: String, factory: TaskFactory },
}

impl TaskSpec {
    pub fn custom(
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Task> + Send + Sync + 'static,
    ) -> Self {
        TaskSpec::Custom {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn instantiate(&self, actuators: &Arc<dyn Actuators>) -> Box<dyn Task> {
        let actuators = Arc::clone(actuators);
        match self {
            TaskSpec::ExpandWinch { target } => Box::new(ExpandWinch::new(actuators, *target)),
            TaskSpec::TurnDegrees { degrees, rate, tolerance } => {
                Box::new(TurnDegrees::new(actuators, *degrees, *rate, *tolerance))
            }
            TaskSpec::AwaitStatus { status, timeout } => {
                Box::new(AwaitStatus::new(actuators, *status, *timeout))
            }
            TaskSpec::SetShooterAngle {
                degrees,
                tolerance,
                timeout,
            } => {
                let task = SetShooterAngle::new(actuators, *degrees, *tolerance);
                Box::new(task.with_timeout(*timeout))
            }
            TaskSpec::SetShooterSpeed {
                rpm,
                tolerance,
                timeout,
            } => {
                let task = SetShooterSpeed::new(actuators, *rpm, *tolerance);
                Box::new(task.with_timeout(*timeout))
            }
            TaskSpec::Wait { duration } => Box::new(Wait::new(*duration)),
            TaskSpec::Custom { factory, .. } => factory(),
        }
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskSpec::ExpandWinch { target } => {
                f.debug_struct("ExpandWinch").field("target", target).finish()
            }
            TaskSpec::TurnDegrees { degrees, rate, tolerance } => f
                .debug_struct("TurnDegrees")
                .field("degrees", degrees)
                .field("rate", rate)
                .field("tolerance", tolerance)
                .finish(),
            TaskSpec::AwaitStatus { status, timeout } => f
                .debug_struct("AwaitStatus")
                .field("status", status)
                .field("timeout", timeout)
                .finish(),
            TaskSpec::SetShooterAngle {
                degrees,
                tolerance,
                timeout,
            } => f
                .debug_struct("SetShooterAngle")
                .field("degrees", degrees)
                .field("tolerance", tolerance)
                .field("timeout", timeout)
                .finish(),
            TaskSpec::SetShooterSpeed {
                rpm,
                tolerance,
                timeout,
            } => f
                .debug_struct("SetShooterSpeed")
                .field("rpm", rpm)
                .field("tolerance", tolerance)
                .field("timeout", timeout)
                .finish(),
            TaskSpec::Wait { duration } => {
                f.debug_struct("Wait").field("duration", duration).finish()
            }
            TaskSpec::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}
