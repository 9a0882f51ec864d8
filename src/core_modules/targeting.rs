// THEORY:
// Targeting controllers close the loop between the vision worker and the
// robot. Each one is a small state machine:
//
//   IDLE --fresh estimate out of tolerance--> CORRECTING --task done--> IDLE
//
// Every control tick while enabled, a controller consumes its reader's fresh
// observation (if any). From IDLE, an estimate that needs correcting spawns a
// correction task and initializes it; an estimate within tolerance marks the
// controller on target. While CORRECTING, the running task is updated each tick
// and, once done, finished and dropped. Fresh observations that arrive during a
// correction are consumed and ignored, so only one correction task is ever
// running per controller.
//
// Disabling a controller is the only cancellation path: the running task is
// finished immediately and discarded, with no rollback of what it already did.
//
// A missing target keeps the controller idle. An estimate that is not `ready`
// (the target jumped since the previous pass) is skipped for that tick.
//
// What counts as "needs correcting" and which task fixes it is the
// `CorrectionStrategy`: bearing (turn in place), shooter angle and shooter
// speed ship with the crate.

use crate::config::{SetpointTable, TargetingConfig};
use crate::core_modules::actuators::Actuators;
use crate::core_modules::frame_source::EstimateReader;
use crate::core_modules::geometry::Estimate;
use crate::core_modules::task::{PendingTask, RunningTask, Task};
use crate::core_modules::tasks::{SetShooterAngle, SetShooterSpeed, TurnDegrees};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Correcting,
}

/// Maps a fresh estimate to a correction task, or `None` when on target.
pub trait CorrectionStrategy: Send {
    fn name(&self) -> &'static str;

    fn plan(&self, estimate: &Estimate, actuators: &Arc<dyn Actuators>) -> Option<Box<dyn Task>>;
}

/// Turns the robot to face the marker.
#[derive(Debug, Clone)]
pub struct BearingCorrection {
    pub tolerance_degrees: f64,
    pub turn_rate: f64,
}

impl CorrectionStrategy for BearingCorrection {
    fn name(&self) -> &'static str {
        "bearing"
    }

    fn plan(&self, estimate: &Estimate, actuators: &Arc<dyn Actuators>) -> Option<Box<dyn Task>> {
        (estimate.bearing_degrees.abs() > self.tolerance_degrees).then(|| {
            Box::new(TurnDegrees::new(
                Arc::clone(actuators),
                estimate.bearing_degrees,
                self.turn_rate,
                self.tolerance_degrees,
            )) as Box<dyn Task>
        })
    }
}

/// Sets the shooter elevation for the estimated range.
#[derive(Debug, Clone)]
pub struct AngleCorrection {
    pub table: SetpointTable,
    pub tolerance_degrees: f64,
}

impl CorrectionStrategy for AngleCorrection {
    fn name(&self) -> &'static str {
        "shooter-angle"
    }

    fn plan(&self, estimate: &Estimate, actuators: &Arc<dyn Actuators>) -> Option<Box<dyn Task>> {
        let desired = self.table.lookup(estimate.range_inches)?;
        let error = actuators.shooter_angle_degrees() - desired;
        (error.abs() > self.tolerance_degrees).then(|| {
            let task = SetShooterAngle::new(Arc::clone(actuators), desired, self.tolerance_degrees);
            Box::new(task) as Box<dyn Task>
        })
    }
}

/// Sets the shooter wheel speed for the estimated range.
#[derive(Debug, Clone)]
pub struct SpeedCorrection {
    pub table: SetpointTable,
    pub tolerance_rpm: f64,
}

impl CorrectionStrategy for SpeedCorrection {
    fn name(&self) -> &'static str {
        "shooter-speed"
    }

    fn plan(&self, estimate: &Estimate, actuators: &Arc<dyn Actuators>) -> Option<Box<dyn Task>> {
        let desired = self.table.lookup(estimate.range_inches)?;
        let error = actuators.shooter_speed_rpm() - desired;
        (error.abs() > self.tolerance_rpm).then(|| {
            let task = SetShooterSpeed::new(Arc::clone(actuators), desired, self.tolerance_rpm);
            Box::new(task) as Box<dyn Task>
        })
    }
}

pub struct TargetingController<S> {
    strategy: S,
    reader: EstimateReader,
    actuators: Arc<dyn Actuators>,
    enabled: bool,
    active: Option<RunningTask>,
    on_target: bool,
    corrections: u64,
    cancellations: u64,
}

impl<S: CorrectionStrategy> TargetingController<S> {
    pub fn new(strategy: S, reader: EstimateReader, actuators: Arc<dyn Actuators>) -> Self {
        Self {
            strategy,
            reader,
            actuators,
            enabled: false,
            active: None,
            on_target: false,
            corrections: 0,
            cancellations: 0,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            debug!(controller = self.strategy.name(), enabled, "targeting toggled");
        }
        self.enabled = enabled;
    }

    /// One control tick. Never blocks.
    pub fn update(&mut self) {
        if !self.enabled {
            self.cancel();
            return;
        }

        if let Some(observation) = self.reader.consume() {
            if self.active.is_none() {
                match observation.estimate {
                    None => self.on_target = false,
                    Some(_) if !observation.ready => {
                        debug!(controller = self.strategy.name(), "estimate not settled; skipping");
                    }
                    Some(estimate) => self.react(&estimate),
                }
            }
        }

        let done = self.active.as_mut().is_some_and(RunningTask::update);
        if done {
            if let Some(task) = self.active.take() {
                let outcome = task.finish();
                debug!(controller = self.strategy.name(), ?outcome, "correction finished");
            }
            self.on_target = true;
        }
    }

    fn react(&mut self, estimate: &Estimate) {
        match self.strategy.plan(estimate, &self.actuators) {
            Some(task) => {
                self.on_target = false;
                self.corrections += 1;
                info!(
                    controller = self.strategy.name(),
                    bearing = estimate.bearing_degrees,
                    range = estimate.range_inches,
                    "spawning correction"
                );
                self.active = Some(PendingTask::new(task).initialize());
            }
            None => self.on_target = true,
        }
    }

    fn cancel(&mut self) {
        if let Some(task) = self.active.take() {
            let outcome = task.finish();
            self.cancellations += 1;
            info!(controller = self.strategy.name(), ?outcome, "correction cancelled");
        }
    }

    pub fn state(&self) -> ControllerState {
        if self.active.is_some() {
            ControllerState::Correcting
        } else {
            ControllerState::Idle
        }
    }

    pub fn is_on_target(&self) -> bool {
        self.on_target
    }

    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    pub fn cancellations(&self) -> u64 {
        self.cancellations
    }
}

/// Values the external telemetry publisher polls once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetingTelemetry {
    pub target_visible: bool,
    pub bearing_degrees: Option<f64>,
    pub range_inches: Option<f64>,
    pub location: f64,
    pub ready: bool,
    pub pointed: bool,
    pub angle_set: bool,
    pub speed_set: bool,
}

/// The bearing, shooter-angle and shooter-speed controllers, driven together.
pub struct TargetingSuite {
    pub spin: TargetingController<BearingCorrection>,
    pub angle: TargetingController<AngleCorrection>,
    pub speed: TargetingController<SpeedCorrection>,
    telemetry_reader: EstimateReader,
}

impl TargetingSuite {
    /// Each controller gets its own clone of `reader`, so each consumes every
    /// fresh observation once.
    pub fn new(
        config: &TargetingConfig,
        reader: EstimateReader,
        actuators: Arc<dyn Actuators>,
    ) -> Self {
        let spin = TargetingController::new(
            BearingCorrection {
                tolerance_degrees: config.bearing_tolerance_degrees,
                turn_rate: config.turn_rate,
            },
            reader.clone(),
            Arc::clone(&actuators),
        );
        let angle = TargetingController::new(
            AngleCorrection {
                table: config.angle_table.clone(),
                tolerance_degrees: config.angle_tolerance_degrees,
            },
            reader.clone(),
            Arc::clone(&actuators),
        );
        let speed = TargetingController::new(
            SpeedCorrection {
                table: config.speed_table.clone(),
                tolerance_rpm: config.speed_tolerance_rpm,
            },
            reader.clone(),
            actuators,
        );
        Self {
            spin,
            angle,
            speed,
            telemetry_reader: reader,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.spin.set_enabled(enabled);
        self.angle.set_enabled(enabled);
        self.speed.set_enabled(enabled);
    }

    pub fn update(&mut self) {
        self.spin.update();
        self.angle.update();
        self.speed.update();
    }

    pub fn is_on_target(&self) -> bool {
        self.spin.is_on_target() && self.angle.is_on_target() && self.speed.is_on_target()
    }

    pub fn telemetry(&self) -> TargetingTelemetry {
        let latest = self.telemetry_reader.latest();
        TargetingTelemetry {
            target_visible: latest.target().is_some(),
            bearing_degrees: latest.estimate.map(|e| e.bearing_degrees),
            range_inches: latest.estimate.map(|e| e.range_inches),
            location: latest.location,
            ready: latest.ready,
            pointed: self.spin.is_on_target(),
            angle_set: self.angle.is_on_target(),
            speed_set: self.speed.is_on_target(),
        }
    }
}
