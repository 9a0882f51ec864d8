mod common;

use common::{Command, RecordingActuators};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use targeting_core::config::TargetingConfig;
use targeting_core::core_modules::segmentation::Rejection;
use targeting_core::core_modules::targeting::{
    AngleCorrection, BearingCorrection, ControllerState, CorrectionStrategy, TargetingController,
};
use targeting_core::core_modules::task::{Task, TaskOutcome};
use targeting_core::{
    Actuators, Detection, Estimate, EstimatePublisher, Observation, Target, TargetingSuite,
    estimate_channel,
};

fn observation(frame_id: u64, bearing: f64, range: f64, ready: bool) -> Observation {
    let target = Target::new(100, 40, 60, 30).unwrap();
    Observation {
        frame_id,
        detection: Detection::Found(target),
        estimate: Some(Estimate {
            bearing_degrees: bearing,
            range_inches: range,
        }),
        location: target.center_y(),
        ready,
        ..Observation::initial(150.0)
    }
}

fn nothing(frame_id: u64) -> Observation {
    Observation {
        frame_id,
        detection: Detection::NotFound(Rejection::NoRegions),
        ..Observation::initial(150.0)
    }
}

fn channel() -> EstimatePublisher {
    estimate_channel(Observation::initial(150.0)).0
}

#[derive(Debug, Default)]
struct LifecycleCounts {
    plans: AtomicUsize,
    inits: AtomicUsize,
    updates: AtomicUsize,
    finishes: AtomicUsize,
}

/// Always wants a correction; the task it spawns finishes after `ticks` updates.
struct AlwaysCorrect {
    counts: Arc<LifecycleCounts>,
    ticks: usize,
}

struct CountingTask {
    counts: Arc<LifecycleCounts>,
    ticks: usize,
    updates: usize,
}

impl Task for CountingTask {
    fn name(&self) -> &str {
        "counting"
    }

    fn initialize(&mut self) {
        self.counts.inits.fetch_add(1, Ordering::SeqCst);
    }

    fn update(&mut self) {
        self.updates += 1;
        self.counts.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn is_done(&self) -> bool {
        self.updates >= self.ticks
    }

    fn finish(&mut self) -> TaskOutcome {
        self.counts.finishes.fetch_add(1, Ordering::SeqCst);
        TaskOutcome::from_done(self.is_done())
    }
}

impl CorrectionStrategy for AlwaysCorrect {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn plan(&self, _estimate: &Estimate, _actuators: &Arc<dyn Actuators>) -> Option<Box<dyn Task>> {
        self.counts.plans.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(CountingTask {
            counts: Arc::clone(&self.counts),
            ticks: self.ticks,
            updates: 0,
        }))
    }
}

fn counting_controller(
    publisher: &EstimatePublisher,
    ticks: usize,
) -> (TargetingController<AlwaysCorrect>, Arc<LifecycleCounts>) {
    let counts = Arc::new(LifecycleCounts::default());
    let strategy = AlwaysCorrect {
        counts: Arc::clone(&counts),
        ticks,
    };
    let actuators: Arc<dyn Actuators> = RecordingActuators::new();
    let mut controller = TargetingController::new(strategy, publisher.subscribe(), actuators);
    controller.set_enabled(true);
    (controller, counts)
}

fn spin_controller(
    publisher: &EstimatePublisher,
) -> (TargetingController<BearingCorrection>, Arc<RecordingActuators>) {
    let recorder = RecordingActuators::new();
    let actuators: Arc<dyn Actuators> = recorder.clone();
    let strategy = BearingCorrection {
        tolerance_degrees: 1.0,
        turn_rate: 0.1,
    };
    let mut controller = TargetingController::new(strategy, publisher.subscribe(), actuators);
    controller.set_enabled(true);
    (controller, recorder)
}

#[test]
fn bearing_error_spawns_turn_until_aligned() {
    let publisher = channel();
    let (mut spin, recorder) = spin_controller(&publisher);

    publisher.publish(observation(1, 10.0, 200.0, true));
    spin.update();
    assert_eq!(spin.state(), ControllerState::Correcting);
    assert_eq!(spin.corrections(), 1);
    assert!(!spin.is_on_target());
    assert_eq!(recorder.turn_rates(), [0.1, 0.1]);

    recorder.set_heading(9.5);
    spin.update();
    assert_eq!(spin.state(), ControllerState::Idle);
    assert!(spin.is_on_target());
    assert_eq!(recorder.turn_rates().last(), Some(&0.0));
}

#[test]
fn estimate_within_tolerance_needs_no_task() {
    let publisher = channel();
    let (mut spin, recorder) = spin_controller(&publisher);

    publisher.publish(observation(1, -0.4, 200.0, true));
    spin.update();
    assert_eq!(spin.state(), ControllerState::Idle);
    assert!(spin.is_on_target());
    assert!(recorder.commands().is_empty());
}

#[test]
fn missing_target_keeps_controller_idle() {
    let publisher = channel();
    let (mut spin, recorder) = spin_controller(&publisher);

    publisher.publish(observation(1, 0.2, 200.0, true));
    spin.update();
    assert!(spin.is_on_target());

    publisher.publish(nothing(2));
    spin.update();
    assert_eq!(spin.state(), ControllerState::Idle);
    assert!(!spin.is_on_target());
    assert_eq!(spin.corrections(), 0);
    assert!(recorder.commands().is_empty());
}

#[test]
fn unsettled_estimate_is_skipped() {
    let publisher = channel();
    let (mut controller, counts) = counting_controller(&publisher, 1);

    publisher.publish(observation(1, 12.0, 200.0, false));
    controller.update();
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(counts.plans.load(Ordering::SeqCst), 0);

    // consumed, so nothing happens until the next publication
    controller.update();
    assert_eq!(counts.plans.load(Ordering::SeqCst), 0);

    publisher.publish(observation(2, 12.0, 200.0, true));
    controller.update();
    assert_eq!(counts.plans.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_estimate_never_spawns_twice() {
    let publisher = channel();
    let (mut controller, counts) = counting_controller(&publisher, 1);

    publisher.publish(observation(1, 12.0, 200.0, true));
    controller.update();
    assert_eq!(controller.state(), ControllerState::Idle);
    for _ in 0..10 {
        controller.update();
    }
    assert_eq!(counts.plans.load(Ordering::SeqCst), 1);
    assert_eq!(counts.finishes.load(Ordering::SeqCst), 1);
    assert!(controller.is_on_target());
}

#[test]
fn observations_during_correction_are_ignored() {
    let publisher = channel();
    let (mut controller, counts) = counting_controller(&publisher, 3);

    publisher.publish(observation(1, 12.0, 200.0, true));
    controller.update();
    publisher.publish(observation(2, -20.0, 100.0, true));
    controller.update();
    controller.update();
    assert_eq!(controller.state(), ControllerState::Idle);

    controller.update();
    assert_eq!(counts.plans.load(Ordering::SeqCst), 1);
    assert_eq!(counts.inits.load(Ordering::SeqCst), 1);
}

#[test]
fn disabling_cancels_with_a_single_finish() {
    let publisher = channel();
    let (mut controller, counts) = counting_controller(&publisher, usize::MAX);

    publisher.publish(observation(1, 12.0, 200.0, true));
    controller.update();
    controller.update();
    assert_eq!(controller.state(), ControllerState::Correcting);
    assert_eq!(counts.updates.load(Ordering::SeqCst), 2);

    controller.set_enabled(false);
    controller.update();
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(controller.cancellations(), 1);
    assert_eq!(counts.finishes.load(Ordering::SeqCst), 1);

    controller.update();
    controller.set_enabled(true);
    controller.update();
    assert_eq!(counts.finishes.load(Ordering::SeqCst), 1);
    assert_eq!(counts.updates.load(Ordering::SeqCst), 2);
    assert_eq!(counts.plans.load(Ordering::SeqCst), 1);
}

#[test]
fn disabled_controller_leaves_freshness_alone() {
    let publisher = channel();
    let (mut controller, counts) = counting_controller(&publisher, 1);
    controller.set_enabled(false);

    publisher.publish(observation(1, 12.0, 200.0, true));
    controller.update();
    assert_eq!(counts.plans.load(Ordering::SeqCst), 0);

    controller.set_enabled(true);
    controller.update();
    assert_eq!(counts.plans.load(Ordering::SeqCst), 1);
}

#[test]
fn cancelled_turn_stops_the_drive() {
    let publisher = channel();
    let (mut spin, recorder) = spin_controller(&publisher);

    publisher.publish(observation(1, -15.0, 200.0, true));
    spin.update();
    assert_eq!(recorder.turn_rates(), [-0.1, -0.1]);

    spin.set_enabled(false);
    spin.update();
    assert_eq!(recorder.turn_rates(), [-0.1, -0.1, 0.0]);
    assert!(!spin.is_on_target());
}

#[test]
fn angle_correction_uses_setpoint_table() {
    let publisher = channel();
    let recorder = RecordingActuators::new();
    let actuators: Arc<dyn Actuators> = recorder.clone();
    let config = TargetingConfig::default();
    let strategy = AngleCorrection {
        table: config.angle_table.clone(),
        tolerance_degrees: config.angle_tolerance_degrees,
    };
    let mut angle = TargetingController::new(strategy, publisher.subscribe(), actuators);
    angle.set_enabled(true);

    publisher.publish(observation(1, 0.0, 160.0, true));
    angle.update();
    assert_eq!(recorder.commands(), [Command::ShooterAngle(31.0)]);
    assert_eq!(angle.state(), ControllerState::Correcting);

    recorder.set_shooter_angle(31.2);
    angle.update();
    assert!(angle.is_on_target());
}

#[test]
fn suite_settles_all_three_and_reports_telemetry() {
    let publisher = channel();
    let recorder = RecordingActuators::following();
    let actuators: Arc<dyn Actuators> = recorder.clone();
    let config = TargetingConfig::default();
    let mut suite = TargetingSuite::new(&config, publisher.subscribe(), actuators);

    let idle = suite.telemetry();
    assert!(!idle.target_visible);
    assert_eq!(idle.range_inches, None);

    suite.set_enabled(true);
    publisher.publish(observation(1, 0.3, 200.0, true));
    suite.update();

    assert!(suite.is_on_target());
    assert_eq!(recorder.commands(), [Command::ShooterAngle(27.0), Command::ShooterSpeed(3700.0)]);

    let telemetry = suite.telemetry();
    assert!(telemetry.target_visible);
    assert_eq!(telemetry.bearing_degrees, Some(0.3));
    assert_eq!(telemetry.range_inches, Some(200.0));
    assert!(telemetry.ready);
    assert!(telemetry.pointed && telemetry.angle_set && telemetry.speed_set);
}
