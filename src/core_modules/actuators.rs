// THEORY:
// The actuator surface is the only way a task touches hardware. Commands are
// synchronous fire-and-forget setpoints; feedback getters expose just enough
// sensor state for a task to decide when it is done. The core knows nothing
// about motor ports, relays or encoders behind this trait.
//
// Implementations are shared between the phase engine and the targeting
// controllers (`Arc<dyn Actuators>`), so every method takes `&self`.

use std::fmt::Debug;

/// Discrete mechanism states a task can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    WinchInPosition,
    ShooterInPosition,
    ShooterAtSpeed,
}

pub trait Actuators: Send + Sync + Debug {
    fn set_winch_target(&self, encoder_target: f64);

    /// Turn in place; positive is clockwise. Zero stops the drive.
    fn set_turn_rate(&self, rate: f64);

    fn set_shooter_angle_target(&self, degrees: f64);

    fn set_shooter_speed_target(&self, rpm: f64);

    /// Gyro heading, degrees, clockwise positive.
    fn heading_degrees(&self) -> f64;

    fn shooter_angle_degrees(&self) -> f64;

    fn shooter_speed_rpm(&self) -> f64;

    fn status(&self, status: Status) -> bool;
}
