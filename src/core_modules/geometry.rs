// THEORY:
// The geometry estimator converts a selected `Target` into the two numbers the
// controllers act on: bearing off boresight and range to the marker.
//
// - Bearing is linear in the horizontal offset of the target's center from the
//   frame midpoint: `(x + w/2 − W/2) · FOV / W`. Negative is left of center.
// - Range is inversely proportional to apparent size: `K / ((w + h) / 2)`,
//   where `K` comes from one measured distance/size pair and is rescaled by
//   `W / reference_width` so it stays valid when the capture resolution changes.
// - A trigonometric fallback uses the target's vertical position, the camera's
//   mount height and pitch, and the marker's known elevation. It is kept as a
//   cross-check against the size-based estimate.
//
// Readiness lives here too: a target whose vertical center barely moved since
// the previous pass means the camera has caught up with the robot's motion.

use crate::config::{OpticsConfig, RangeCalibration, ReadinessConfig};
use crate::core_modules::region::Target;
use serde::{Deserialize, Serialize};

/// Bearing/range pair derived from one `Target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub bearing_degrees: f64,
    pub range_inches: f64,
}

#[derive(Debug, Clone)]
pub struct GeometryEstimator {
    optics: OpticsConfig,
    range: RangeCalibration,
}

impl GeometryEstimator {
    pub fn new(optics: OpticsConfig, range: RangeCalibration) -> Self {
        Self { optics, range }
    }

    pub fn estimate(&self, target: &Target, frame_width: u32) -> Estimate {
        Estimate {
            bearing_degrees: self.bearing_degrees(target, frame_width),
            range_inches: self.range_inches(target, frame_width),
        }
    }

    pub fn bearing_degrees(&self, target: &Target, frame_width: u32) -> f64 {
        let width = frame_width as f64;
        (target.center_x() - width / 2.0) * self.optics.fov_horizontal_degrees / width
    }

    pub fn range_inches(&self, target: &Target, frame_width: u32) -> f64 {
        let scale = frame_width as f64 / self.optics.reference_width_px;
        self.range.constant() * scale / target.mean_size()
    }

    /// Range from the vertical angle to the target's center and the known
    /// height difference between camera and marker.
    pub fn range_inches_trigonometric(&self, target: &Target, frame_height: u32) -> f64 {
        let o = &self.optics;
        let below_top_degrees = target.center_y() / frame_height as f64 * o.fov_vertical_degrees;
        let top_edge_degrees = o.camera_pitch_degrees + o.fov_vertical_degrees / 2.0;
        let elevation = (top_edge_degrees - below_top_degrees).to_radians();
        let rise =
            o.target_elevation_inches + o.target_height_inches / 2.0 - o.camera_height_inches;
        rise / elevation.tan()
    }
}

/// Tracks the previous pass's vertical target location to decide whether the
/// current estimate is stable enough to act on.
#[derive(Debug, Clone)]
pub struct ReadinessTracker {
    config: ReadinessConfig,
    previous_location: f64,
}

impl ReadinessTracker {
    pub fn new(config: ReadinessConfig) -> Self {
        let previous_location = config.no_target_location;
        Self {
            config,
            previous_location,
        }
    }

    /// Vertical center of the target, or the no-target sentinel.
    pub fn location_of(&self, target: Option<&Target>) -> f64 {
        target.map_or(self.config.no_target_location, Target::center_y)
    }

    /// Records this pass's location and returns `(location, ready)`.
    pub fn observe(&mut self, target: Option<&Target>) -> (f64, bool) {
        let location = self.location_of(target);
        let ready = (location - self.previous_location).abs() < self.config.max_shift_px;
        self.previous_location = location;
        (location, ready)
    }

    pub fn previous_location(&self) -> f64 {
        self.previous_location
    }
}
