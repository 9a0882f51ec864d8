// THEORY:
// Every calibration value the core depends on lives here as a named field
// rather than an inline literal. The defaults reproduce the competition robot's
// field calibration; a test fixture or a JSON file can substitute its own values
// without touching any algorithm.
//
// The configuration is built once (from `Default` or from JSON), validated, and
// then handed by value or reference to the components that need it. Nothing
// mutates it afterwards; in particular the camera settings are applied a single
// time when the frame source starts.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Aggregated configuration for the whole targeting core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub camera: CameraSettings,
    pub threshold: ThresholdConfig,
    pub selection: SelectionConfig,
    pub optics: OpticsConfig,
    pub range: RangeCalibration,
    pub readiness: ReadinessConfig,
    pub targeting: TargetingConfig,
    /// When set, the first frame's swapped hue/saturation/value planes are
    /// written here as PNG for threshold calibration.
    pub swapped_dump_path: Option<PathBuf>,
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values that would make the pipeline or controllers meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.max_fps == 0 {
            return Err(ConfigError::invalid("camera.max_fps", "must be at least 1"));
        }
        if self.camera.stale_after_failures == 0 {
            return Err(ConfigError::invalid("camera.stale_after_failures", "must be at least 1"));
        }
        self.threshold.hue.validate("threshold.hue")?;
        self.threshold.saturation.validate("threshold.saturation")?;
        self.threshold.value.validate("threshold.value")?;

        let s = &self.selection;
        for (field, ratio) in [
            ("selection.board_max_fill", s.board_max_fill),
            ("selection.refined_max_fill", s.refined_max_fill),
            ("selection.refined_min_area_ratio", s.refined_min_area_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::invalid(field, format!("{ratio} is outside (0, 1]")));
            }
        }

        let o = &self.optics;
        for (field, v) in [
            ("optics.fov_horizontal_degrees", o.fov_horizontal_degrees),
            ("optics.fov_vertical_degrees", o.fov_vertical_degrees),
            ("optics.reference_width_px", o.reference_width_px),
            ("range.reference_range_inches", self.range.reference_range_inches),
            ("range.reference_size_px", self.range.reference_size_px),
        ] {
            if !(v > 0.0) {
                return Err(ConfigError::invalid(field, format!("{v} must be positive")));
            }
        }

        if !(self.readiness.max_shift_px > 0.0) {
            return Err(ConfigError::invalid("readiness.max_shift_px", "must be positive"));
        }

        let t = &self.targeting;
        if !(t.bearing_tolerance_degrees > 0.0) {
            return Err(ConfigError::invalid(
                "targeting.bearing_tolerance_degrees",
                "must be positive",
            ));
        }
        if !(t.turn_rate > 0.0 && t.turn_rate <= 1.0) {
            return Err(ConfigError::invalid("targeting.turn_rate", "must be in (0, 1]"));
        }
        t.angle_table.validate("targeting.angle_table")?;
        t.speed_table.validate("targeting.speed_table")?;
        Ok(())
    }
}

/// Frame resolutions the network camera can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    R640x480,
    R320x240,
    R160x120,
}

impl Resolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::R640x480 => (640, 480),
            Resolution::R320x240 => (320, 240),
            Resolution::R160x120 => (160, 120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposurePriority {
    FrameRate,
    ImageQuality,
    None,
}

/// Capture parameters written to the camera once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub address: String,
    pub max_fps: u32,
    pub resolution: Resolution,
    /// JPEG compression level, 0..=100.
    pub compression: u8,
    pub exposure_priority: ExposurePriority,
    /// Pause before retrying after a failed capture.
    pub retry_backoff_ms: u64,
    /// Consecutive capture failures after which the last observation is
    /// replaced by a no-target one.
    pub stale_after_failures: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            address: "10.2.45.11".to_string(),
            max_fps: 20,
            resolution: Resolution::R160x120,
            compression: 65,
            exposure_priority: ExposurePriority::FrameRate,
            retry_backoff_ms: 50,
            stale_after_failures: 10,
        }
    }
}

impl CameraSettings {
    /// Minimum spacing between two captures implied by `max_fps`.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_fps.max(1) as f64)
    }
}

/// Inclusive `min..=max` range on one 0..=255 plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub min: u8,
    pub max: u8,
}

impl ChannelRange {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::invalid(
                field,
                format!("min {} is above max {}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Threshold applied after the hue/saturation/value channel swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub hue: ChannelRange,
    pub saturation: ChannelRange,
    pub value: ChannelRange,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            hue: ChannelRange::new(107, 133),
            saturation: ChannelRange::new(97, 255),
            value: ChannelRange::new(178, 255),
        }
    }
}

/// Priors for the two-pass candidate selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Regions with fewer pixels than this are noise.
    pub min_region_pixels: u32,
    /// The board must fill strictly less than this share of its bounding box.
    pub board_max_fill: f64,
    pub refined_min_area_ratio: f64,
    pub refined_min_width: u32,
    pub refined_min_height: u32,
    pub refined_max_fill: f64,
    /// Column where the marker's center of mass sits when the robot is aligned.
    pub reference_column: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_region_pixels: 9,
            board_max_fill: 0.55,
            refined_min_area_ratio: 0.5,
            refined_min_width: 70,
            refined_min_height: 20,
            refined_max_fill: 0.8,
            reference_column: 77.0,
        }
    }
}

/// Camera optics and mounting geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticsConfig {
    pub fov_horizontal_degrees: f64,
    pub fov_vertical_degrees: f64,
    /// Frame width the field of view and range constant were measured at.
    pub reference_width_px: f64,
    pub camera_pitch_degrees: f64,
    pub camera_height_inches: f64,
    pub target_height_inches: f64,
    pub target_elevation_inches: f64,
}

impl Default for OpticsConfig {
    fn default() -> Self {
        Self {
            fov_horizontal_degrees: 50.0,
            fov_vertical_degrees: 38.0,
            reference_width_px: 320.0,
            camera_pitch_degrees: 20.0,
            camera_height_inches: 12.0,
            target_height_inches: 20.0,
            target_elevation_inches: 100.0,
        }
    }
}

/// A measured distance/apparent-size pair. Their product is the range constant
/// at `OpticsConfig::reference_width_px`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeCalibration {
    pub reference_range_inches: f64,
    /// Mean of bounding-box width and height at the reference range.
    pub reference_size_px: f64,
}

impl Default for RangeCalibration {
    fn default() -> Self {
        // 148.74 in * 100 px = 14874
        Self {
            reference_range_inches: 148.74,
            reference_size_px: 100.0,
        }
    }
}

impl RangeCalibration {
    pub fn constant(&self) -> f64 {
        self.reference_range_inches * self.reference_size_px
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub max_shift_px: f64,
    /// Vertical location reported when no target is visible.
    pub no_target_location: f64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_shift_px: 5.0,
            no_target_location: 150.0,
        }
    }
}

/// Monotone range → setpoint lookup with linear interpolation between points
/// and clamping outside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointTable {
    pub points: Vec<(f64, f64)>,
}

impl SetpointTable {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn lookup(&self, range: f64) -> Option<f64> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if range <= first.0 {
            return Some(first.1);
        }
        if range >= last.0 {
            return Some(last.1);
        }
        self.points.windows(2).find_map(|pair| {
            let (r0, v0) = pair[0];
            let (r1, v1) = pair[1];
            (range >= r0 && range <= r1).then(|| v0 + (v1 - v0) * (range - r0) / (r1 - r0))
        })
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.points.is_empty() {
            return Err(ConfigError::invalid(field, "table is empty"));
        }
        if self.points.windows(2).any(|pair| pair[1].0 <= pair[0].0) {
            return Err(ConfigError::invalid(field, "ranges must be strictly increasing"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub bearing_tolerance_degrees: f64,
    /// Drive output used by bearing corrections, 0..=1.
    pub turn_rate: f64,
    pub angle_tolerance_degrees: f64,
    pub speed_tolerance_rpm: f64,
    /// Range (inches) → shooter elevation (degrees).
    pub angle_table: SetpointTable,
    /// Range (inches) → shooter wheel speed (rpm).
    pub speed_table: SetpointTable,
    /// Time limit for each autonomous setpoint; zero waits indefinitely.
    pub setpoint_timeout_ms: u64,
}

impl TargetingConfig {
    pub fn setpoint_timeout(&self) -> Duration {
        Duration::from_millis(self.setpoint_timeout_ms)
    }
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            bearing_tolerance_degrees: 1.0,
            turn_rate: 0.1,
            angle_tolerance_degrees: 0.5,
            speed_tolerance_rpm: 75.0,
            angle_table: SetpointTable::new(vec![
                (60.0, 45.0),
                (120.0, 35.0),
                (200.0, 27.0),
                (300.0, 22.0),
            ]),
            speed_table: SetpointTable::new(vec![
                (60.0, 2800.0),
                (120.0, 3200.0),
                (200.0, 3700.0),
                (300.0, 4200.0),
            ]),
            setpoint_timeout_ms: 3000,
        }
    }
}
