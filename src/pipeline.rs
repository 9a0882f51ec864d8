// THEORY:
// The `pipeline` module is the top-level API of the vision half of the core. It
// strings the layers together for one frame:
//
//   Frame → segmentation (Detection) → geometry (Estimate) → readiness
//
// and packages the result as an `Observation`, the unit handed from the capture
// worker to the targeting controllers. The pipeline carries the previous
// vertical target location used by the readiness heuristic between passes,
// plus the id of the last frame it saw so a camera outage can be reported
// against it.

use crate::config::CoreConfig;
use crate::core_modules::frame::{Camera, Frame};
use crate::core_modules::geometry::{GeometryEstimator, ReadinessTracker};
use crate::core_modules::pixel::pixel::swap_to_hsv_planes;
use crate::core_modules::segmentation::{self, Rejection};
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{CoreResult, SegmentationError};
use image::RgbImage;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

pub use crate::core_modules::geometry::Estimate;
pub use crate::core_modules::region::Target;
pub use crate::core_modules::segmentation::Detection;

/// Everything one completed pass learned about the marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub frame_id: u64,
    pub captured_at: Instant,
    pub detection: Detection,
    /// Present exactly when `detection` found a target in this pass.
    pub estimate: Option<Estimate>,
    /// Vertical target center, or the no-target sentinel.
    pub location: f64,
    /// The location moved less than the readiness threshold since the
    /// previous pass.
    pub ready: bool,
}

impl Observation {
    /// Placeholder held by the handoff slot before the first pass completes.
    pub fn initial(no_target_location: f64) -> Self {
        Self {
            frame_id: 0,
            captured_at: Instant::now(),
            detection: Detection::NotFound(Rejection::NoRegions),
            estimate: None,
            location: no_target_location,
            ready: false,
        }
    }

    pub fn target(&self) -> Option<Target> {
        self.detection.target()
    }
}

pub struct VisionPipeline {
    config: CoreConfig,
    estimator: GeometryEstimator,
    readiness: ReadinessTracker,
    pending_dump: Option<PathBuf>,
    last_frame_id: u64,
}

impl VisionPipeline {
    pub fn new(config: CoreConfig) -> Self {
        let estimator = GeometryEstimator::new(config.optics.clone(), config.range.clone());
        let readiness = ReadinessTracker::new(config.readiness.clone());
        Self {
            pending_dump: config.swapped_dump_path.clone(),
            config,
            estimator,
            readiness,
            last_frame_id: 0,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn estimator(&self) -> &GeometryEstimator {
        &self.estimator
    }

    /// Runs one pass and consumes the frame. A frame that cannot be processed
    /// leaves the readiness history untouched.
    pub fn process(&mut self, frame: Frame) -> Result<Observation, SegmentationError> {
        self.analyze(frame.id, frame.captured_at, &frame.image)
    }

    /// Captures one frame and runs it through `process`.
    pub fn capture_and_process(&mut self, camera: &mut dyn Camera) -> CoreResult<Observation> {
        let frame = camera.capture()?;
        Ok(self.process(frame)?)
    }

    pub fn analyze(
        &mut self,
        frame_id: u64,
        captured_at: Instant,
        image: &RgbImage,
    ) -> Result<Observation, SegmentationError> {
        let detection =
            segmentation::segment(image, &self.config.threshold, &self.config.selection)?;
        self.last_frame_id = frame_id;
        if let Some(path) = self.pending_dump.take() {
            match image_helper::save_png(&path, &swap_to_hsv_planes(image)) {
                Ok(()) => info!(path = %path.display(), "wrote swapped planes"),
                Err(error) => {
                    warn!(path = %path.display(), %error, "could not write swapped planes")
                }
            }
        }
        let target = detection.target();
        let estimate = target.map(|t| self.estimator.estimate(&t, image.width()));
        let (location, ready) = self.readiness.observe(target.as_ref());

        Ok(Observation {
            frame_id,
            captured_at,
            detection,
            estimate,
            location,
            ready,
        })
    }

    /// No-target observation for a camera that stopped delivering frames.
    /// Readiness restarts from the no-target sentinel.
    pub fn camera_lost(&mut self) -> Observation {
        let (location, ready) = self.readiness.observe(None);
        Observation {
            frame_id: self.last_frame_id,
            captured_at: Instant::now(),
            detection: Detection::NotFound(Rejection::NoFrame),
            estimate: None,
            location,
            ready,
        }
    }
}
