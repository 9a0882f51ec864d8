// THEORY:
// The camera is an external collaborator. The core only needs two things from
// it: accept its capture settings once at startup, and hand over one colour
// frame per `capture` call (blocking for at most the device's own timeout).
//
// A `Frame` is owned by whoever holds it. The capture worker moves it into the
// pipeline for one pass and it is dropped when that pass returns, so pixel
// buffers never outlive the iteration that produced them.

use crate::config::CameraSettings;
use crate::error::CaptureError;
use image::RgbImage;
use std::path::Path;
use std::time::Instant;

/// An immutable captured image with its capture time.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub captured_at: Instant,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(id: u64, image: RgbImage) -> Self {
        Self {
            id,
            captured_at: Instant::now(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Source of colour frames. `capture` may block.
pub trait Camera: Send {
    /// Applies capture parameters. Called once before the first capture.
    fn configure(&mut self, settings: &CameraSettings) -> Result<(), CaptureError>;

    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

/// Serves the same decoded image on every capture. Used by the runner binary to
/// replay a saved camera frame.
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    image: RgbImage,
    next_id: u64,
}

impl StillImageCamera {
    pub fn new(image: RgbImage) -> Self {
        Self { image, next_id: 0 }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let image = image::open(path.as_ref())
            .map_err(|e| CaptureError::Decode(e.to_string()))?
            .to_rgb8();
        Ok(Self::new(image))
    }
}

impl Camera for StillImageCamera {
    fn configure(&mut self, settings: &CameraSettings) -> Result<(), CaptureError> {
        let (width, height) = settings.resolution.dimensions();
        if self.image.dimensions() != (width, height) {
            tracing::warn!(
                requested_width = width,
                requested_height = height,
                width = self.image.width(),
                height = self.image.height(),
                "still image does not match the requested resolution"
            );
        }
        tracing::debug!(
            address = %settings.address,
            fps = settings.max_fps,
            "still image camera ignores capture settings"
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let frame = Frame::new(self.next_id, self.image.clone());
        self.next_id += 1;
        Ok(frame)
    }
}
