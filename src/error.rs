// THEORY:
// One home for every failure the core can report. Each layer owns a narrow
// error enum, and `CoreError` folds them together for callers that drive more
// than one layer at once (a capture followed by a pipeline pass, the runner
// binary wiring the camera to the sequencer).
//
// Not everything that "goes wrong" is an error here. A frame with no usable
// marker is a normal outcome (`Detection::NotFound`), and a task that ends
// badly reports `TaskOutcome::Failure`. Errors are reserved for a camera that
// could not deliver, a frame that could not be processed at all, bad
// configuration, and programmer mistakes such as an unknown phase id.

use std::path::PathBuf;
use thiserror::Error;

/// Convenient `Result` alias for orchestration-level functions.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error for the targeting core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("segmentation error: {0}")]
    Segmentation(#[from] SegmentationError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("phase error: {0}")]
    Phase(#[from] PhaseError),
}

/// A single frame acquisition failed. Always transient from the worker's
/// point of view: the iteration is skipped and the next one retries.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera at {address} is not reachable")]
    Unreachable { address: String },

    #[error("camera timed out after {millis} ms")]
    Timeout { millis: u64 },

    #[error("camera delivered an undecodable frame: {0}")]
    Decode(String),

    #[error("camera source exhausted")]
    Exhausted,
}

/// The frame could not be run through the pipeline at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhaseError {
    /// A phase id that does not name any known phase. Raised eagerly; the
    /// caller has a bug.
    #[error("unknown phase id {0}")]
    UnknownPhase(i32),

    #[error("no phase is active")]
    NoActivePhase,
}
