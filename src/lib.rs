// THEORY:
// `lib.rs` defines the public surface of the `targeting_core` library crate.
// Two halves live underneath it:
//
// - The vision half (`pipeline`, plus the segmentation, geometry and frame
//   source modules) turns camera frames into target estimates on a background
//   worker and hands them over through a single-slot channel.
// - The control half (`task`, `phase`, `sequencer`, `targeting`) runs
//   cooperative, tick-driven task sequences and the closed-loop targeting
//   controllers that consume those estimates.
//
// Hardware stays outside: a `Camera` supplies frames and an `Actuators`
// implementation receives commands. The library never installs a tracing
// subscriber; that is the binary's job.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::CoreConfig;
pub use core_modules::actuators::{Actuators, Status};
pub use core_modules::frame::{Camera, Frame, StillImageCamera};
pub use core_modules::frame_source::{
    EstimatePublisher, EstimateReader, FrameSource, WorkerStats, estimate_channel,
};
pub use core_modules::sequencer::{PhaseKind, PhasePlans, Sequencer};
pub use core_modules::targeting::{TargetingSuite, TargetingTelemetry};
pub use error::{CoreError, CoreResult};
pub use pipeline::{Detection, Estimate, Observation, Target, VisionPipeline};
