pub mod actuators;
pub mod frame;
pub mod frame_source;
pub mod geometry;
pub mod phase;
pub mod pixel;
pub mod region;
pub mod segmentation;
pub mod sequencer;
pub mod targeting;
pub mod task;
pub mod tasks;
pub mod utils;
