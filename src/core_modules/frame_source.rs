// THEORY:
// The `FrameSource` owns the camera and runs the vision pipeline on a dedicated
// blocking worker, independent of the control loop's tick rate. It is the only
// writer of observations; the targeting controllers are the readers.
//
// Key architectural principles:
// 1.  **Single-slot handoff**: results cross from the worker to the control loop
//     through a `tokio::sync::watch` slot. Publishing swaps the whole
//     `Observation` in one step, so a reader can never see a half-updated
//     target/estimate pair, and reading never blocks.
// 2.  **Freshness per reader**: every consumer holds its own `EstimateReader`.
//     An observation is "fresh" for a reader until that reader consumes it,
//     exactly once.
// 3.  **Opportunistic restart**: `ensure_running` is called every tick. If the
//     worker is missing or has died (a panicking camera driver, for instance) a
//     new one is spawned over the same camera and pipeline state.
// 4.  **Transient failures are skipped**: a failed capture or an unprocessable
//     frame is logged and the iteration ends without publishing anything. The
//     previous observation stays in the slot, already consumed or not.
//     Once captures have failed `stale_after_failures` times in a row, the
//     camera counts as lost and a single no-target observation replaces the
//     stale one.
// 5.  **Scoped buffers**: each frame is moved into the pipeline and dropped
//     with every intermediate image before the next capture starts.

use crate::config::{CameraSettings, CoreConfig};
use crate::core_modules::frame::Camera;
use crate::error::{CaptureError, CoreError};
use crate::pipeline::{Observation, VisionPipeline};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builds a connected publisher/reader pair around `initial`.
pub fn estimate_channel(initial: Observation) -> (EstimatePublisher, EstimateReader) {
    let (tx, rx) = watch::channel(initial);
    (EstimatePublisher { tx: Arc::new(tx) }, EstimateReader { rx })
}

/// Writer side of the observation slot.
#[derive(Clone)]
pub struct EstimatePublisher {
    tx: Arc<watch::Sender<Observation>>,
}

impl EstimatePublisher {
    pub fn publish(&self, observation: Observation) {
        self.tx.send_replace(observation);
    }

    /// A new reader for which the current observation counts as already seen.
    pub fn subscribe(&self) -> EstimateReader {
        EstimateReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Reader side of the observation slot. Never blocks except in `wait_fresh`.
#[derive(Debug, Clone)]
pub struct EstimateReader {
    rx: watch::Receiver<Observation>,
}

impl EstimateReader {
    /// A published observation this reader has not consumed yet.
    pub fn is_fresh(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Takes the fresh observation, clearing freshness for this reader.
    pub fn consume(&mut self) -> Option<Observation> {
        if !self.is_fresh() {
            return None;
        }
        Some(self.rx.borrow_and_update().clone())
    }

    /// The most recent observation without touching freshness.
    pub fn latest(&self) -> Observation {
        self.rx.borrow().clone()
    }

    /// Resolves once a fresh observation is available. Returns `false` if the
    /// publisher is gone.
    pub async fn wait_fresh(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[derive(Debug, Default)]
struct WorkerCounters {
    frames: AtomicU64,
    capture_failures: AtomicU64,
    pipeline_failures: AtomicU64,
    outages: AtomicU64,
    starts: AtomicU64,
}

/// Point-in-time copy of the worker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStats {
    pub frames: u64,
    pub capture_failures: u64,
    pub pipeline_failures: u64,
    /// Runs of failed captures long enough to report the camera as lost.
    pub outages: u64,
    /// Worker launches, including the first one.
    pub starts: u64,
}

/// Camera plus pipeline state; survives worker restarts.
struct CaptureRig {
    camera: Box<dyn Camera>,
    pipeline: VisionPipeline,
}

pub struct FrameSource {
    rig: Arc<Mutex<CaptureRig>>,
    publisher: EstimatePublisher,
    settings: CameraSettings,
    runtime: Handle,
    worker: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    counters: Arc<WorkerCounters>,
}

impl FrameSource {
    /// Configures the camera once and prepares the (not yet running) worker.
    pub fn new(
        mut camera: Box<dyn Camera>,
        config: CoreConfig,
        runtime: Handle,
    ) -> Result<Self, CaptureError> {
        camera.configure(&config.camera)?;
        let (width, height) = config.camera.resolution.dimensions();
        info!(
            address = %config.camera.address,
            fps = config.camera.max_fps,
            width,
            height,
            compression = config.camera.compression,
            "camera configured"
        );

        let initial = Observation::initial(config.readiness.no_target_location);
        let (publisher, _) = estimate_channel(initial);
        let (shutdown_tx, _) = watch::channel(false);
        let settings = config.camera.clone();

        Ok(Self {
            rig: Arc::new(Mutex::new(CaptureRig {
                camera,
                pipeline: VisionPipeline::new(config),
            })),
            publisher,
            settings,
            runtime,
            worker: None,
            shutdown_tx,
            counters: Arc::new(WorkerCounters::default()),
        })
    }

    /// Starts the capture worker unless one is alive. Returns `true` when a
    /// worker was spawned by this call.
    pub fn ensure_running(&mut self) -> bool {
        if *self.shutdown_tx.borrow() || self.is_running() {
            return false;
        }

        let starts = self.counters.starts.fetch_add(1, Ordering::Relaxed) + 1;
        if starts > 1 {
            warn!(starts, "capture worker found dead; restarting");
        } else {
            info!("starting capture worker");
        }

        let rig = Arc::clone(&self.rig);
        let publisher = self.publisher.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let settings = self.settings.clone();
        let counters = Arc::clone(&self.counters);
        let worker = move || run_worker(rig, publisher, shutdown_rx, settings, counters);
        self.worker = Some(self.runtime.spawn_blocking(worker));
        true
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    pub fn subscribe(&self) -> EstimateReader {
        self.publisher.subscribe()
    }

    pub fn latest(&self) -> Observation {
        self.subscribe().latest()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            frames: self.counters.frames.load(Ordering::Relaxed),
            capture_failures: self.counters.capture_failures.load(Ordering::Relaxed),
            pipeline_failures: self.counters.pipeline_failures.load(Ordering::Relaxed),
            outages: self.counters.outages.load(Ordering::Relaxed),
            starts: self.counters.starts.load(Ordering::Relaxed),
        }
    }

    /// Asks the worker to exit after its current iteration. An in-flight
    /// capture is not interrupted. No worker is started afterwards.
    pub fn shutdown(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

fn run_worker(
    rig: Arc<Mutex<CaptureRig>>,
    publisher: EstimatePublisher,
    shutdown_rx: watch::Receiver<bool>,
    settings: CameraSettings,
    counters: Arc<WorkerCounters>,
) {
    let frame_interval = settings.frame_interval();
    let backoff = Duration::from_millis(settings.retry_backoff_ms);
    let mut failed_in_a_row = 0u32;

    while !*shutdown_rx.borrow() {
        let started = Instant::now();
        let published = {
            let mut rig = rig.lock();
            let CaptureRig { camera, pipeline } = &mut *rig;
            match pipeline.capture_and_process(&mut **camera) {
                Ok(observation) => {
                    failed_in_a_row = 0;
                    debug!(
                        frame_id = observation.frame_id,
                        target = ?observation.target(),
                        ready = observation.ready,
                        "pass complete"
                    );
                    counters.frames.fetch_add(1, Ordering::Relaxed);
                    publisher.publish(observation);
                    true
                }
                Err(CoreError::Capture(error)) => {
                    counters.capture_failures.fetch_add(1, Ordering::Relaxed);
                    failed_in_a_row = failed_in_a_row.saturating_add(1);
                    if failed_in_a_row == settings.stale_after_failures {
                        counters.outages.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            %error,
                            failures = failed_in_a_row,
                            "camera lost; reporting no target"
                        );
                        publisher.publish(pipeline.camera_lost());
                    } else {
                        warn!(%error, "capture failed; skipping iteration");
                    }
                    false
                }
                Err(error) => {
                    failed_in_a_row = 0;
                    counters.pipeline_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(%error, "frame could not be processed");
                    false
                }
            }
        };

        let pause = if published {
            frame_interval.saturating_sub(started.elapsed())
        } else {
            backoff
        };
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
    info!("capture worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::segmentation::{Detection, Rejection};

    fn observation(frame_id: u64) -> Observation {
        Observation {
            frame_id,
            ..Observation::initial(150.0)
        }
    }

    #[test]
    fn initial_value_is_not_fresh() {
        let (_publisher, reader) = estimate_channel(observation(0));
        assert!(!reader.is_fresh());
    }

    #[test]
    fn each_publication_is_consumed_once() {
        let (publisher, mut reader) = estimate_channel(observation(0));
        publisher.publish(observation(1));
        assert!(reader.is_fresh());
        assert_eq!(reader.consume().map(|o| o.frame_id), Some(1));
        assert!(!reader.is_fresh());
        assert!(reader.consume().is_none());
        assert_eq!(reader.latest().frame_id, 1);
    }

    #[test]
    fn readers_consume_independently() {
        let (publisher, mut first) = estimate_channel(observation(0));
        let mut second = publisher.subscribe();
        publisher.publish(observation(5));
        assert!(first.consume().is_some());
        assert!(second.is_fresh());
        let detection = second.consume().map(|o| o.detection);
        assert_eq!(detection, Some(Detection::NotFound(Rejection::NoRegions)));
    }

    #[test]
    fn only_newest_publication_survives() {
        let (publisher, mut reader) = estimate_channel(observation(0));
        publisher.publish(observation(1));
        publisher.publish(observation(2));
        assert_eq!(reader.consume().map(|o| o.frame_id), Some(2));
        assert!(reader.consume().is_none());
    }
}
