// Runner for the targeting core. `analyze` runs a single vision pass over a
// saved camera frame; `simulate` replays that frame through the capture worker
// and drives the phase sequencer and targeting suite against simulated
// actuators.

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use targeting_core::core_modules::frame::{Camera, StillImageCamera};
use targeting_core::{
    Actuators, CoreConfig, CoreResult, FrameSource, PhaseKind, PhasePlans, Sequencer, Status,
    TargetingSuite, VisionPipeline,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "targeting_core",
    version,
    about = "Colour-marker targeting core",
    long_about = None
)]
struct Args {
    /// JSON configuration file. Defaults are used when omitted.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `targeting_core=debug`. `RUST_LOG` wins when set.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one vision pass over a still image and print the observation.
    Analyze {
        #[arg(long, value_name = "FILE")]
        image: PathBuf,
    },
    /// Replay a still image through the capture worker and control loop.
    Simulate {
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        /// Control ticks to run.
        #[arg(long, default_value_t = 100)]
        ticks: u32,

        /// Control loop period in milliseconds.
        #[arg(long, default_value_t = 20)]
        tick_ms: u64,

        /// Phase id to run: 0 autonomous, 1 teleop, 2 climb.
        #[arg(long, default_value_t = 1)]
        phase: i32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = match args.config.as_deref() {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            CoreConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => CoreConfig::default(),
    };

    match args.command {
        Command::Analyze { image } => analyze(config, &image),
        Command::Simulate {
            image,
            ticks,
            tick_ms,
            phase,
        } => simulate(config, &image, ticks, Duration::from_millis(tick_ms), phase).await,
    }
}

fn analyze(config: CoreConfig, image: &Path) -> anyhow::Result<()> {
    let mut camera =
        StillImageCamera::open(image).with_context(|| format!("opening {}", image.display()))?;
    camera.configure(&config.camera)?;
    let frame = camera.capture()?;
    let (width, height) = (frame.width(), frame.height());

    let mut pipeline = VisionPipeline::new(config);
    let observation = pipeline.process(frame)?;
    let trigonometric = observation
        .target()
        .map(|target| pipeline.estimator().range_inches_trigonometric(&target, height));

    let report = serde_json::json!({
        "image": image.display().to_string(),
        "width": width,
        "height": height,
        "detection": format!("{:?}", observation.detection),
        "target": observation.target(),
        "estimate": observation.estimate,
        "trigonometric_range_inches": trigonometric,
        "location": observation.location,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn simulate(
    config: CoreConfig,
    image: &Path,
    ticks: u32,
    tick: Duration,
    phase: i32,
) -> anyhow::Result<()> {
    let camera =
        StillImageCamera::open(image).with_context(|| format!("opening {}", image.display()))?;
    let actuators: Arc<dyn Actuators> = Arc::new(SimActuators::default());
    let (mut source, mut sequencer, mut suite) = assemble(config, camera, actuators, phase)?;
    suite.set_enabled(sequencer.current_kind() != Some(PhaseKind::Autonomous));

    let mut interval = tokio::time::interval(tick);
    for n in 0..ticks {
        interval.tick().await;
        source.ensure_running();
        sequencer.tick();
        suite.update();
        if n % 25 == 0 {
            info!(tick = n, telemetry = ?suite.telemetry(), "targeting");
        }
    }

    source.shutdown();
    sequencer.end_phase()?;
    suite.set_enabled(false);
    suite.update();

    let stats = source.stats();
    info!(
        frames = stats.frames,
        capture_failures = stats.capture_failures,
        pipeline_failures = stats.pipeline_failures,
        outages = stats.outages,
        starts = stats.starts,
        on_target = suite.is_on_target(),
        "simulation finished"
    );
    println!("{:#?}", suite.telemetry());
    Ok(())
}

/// Connects the capture worker, sequencer and targeting suite, and enters
/// `phase`.
fn assemble(
    config: CoreConfig,
    camera: StillImageCamera,
    actuators: Arc<dyn Actuators>,
    phase: i32,
) -> CoreResult<(FrameSource, Sequencer, TargetingSuite)> {
    let plans = PhasePlans::standard(&config.targeting);
    let targeting = config.targeting.clone();
    let source = FrameSource::new(Box::new(camera), config, tokio::runtime::Handle::current())?;
    let mut sequencer = Sequencer::new(Arc::clone(&actuators), plans);
    let suite = TargetingSuite::new(&targeting, source.subscribe(), actuators);
    sequencer.segue_to_id(phase)?;
    Ok((source, sequencer, suite))
}

/// Drivetrain and shooter that settle on every setpoint: heading integrates the
/// commanded turn rate, the shooter reaches its targets immediately.
#[derive(Debug, Default)]
struct SimActuators {
    state: Mutex<SimState>,
}

#[derive(Debug, Default)]
struct SimState {
    heading: f64,
    turn_rate: f64,
    last_turn: Option<Instant>,
    winch_target: Option<f64>,
    shooter_angle: f64,
    shooter_speed: f64,
}

const DEGREES_PER_SECOND_AT_FULL_RATE: f64 = 360.0;

impl SimState {
    fn advance_heading(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_turn {
            let elapsed = (now - last).as_secs_f64();
            self.heading += self.turn_rate * DEGREES_PER_SECOND_AT_FULL_RATE * elapsed;
        }
        self.last_turn = Some(now);
    }
}

impl Actuators for SimActuators {
    fn set_winch_target(&self, encoder_target: f64) {
        info!(encoder_target, "winch");
        self.state.lock().winch_target = Some(encoder_target);
    }

    fn set_turn_rate(&self, rate: f64) {
        debug!(rate, "turn");
        let mut state = self.state.lock();
        state.advance_heading();
        state.turn_rate = rate;
    }

    fn set_shooter_angle_target(&self, degrees: f64) {
        info!(degrees, "shooter angle");
        self.state.lock().shooter_angle = degrees;
    }

    fn set_shooter_speed_target(&self, rpm: f64) {
        info!(rpm, "shooter speed");
        self.state.lock().shooter_speed = rpm;
    }

    fn heading_degrees(&self) -> f64 {
        let mut state = self.state.lock();
        state.advance_heading();
        state.heading
    }

    fn shooter_angle_degrees(&self) -> f64 {
        self.state.lock().shooter_angle
    }

    fn shooter_speed_rpm(&self) -> f64 {
        self.state.lock().shooter_speed
    }

    fn status(&self, status: Status) -> bool {
        let state = self.state.lock();
        match status {
            Status::WinchInPosition => state.winch_target.is_some(),
            Status::ShooterInPosition => state.shooter_angle != 0.0,
            Status::ShooterAtSpeed => state.shooter_speed != 0.0,
        }
    }
}
