#![allow(dead_code)]

use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::sync::atomic::{AtomicUsize, Ordering};
use targeting_core::config::CameraSettings;
use targeting_core::core_modules::frame::{Camera, Frame};
use targeting_core::error::CaptureError;
use targeting_core::{Actuators, Status};

/// Saturated green-cyan that lands inside the default threshold once swapped.
pub const MARKER: Rgb<u8> = Rgb([0, 255, 200]);

pub fn blank(width: u32, height: u32) -> RgbImage {
    RgbImage::new(width, height)
}

/// Rectangular ring of marker pixels.
pub fn outline(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, thickness: u32) {
    for py in y..y + h {
        for px in x..x + w {
            let edge_x = px < x + thickness || px >= x + w - thickness;
            let edge_y = py < y + thickness || py >= y + h - thickness;
            if edge_x || edge_y {
                image.put_pixel(px, py, MARKER);
            }
        }
    }
}

pub fn fill(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    for py in y..y + h {
        for px in x..x + w {
            image.put_pixel(px, py, MARKER);
        }
    }
}

pub fn clear(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    for py in y..y + h {
        for px in x..x + w {
            image.put_pixel(px, py, Rgb([0, 0, 0]));
        }
    }
}

/// A hollow marker the default selection accepts, on a 320x240 frame.
pub fn framed_marker(x: u32, y: u32) -> RgbImage {
    let mut image = blank(320, 240);
    outline(&mut image, x, y, 100, 40, 5);
    image
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Winch(f64),
    Turn(f64),
    ShooterAngle(f64),
    ShooterSpeed(f64),
}

/// Records every command and serves scripted sensor readings. With
/// `follow_setpoints`, shooter feedback jumps to whatever was last commanded.
#[derive(Debug, Default)]
pub struct RecordingActuators {
    commands: Mutex<Vec<Command>>,
    heading: Mutex<f64>,
    shooter_angle: Mutex<f64>,
    shooter_speed: Mutex<f64>,
    statuses: Mutex<HashSet<Status>>,
    follow_setpoints: bool,
}

impl RecordingActuators {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn following() -> Arc<Self> {
        Arc::new(Self {
            follow_setpoints: true,
            ..Self::default()
        })
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    pub fn turn_rates(&self) -> Vec<f64> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Turn(rate) => Some(rate),
                _ => None,
            })
            .collect()
    }

    pub fn set_heading(&self, degrees: f64) {
        *self.heading.lock() = degrees;
    }

    pub fn set_shooter_angle(&self, degrees: f64) {
        *self.shooter_angle.lock() = degrees;
    }

    pub fn set_shooter_speed(&self, rpm: f64) {
        *self.shooter_speed.lock() = rpm;
    }

    pub fn set_status(&self, status: Status, on: bool) {
        let mut statuses = self.statuses.lock();
        if on {
            statuses.insert(status);
        } else {
            statuses.remove(&status);
        }
    }
}

impl Actuators for RecordingActuators {
    fn set_winch_target(&self, encoder_target: f64) {
        self.commands.lock().push(Command::Winch(encoder_target));
    }

    fn set_turn_rate(&self, rate: f64) {
        self.commands.lock().push(Command::Turn(rate));
    }

    fn set_shooter_angle_target(&self, degrees: f64) {
        self.commands.lock().push(Command::ShooterAngle(degrees));
        if self.follow_setpoints {
            self.set_shooter_angle(degrees);
        }
    }

    fn set_shooter_speed_target(&self, rpm: f64) {
        self.commands.lock().push(Command::ShooterSpeed(rpm));
        if self.follow_setpoints {
            self.set_shooter_speed(rpm);
        }
    }

    fn heading_degrees(&self) -> f64 {
        *self.heading.lock()
    }

    fn shooter_angle_degrees(&self) -> f64 {
        *self.shooter_angle.lock()
    }

    fn shooter_speed_rpm(&self) -> f64 {
        *self.shooter_speed.lock()
    }

    fn status(&self, status: Status) -> bool {
        self.statuses.lock().contains(&status)
    }
}

pub enum Shot {
    Image(RgbImage),
    Fail(CaptureError),
    Panic,
    /// Blocks the capture until the sender signals or is dropped, then plays
    /// the next shot.
    Hold(Receiver<()>),
}

/// Plays back a fixed script of frames, failures, holds and driver panics,
/// then reports `Exhausted` forever.
pub struct ScriptedCamera {
    script: VecDeque<Shot>,
    next_id: u64,
    configured: Arc<AtomicUsize>,
    captures: Arc<AtomicUsize>,
}

impl ScriptedCamera {
    pub fn new(script: impl IntoIterator<Item = Shot>) -> Self {
        Self {
            script: script.into_iter().collect(),
            next_id: 1,
            configured: Arc::new(AtomicUsize::new(0)),
            captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn configured(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.configured)
    }

    pub fn captures(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.captures)
    }
}

impl Camera for ScriptedCamera {
    fn configure(&mut self, _settings: &CameraSettings) -> Result<(), CaptureError> {
        self.configured.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        loop {
            match self.script.pop_front() {
                Some(Shot::Image(image)) => {
                    let frame = Frame::new(self.next_id, image);
                    self.next_id += 1;
                    return Ok(frame);
                }
                Some(Shot::Fail(error)) => return Err(error),
                Some(Shot::Panic) => panic!("scripted camera driver crash"),
                Some(Shot::Hold(release)) => {
                    let _ = release.recv();
                }
                None => return Err(CaptureError::Exhausted),
            }
        }
    }
}
