// THEORY:
// A `Region` is one connected patch of pixels that passed the colour threshold
// in a single frame. It is the spatial summary the selection heuristic reasons
// about: how many pixels it has, how big its bounding box is, how much of that
// box it fills, and where its mass is centred horizontally.
//
// Like the other data containers in this crate it is stateless and frame-local.
// Regions are rebuilt from scratch on every pass and never compared across
// frames; the only thing that outlives a pass is the `Target` the selection
// emits.

use serde::{Deserialize, Serialize};

/// Bounding region `{x, y, w, h}` in frame pixel coordinates, believed to be the
/// field marker. Always has `w > 0 && h > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Target {
    /// Returns `None` for zero-area boxes.
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Option<Self> {
        (w > 0 && h > 0).then_some(Self { x, y, w, h })
    }

    pub fn center_x(&self) -> f64 {
        self.x as f64 + self.w as f64 / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y as f64 + self.h as f64 / 2.0
    }

    /// Mean of width and height, the apparent size used for ranging.
    pub fn mean_size(&self) -> f64 {
        (self.w as f64 + self.h as f64) / 2.0
    }
}

/// A connected component summarized for candidate selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Component label for the current frame only. Not persistent.
    pub label: u32,
    /// Number of pixels in the component.
    pub area: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    /// Unweighted centroid of the component's pixels.
    pub center_of_mass: (f64, f64),
}

impl Region {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn bounding_area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Share of the bounding box covered by the component, in (0, 1].
    pub fn fill_ratio(&self) -> f64 {
        self.area as f64 / self.bounding_area() as f64
    }

    pub fn to_target(&self) -> Option<Target> {
        Target::new(self.min_x, self.min_y, self.width(), self.height())
    }
}

/// Incremental accumulator used while scanning a label image.
#[derive(Debug, Clone)]
pub(crate) struct RegionAccumulator {
    area: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: u64,
    sum_y: u64,
}

impl Default for RegionAccumulator {
    fn default() -> Self {
        Self {
            area: 0,
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            sum_x: 0,
            sum_y: 0,
        }
    }
}

impl RegionAccumulator {
    pub(crate) fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.sum_x += x as u64;
        self.sum_y += y as u64;
    }

    pub(crate) fn finish(&self, label: u32) -> Option<Region> {
        if self.area == 0 {
            return None;
        }
        let area = self.area as f64;
        Some(Region {
            label,
            area: self.area,
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.max_x,
            max_y: self.max_y,
            center_of_mass: (self.sum_x as f64 / area, self.sum_y as f64 / area),
        })
    }
}
