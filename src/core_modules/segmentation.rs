// THEORY:
// Segmentation turns one raw colour frame into at most one `Target`.
//
// 1.  **Plane swap**: hue, saturation and value replace R, G and B
//     (`pixel::swap_to_hsv_planes`).
// 2.  **Threshold**: a pixel is foreground when every swapped channel falls in
//     its calibrated inclusive range.
// 3.  **Regions**: 8-connected components of the mask, minus anything under the
//     noise floor.
// 4.  **Board pass**: the largest region that fills strictly less than
//     `board_max_fill` of its bounding box. Near-solid rectangles are glare or
//     structure, not the hollow marker frame.
// 5.  **Refined pass**: among regions at least `refined_min_area_ratio` of the
//     board's area, wider and taller than the minimums and below
//     `refined_max_fill`, the one whose center of mass is closest to the
//     reference column.
//
// The raw largest component is often a reflection or colour bleed, so the
// second pass trades recall for precision. When either pass finds nothing the
// frame has no target; the previous frame's selection is never carried over.
//
// Every intermediate buffer (swapped planes, mask, label image) is owned by the
// `segment` call and released when it returns, on every path.

use crate::config::{SelectionConfig, ThresholdConfig};
use crate::core_modules::pixel::pixel::swap_to_hsv_planes;
use crate::core_modules::region::{Region, RegionAccumulator, Target};
use crate::error::SegmentationError;
use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{Connectivity, connected_components};

const FOREGROUND: Luma<u8> = Luma([255]);
const BACKGROUND: Luma<u8> = Luma([0]);

/// Result of one segmentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Found(Target),
    NotFound(Rejection),
}

/// Why a pass produced no target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing survived the threshold and noise floor.
    NoRegions,
    /// Every region was too solid to be the marker.
    NoBoard,
    /// No region passed the shape/position filter.
    NoRefinedCandidate,
    /// The camera stopped delivering frames.
    NoFrame,
}

impl Detection {
    pub fn target(&self) -> Option<Target> {
        match self {
            Detection::Found(target) => Some(*target),
            Detection::NotFound(_) => None,
        }
    }
}

/// Runs the full segmentation pass over one frame.
pub fn segment(
    image: &RgbImage,
    threshold: &ThresholdConfig,
    selection: &SelectionConfig,
) -> Result<Detection, SegmentationError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SegmentationError::EmptyFrame { width, height });
    }

    let swapped = swap_to_hsv_planes(image);
    let mask = threshold_planes(&swapped, threshold);
    let regions = extract_regions(&mask, selection.min_region_pixels);
    if regions.is_empty() {
        return Ok(Detection::NotFound(Rejection::NoRegions));
    }

    let Some(board) = select_board(&regions, selection) else {
        return Ok(Detection::NotFound(Rejection::NoBoard));
    };

    let detection = select_refined(&regions, board.area, selection)
        .and_then(Region::to_target)
        .map_or(Detection::NotFound(Rejection::NoRefinedCandidate), Detection::Found);
    Ok(detection)
}

/// Binary mask of pixels whose swapped H, S, V planes all fall in range.
pub fn threshold_planes(swapped: &RgbImage, threshold: &ThresholdConfig) -> GrayImage {
    let mut mask = GrayImage::new(swapped.width(), swapped.height());
    for (src, dst) in swapped.pixels().zip(mask.pixels_mut()) {
        let inside = threshold.hue.contains(src[0])
            && threshold.saturation.contains(src[1])
            && threshold.value.contains(src[2]);
        *dst = if inside { FOREGROUND } else { BACKGROUND };
    }
    mask
}

/// 8-connected foreground components with at least `min_pixels` pixels,
/// ordered by label (raster order of each component's first pixel).
pub fn extract_regions(mask: &GrayImage, min_pixels: u32) -> Vec<Region> {
    let labels = connected_components(mask, Connectivity::Eight, BACKGROUND);

    let mut accumulators: Vec<RegionAccumulator> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if accumulators.len() < label {
            accumulators.resize(label, RegionAccumulator::default());
        }
        accumulators[label - 1].add(x, y);
    }

    accumulators
        .iter()
        .enumerate()
        .filter_map(|(i, acc)| acc.finish(i as u32 + 1))
        .filter(|region| region.area >= min_pixels)
        .collect()
}

/// Coarse pass: largest region below the board fill limit. Ties keep the
/// earlier region.
pub fn select_board<'a>(regions: &'a [Region], selection: &SelectionConfig) -> Option<&'a Region> {
    let mut board: Option<&Region> = None;
    for region in regions {
        let hollow = region.fill_ratio() < selection.board_max_fill;
        if hollow && board.is_none_or(|b| b.area < region.area) {
            board = Some(region);
        }
    }
    board
}

/// Shape/position pass relative to the board's area.
pub fn select_refined<'a>(
    regions: &'a [Region],
    board_area: u32,
    selection: &SelectionConfig,
) -> Option<&'a Region> {
    let column_error =
        |region: &Region| (region.center_of_mass.0 - selection.reference_column).abs();

    let mut best: Option<&Region> = None;
    for region in regions {
        let plausible = region.area as f64 > board_area as f64 * selection.refined_min_area_ratio
            && region.width() > selection.refined_min_width
            && region.height() > selection.refined_min_height
            && region.fill_ratio() < selection.refined_max_fill;
        if plausible && best.is_none_or(|b| column_error(b) > column_error(region)) {
            best = Some(region);
        }
    }
    best
}
