mod common;

use approx::assert_abs_diff_eq;
use common::*;
use std::time::Instant;
use targeting_core::core_modules::segmentation::Rejection;
use targeting_core::{CoreConfig, Detection, Target, VisionPipeline};

fn analyze(config: CoreConfig, image: &image::RgbImage) -> targeting_core::Observation {
    VisionPipeline::new(config)
        .analyze(1, Instant::now(), image)
        .unwrap()
}

#[test]
fn centered_marker_has_zero_bearing() {
    let mut image = blank(320, 240);
    outline(&mut image, 140, 50, 40, 30, 3);

    let mut config = CoreConfig::default();
    config.selection.refined_min_width = 30;
    let observation = analyze(config, &image);

    assert_eq!(observation.target(), Target::new(140, 50, 40, 30));
    let estimate = observation.estimate.unwrap();
    assert_abs_diff_eq!(estimate.bearing_degrees, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(estimate.range_inches, 14874.0 / 35.0, epsilon = 1e-6);
}

#[test]
fn default_width_prior_rejects_small_marker() {
    let mut image = blank(320, 240);
    outline(&mut image, 140, 50, 40, 30, 3);
    let observation = analyze(CoreConfig::default(), &image);
    assert_eq!(observation.detection, Detection::NotFound(Rejection::NoRefinedCandidate));
    assert_eq!(observation.estimate, None);
}

#[test]
fn specks_below_noise_floor_yield_nothing() {
    let mut image = blank(320, 240);
    fill(&mut image, 10, 10, 2, 2);
    fill(&mut image, 200, 100, 1, 3);
    fill(&mut image, 300, 220, 2, 1);

    let observation = analyze(CoreConfig::default(), &image);
    assert_eq!(observation.detection, Detection::NotFound(Rejection::NoRegions));
    assert_eq!(observation.estimate, None);
    assert_eq!(observation.location, 150.0);
}

#[test]
fn near_solid_region_loses_to_hollow_one() {
    let mut image = blank(320, 240);
    // 150x60 block with a 30x30 hole: fill 0.9
    fill(&mut image, 20, 120, 150, 60);
    clear(&mut image, 80, 135, 30, 30);
    // 120x40 ring, 9 px thick: fill about 0.53
    outline(&mut image, 100, 20, 120, 40, 9);

    let observation = analyze(CoreConfig::default(), &image);
    assert_eq!(observation.target(), Target::new(100, 20, 120, 40));
}

#[test]
fn only_solid_regions_means_no_board() {
    let mut image = blank(320, 240);
    fill(&mut image, 20, 20, 90, 40);
    fill(&mut image, 150, 120, 100, 50);
    let observation = analyze(CoreConfig::default(), &image);
    assert_eq!(observation.detection, Detection::NotFound(Rejection::NoBoard));
}

#[test]
fn segmentation_is_deterministic() {
    let mut image = framed_marker(60, 90);
    fill(&mut image, 250, 10, 20, 20);
    outline(&mut image, 200, 180, 90, 30, 4);

    let first = analyze(CoreConfig::default(), &image);
    let second = analyze(CoreConfig::default(), &image);
    assert!(first.target().is_some());
    assert_eq!(first.detection, second.detection);
    assert_eq!(first.estimate, second.estimate);
}

#[test]
fn refined_pass_prefers_marker_near_reference_column() {
    let mut image = blank(320, 240);
    outline(&mut image, 20, 20, 100, 40, 5);
    outline(&mut image, 190, 150, 100, 40, 5);
    let observation = analyze(CoreConfig::default(), &image);
    assert_eq!(observation.target(), Target::new(20, 20, 100, 40));
}

#[test]
fn size_and_trigonometric_ranges_agree_at_calibration_point() {
    let mut image = blank(320, 240);
    outline(&mut image, 95, 0, 130, 70, 8);

    let mut pipeline = VisionPipeline::new(CoreConfig::default());
    let observation = pipeline.analyze(1, Instant::now(), &image).unwrap();
    let target = observation.target().unwrap();
    assert_eq!(target, Target::new(95, 0, 130, 70).unwrap());

    let sized = observation.estimate.unwrap().range_inches;
    assert_abs_diff_eq!(sized, 148.74, epsilon = 1e-9);
    let trigonometric = pipeline.estimator().range_inches_trigonometric(&target, 240);
    assert!((sized - trigonometric).abs() < 2.0, "{sized} vs {trigonometric}");
}

#[test]
fn range_scales_with_capture_resolution() {
    let mut image = blank(160, 120);
    outline(&mut image, 40, 30, 80, 30, 4);
    let observation = analyze(CoreConfig::default(), &image);
    let estimate = observation.estimate.unwrap();
    assert_abs_diff_eq!(estimate.range_inches, 14874.0 * 0.5 / 55.0, epsilon = 1e-6);
    assert_abs_diff_eq!(estimate.bearing_degrees, 0.0, epsilon = 1e-9);
}

#[test]
fn marker_shifting_vertically_is_not_ready() {
    let mut pipeline = VisionPipeline::new(CoreConfig::default());
    let still = pipeline.analyze(1, Instant::now(), &framed_marker(60, 90)).unwrap();
    assert!(!still.ready);
    assert!(pipeline.analyze(2, Instant::now(), &framed_marker(60, 92)).unwrap().ready);
    assert!(!pipeline.analyze(3, Instant::now(), &framed_marker(60, 110)).unwrap().ready);
}
