//! End-to-end runs of the PSF pipeline against the point-scatterer engine

use bmode_core::acquisition::TraceAlignment;
use bmode_core::config::{DepthRange, RunConfig};
use bmode_core::render::{BModeView, Colormap};
use bmode_core::types::Point3;
use bmode_sim::Session;
use std::sync::atomic::AtomicBool;

/// 32-element array imaging one scatterer at 20 mm, buffer deep enough for
/// the whole depth range
fn small_array() -> RunConfig {
    RunConfig {
        sampling_frequency: 40e6,
        num_elements: 32,
        num_scan_lines: 31,
        scatterer_positions: vec![[0.0, 0.0, 0.02]],
        scatterer_amplitudes: vec![1.0],
        focus_depth: 0.02,
        depth_range: DepthRange {
            start: 0.015,
            end: 0.025,
        },
        rf_buffer_capacity: 1400,
        trace_alignment: TraceAlignment::Absolute,
        ..Default::default()
    }
}

#[test]
fn test_point_scatterer_is_imaged_at_its_position() {
    let session = Session::setup(&small_array()).unwrap();
    let output = session.run().unwrap();

    let report = &output.acquisition.report;
    assert_eq!(report.lines_acquired, 31);
    assert!(report.is_clean(), "unexpected issues: {}", report.to_text());
    assert!(output.coverage.covers());

    let log = &output.image.log_image;
    assert_eq!(log.shape(), (1400, 31));
    assert_eq!(log.max(), 0.0);
    assert!(log.min() >= -60.0);

    // Brightest pixel on the centre line, within half a millimetre of 20 mm
    assert_eq!(output.stats.peak_col, 15);
    let err = output.stats.registration_error(Point3::new(0.0, 0.0, 0.02));
    assert!(err.axial.abs() < 5e-4, "axial registration error {} m", err.axial);
    assert!(err.lateral.abs() < 1e-12);
}

#[test]
fn test_lateral_fwhm_is_finite_and_plausible() {
    let output = Session::setup(&small_array()).unwrap().run().unwrap();
    let psf = output.primary_psf().unwrap();

    assert_eq!(psf.lateral_index, 15);
    assert_eq!(psf.lateral_profile.len(), 31);
    assert_eq!(psf.axial_profile.len(), 1400);

    // Diffraction limit λ·z/D ≈ 1.25 mm for this aperture; two-way is tighter
    let width = psf.fwhm_lateral.expect("lateral width");
    assert!(width > 0.1 && width < 2.5, "lateral FWHM {} mm", width);
    let axial = psf.fwhm_axial.expect("axial width");
    assert!(axial > 0.05 && axial < 2.0, "axial FWHM {} mm", axial);
    assert!(psf.summary().starts_with("Lateral FWHM: "));
    assert!(psf.summary().ends_with(" mm"));
}

#[test]
fn test_default_buffer_truncates_and_misses_the_scatterer() {
    // The default 4000-sample buffer spans only 30.8 mm at 100 MHz
    let config = RunConfig {
        num_elements: 16,
        num_scan_lines: 5,
        trace_alignment: TraceAlignment::Absolute,
        ..Default::default()
    };
    let coverage = config.depth_coverage();
    assert!(!coverage.covers());

    let output = Session::setup(&config).unwrap().run().unwrap();
    let report = &output.acquisition.report;
    assert_eq!(report.lines_acquired, 5);
    assert_eq!(report.truncations().count(), 5);
    assert!(report.total_discarded() > 0);
    assert!(output.to_text().contains("short of the depth range"));
}

#[test]
fn test_zero_alignment_run_points_to_absolute_alignment() {
    let config = RunConfig {
        trace_alignment: TraceAlignment::Zero,
        ..small_array()
    };
    let output = Session::setup(&config).unwrap().run().unwrap();
    let report = &output.acquisition.report;

    // Round trip to 20 mm is ~26 us; the echo lands near the top instead
    let start = report.ignored_start_time.expect("start time ignored");
    assert!(start > 1e-5, "start time {} s", start);
    assert!(output.to_text().contains("absolute trace alignment"));
    assert!(output.stats.peak_depth < 0.005);

    let aligned = Session::setup(&small_array()).unwrap().run().unwrap();
    assert_eq!(aligned.acquisition.report.ignored_start_time, None);
}

#[test]
fn test_cancelled_run_reports_gaps() {
    let session = Session::setup(&small_array()).unwrap();
    let output = session.run_with_cancel(&AtomicBool::new(true)).unwrap();
    let report = &output.acquisition.report;
    assert_eq!(report.lines_acquired, 0);
    assert_eq!(report.gaps.len(), 31);
    assert!(report.cancelled);
}

#[test]
fn test_cropped_view_of_run() {
    let config = small_array();
    let output = Session::setup(&config).unwrap().run().unwrap();
    let view = BModeView::new(&output.image.log_image, &output.axes, config.dynamic_range_db)
        .cropped(config.depth_range.start, config.depth_range.end);
    let (width, height) = view.dimensions();
    assert_eq!(width, 31);
    // 10 mm of depth at 1540 / (2 · 40 MHz) per row
    assert!((height as i64 - 520).abs() <= 1, "height {}", height);
    assert_eq!(view.to_rgb_pixels(Colormap::Grayscale).len(), width * height * 3);
}
