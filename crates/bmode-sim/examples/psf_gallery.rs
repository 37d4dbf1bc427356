//! PSF Gallery Generator
//!
//! Images a single scatterer at 40 mm while sweeping the transmit/receive
//! focus, and with different apodizations, writing one PNG per setting plus a
//! CSV summary of the lateral widths.
//!
//! Run with: cargo run --example psf_gallery -p bmode-sim --features image

use bmode_core::acquisition::TraceAlignment;
use bmode_core::config::RunConfig;
use bmode_core::render::{BModeView, Colormap};
use bmode_core::window::Apodization;
use bmode_sim::{Session, SimError};
use std::fs;

const GALLERY_DIR: &str = "gallery";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("B-mode PSF Gallery Generator");
    println!("============================\n");

    for subdir in &["focus", "apodization"] {
        fs::create_dir_all(format!("{}/{}", GALLERY_DIR, subdir))?;
    }

    let mut summary = String::from("setting,lateral_fwhm_mm,axial_fwhm_mm\n");

    println!("Sweeping focus depth...");
    for focus_mm in [20.0, 30.0, 40.0, 50.0] {
        let config = RunConfig {
            focus_depth: focus_mm * 1e-3,
            ..base_config()
        };
        let line = render(&config, &format!("{}/focus/focus_{}mm.png", GALLERY_DIR, focus_mm as i32))?;
        summary.push_str(&format!("focus_{}mm,{}\n", focus_mm as i32, line));
    }

    println!("Comparing apodizations...");
    for apodization in [
        Apodization::Rectangular,
        Apodization::Hann,
        Apodization::Hamming,
        Apodization::Tukey(0.5),
    ] {
        let config = RunConfig {
            tx_apodization: apodization,
            rx_apodization: apodization,
            ..base_config()
        };
        let name = apodization.to_string().replace(':', "_");
        let line = render(&config, &format!("{}/apodization/{}.png", GALLERY_DIR, name))?;
        summary.push_str(&format!("{},{}\n", name, line));
    }

    fs::write(format!("{}/summary.csv", GALLERY_DIR), summary)?;
    println!("\nGallery generation complete!");
    println!("Images saved to: {}/", GALLERY_DIR);
    Ok(())
}

/// 64 elements, 65 lines, buffer deep enough for the 30-50 mm window
fn base_config() -> RunConfig {
    RunConfig {
        num_elements: 64,
        num_scan_lines: 65,
        rf_buffer_capacity: 6600,
        trace_alignment: TraceAlignment::Absolute,
        ..Default::default()
    }
}

/// Run one configuration, write its PNG, return `lateral,axial` widths
fn render(config: &RunConfig, path: &str) -> Result<String, SimError> {
    let output = Session::setup(config)?.run()?;
    let view = BModeView::new(&output.image.log_image, &output.axes, config.dynamic_range_db)
        .cropped(config.depth_range.start, config.depth_range.end);

    match view.to_png(Colormap::Grayscale) {
        Ok(png) => match fs::write(path, png) {
            Ok(()) => println!("  {}", path),
            Err(e) => eprintln!("  failed to write {}: {}", path, e),
        },
        Err(e) => eprintln!("  failed to encode {}: {}", path, e),
    }

    let width = |w: Option<f64>| w.map(|v| format!("{:.3}", v)).unwrap_or_default();
    Ok(match output.primary_psf() {
        Some(psf) => format!("{},{}", width(psf.fwhm_lateral), width(psf.fwhm_axial)),
        None => ",".to_string(),
    })
}
