//! Image Analysis Module
//!
//! Resolution and localisation measurements on a formed B-mode image.
//!
//! ## Features
//!
//! - **PSF Profiles**: lateral and axial intensity profiles through a probe
//!   scatterer, with half-maximum widths
//! - **Image Statistics**: brightest pixel, mean level, floor occupancy and
//!   registration error against the expected scatterer
//!
//! ## Example
//!
//! ```rust,no_run
//! use bmode_core::analysis::{ImageStats, PsfAnalyzer};
//! use bmode_core::axis::AxisMapper;
//! use bmode_core::types::{LogImage, Point3};
//!
//! let image = LogImage::zeros(4000, 128); // Output of ImageFormer
//! let lateral: Vec<f64> = vec![0.0; 128]; // Scan-line positions (m)
//! let axes = AxisMapper::new(100e6, 1540.0).unwrap().map(4000, &lateral);
//!
//! let psf = PsfAnalyzer::new().analyze(&image, &axes, Point3::new(0.0, 0.0, 0.04));
//! println!("{}", psf.summary());
//!
//! let stats = ImageStats::compute(&image, &axes, 60.0);
//! println!("Peak at {:.2} mm depth", stats.peak_depth * 1e3);
//! ```

pub mod psf;
pub mod statistics;

pub use psf::{half_max_width, ProfileAxis, PsfAnalyzer, PsfResult, PsfWarning};
pub use statistics::{ImageStats, RegistrationError};
