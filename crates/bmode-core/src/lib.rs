//! # B-mode PSF Core
//!
//! Image formation and resolution measurement for synthetic B-mode ultrasound
//! of point scatterers. The pulse-echo physics is supplied by an external
//! engine through the [`PulseEchoEngine`] trait; this crate plans the scan,
//! drives the engine line by line, and turns the RF data into a calibrated
//! log image with its point spread function.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌───────────────────┐   ┌──────────────┐
//! │ GeometryPlanner │──▶│ PulseEchoCollector│──▶│ ImageFormer  │
//! │  scan lines     │   │  RF matrix        │   │  envelope/dB │
//! └─────────────────┘   └───────────────────┘   └──────────────┘
//!                                │                      │
//!                                ▼                      ▼
//!                       ┌─────────────────┐    ┌──────────────┐
//!                       │ PulseEchoEngine │    │ AxisMapper   │
//!                       │ (external)      │    │ PsfAnalyzer  │
//!                       └─────────────────┘    └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bmode_core::prelude::*;
//!
//! let config = RunConfig::default();
//! let output = bmode_core::pipeline::run(&config, &engine, &tx, &rx)?;
//! println!("{}", output.primary_psf().unwrap().summary());
//! ```

pub mod acquisition;
pub mod analysis;
pub mod axis;
pub mod config;
pub mod fft_utils;
pub mod geometry;
pub mod imaging;
pub mod pipeline;
pub mod render;
pub mod types;
pub mod window;

// Re-exports
pub use acquisition::{
    Acquisition, AcquisitionReport, ApertureControl, EchoTrace, EngineError, LineIssue,
    PulseEchoCollector, PulseEchoEngine, RfMatrix, TraceAlignment,
};
pub use analysis::{ImageStats, PsfAnalyzer, PsfResult, PsfWarning};
pub use axis::{AxisMapper, AxisVectors, DisplayUnit};
pub use config::{ConfigError, DepthCoverage, DepthRange, RunConfig};
pub use geometry::{ArrayGeometry, GeometryPlanner, ScanLine, ScanLinePlan};
pub use imaging::{FormedImage, ImageFormer};
pub use pipeline::RunOutput;
pub use render::{BModeView, Colormap};
pub use types::{ColumnMatrix, EnvelopeMatrix, LogImage, Phantom, Point3};
pub use window::Apodization;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::acquisition::{ApertureControl, PulseEchoCollector, PulseEchoEngine};
    pub use crate::analysis::PsfAnalyzer;
    pub use crate::axis::AxisMapper;
    pub use crate::config::RunConfig;
    pub use crate::geometry::GeometryPlanner;
    pub use crate::imaging::ImageFormer;
    pub use crate::types::{Phantom, Point3};
}
