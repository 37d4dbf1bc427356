//! # Run Configuration
//!
//! Every option the pipeline recognises, loadable from YAML. Missing keys
//! take the defaults of the classic single-point PSF experiment: a 128-element
//! λ/2-pitch linear array at 5 MHz, sampled at 100 MHz, imaging one scatterer
//! at 40 mm with a single global focus at 40 mm.
//!
//! ## Example Configuration
//!
//! ```yaml
//! center_frequency: 5.0e6
//! sampling_frequency: 100.0e6
//! num_elements: 128
//! scatterer_positions:
//!   - [0.0, 0.0, 0.04]
//! scatterer_amplitudes: [1.0]
//! focus_depth: 0.04
//! depth_range: { start: 0.03, end: 0.05 }
//! rf_buffer_capacity: 4000
//! trace_alignment: zero
//! ```
//!
//! ## Buffer capacity and depth range
//!
//! The RF buffer holds `rf_buffer_capacity` samples per line, which covers a
//! depth of `capacity / fs · c / 2`. With the defaults this is 30.8 mm, short
//! of the 50 mm depth range end. [`RunConfig::depth_coverage`] reports this
//! up front instead of leaving it to be discovered as truncation.

use crate::acquisition::{PulseEchoCollector, TraceAlignment};
use crate::analysis::PsfAnalyzer;
use crate::axis::{AxisMapper, DisplayUnit};
use crate::geometry::{ArrayGeometry, GeometryPlanner};
use crate::imaging::ImageFormer;
use crate::types::{Phantom, Point3};
use crate::window::Apodization;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Fatal configuration errors, raised before any acquisition starts
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid scan line count: {0} (must be at least 1)")]
    InvalidScanLines(usize),

    #[error("invalid focus depth: {0} m (must be positive)")]
    InvalidFocusDepth(f64),

    #[error("invalid dynamic range: {0} dB (must be positive)")]
    InvalidDynamicRange(f64),

    #[error("invalid array geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid sampling parameters: {0}")]
    InvalidSampling(String),

    #[error("scatterer positions ({positions}) and amplitudes ({amplitudes}) differ in length")]
    ScattererMismatch { positions: usize, amplitudes: usize },

    #[error("no scatterers configured")]
    NoScatterers,

    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Depth interval of interest (metres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub start: f64,
    pub end: f64,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            start: 0.03,
            end: 0.05,
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Transducer centre frequency (Hz)
    pub center_frequency: f64,
    /// RF sampling frequency (Hz)
    pub sampling_frequency: f64,
    /// Speed of sound in the medium (m/s)
    pub speed_of_sound: f64,
    /// Element width (m)
    pub element_width: f64,
    /// Element height, elevation direction (m)
    pub element_height: f64,
    /// Gap between adjacent elements (m)
    pub kerf: f64,
    /// Number of array elements
    pub num_elements: usize,
    /// Scatterer positions `[x, y, z]` (m)
    pub scatterer_positions: Vec<[f64; 3]>,
    /// Scatterer reflection amplitudes, parallel to `scatterer_positions`
    pub scatterer_amplitudes: Vec<f64>,
    /// Number of scan lines
    pub num_scan_lines: usize,
    /// Transmit/receive focal depth (m)
    pub focus_depth: f64,
    /// Depth interval of interest (m)
    pub depth_range: DepthRange,
    /// Displayed dynamic range (dB)
    pub dynamic_range_db: f64,
    /// Pre-allocated samples per RF column
    pub rf_buffer_capacity: usize,

    /// How returned traces are positioned in the RF column
    pub trace_alignment: TraceAlignment,
    /// Per-line engine deadline in milliseconds
    pub line_timeout_ms: Option<u64>,
    /// Transmit apodization
    pub tx_apodization: Apodization,
    /// Receive apodization
    pub rx_apodization: Apodization,
    /// Sine cycles in the excitation waveform
    pub excitation_cycles: f64,
    /// Sine cycles in the (Hann-weighted) element impulse response
    pub impulse_cycles: f64,
    /// Standard deviation of additive receiver noise (0 disables)
    pub noise_std: f64,
    /// Seed for the receiver noise generator
    pub seed: u64,
    /// Unit for lateral coordinates and reported widths
    pub display_unit: DisplayUnit,
    /// Half-maximum drop below the profile peak (dB)
    pub psf_drop_db: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        let center_frequency = 5.0e6;
        let speed_of_sound = 1540.0;
        let wavelength = speed_of_sound / center_frequency;
        Self {
            center_frequency,
            sampling_frequency: 100.0e6,
            speed_of_sound,
            element_width: wavelength / 2.0,
            element_height: 5.0e-3,
            kerf: 0.0,
            num_elements: 128,
            scatterer_positions: vec![[0.0, 0.0, 0.04]],
            scatterer_amplitudes: vec![1.0],
            num_scan_lines: 128,
            focus_depth: 0.04,
            depth_range: DepthRange::default(),
            dynamic_range_db: 60.0,
            rf_buffer_capacity: 4000,
            trace_alignment: TraceAlignment::Zero,
            line_timeout_ms: None,
            tx_apodization: Apodization::Rectangular,
            rx_apodization: Apodization::Rectangular,
            excitation_cycles: 2.0,
            impulse_cycles: 2.0,
            noise_std: 0.0,
            seed: 0x5EED,
            display_unit: DisplayUnit::Millimeters,
            psf_drop_db: 3.0,
        }
    }
}

impl RunConfig {
    /// Load configuration from a YAML file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every fatal condition before a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_scan_lines < 1 {
            return Err(ConfigError::InvalidScanLines(self.num_scan_lines));
        }
        if !(self.focus_depth > 0.0) || !self.focus_depth.is_finite() {
            return Err(ConfigError::InvalidFocusDepth(self.focus_depth));
        }
        if !(self.dynamic_range_db > 0.0) || !self.dynamic_range_db.is_finite() {
            return Err(ConfigError::InvalidDynamicRange(self.dynamic_range_db));
        }
        self.geometry().validate()?;
        for (name, value) in [
            ("sampling_frequency", self.sampling_frequency),
            ("speed_of_sound", self.speed_of_sound),
            ("center_frequency", self.center_frequency),
            ("excitation_cycles", self.excitation_cycles),
            ("impulse_cycles", self.impulse_cycles),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::InvalidSampling(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.center_frequency >= self.sampling_frequency / 2.0 {
            return Err(ConfigError::InvalidSampling(format!(
                "center frequency {} Hz is at or above Nyquist for fs = {} Hz",
                self.center_frequency, self.sampling_frequency
            )));
        }
        if self.rf_buffer_capacity == 0 {
            return Err(ConfigError::InvalidSampling(
                "rf_buffer_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.noise_std >= 0.0) || !self.noise_std.is_finite() {
            return Err(ConfigError::InvalidSampling(format!(
                "noise_std must be non-negative, got {}",
                self.noise_std
            )));
        }
        if !(self.psf_drop_db > 0.0) {
            return Err(ConfigError::InvalidDynamicRange(self.psf_drop_db));
        }
        if !(self.depth_range.end > self.depth_range.start) {
            return Err(ConfigError::InvalidGeometry(format!(
                "depth range end {} m must exceed start {} m",
                self.depth_range.end, self.depth_range.start
            )));
        }
        if self.scatterer_positions.is_empty() {
            return Err(ConfigError::NoScatterers);
        }
        self.phantom()?;
        Ok(())
    }

    /// Wavelength at the centre frequency (m)
    pub fn wavelength(&self) -> f64 {
        self.speed_of_sound / self.center_frequency
    }

    /// Element pitch = width + kerf (m)
    pub fn pitch(&self) -> f64 {
        self.geometry().pitch()
    }

    pub fn geometry(&self) -> ArrayGeometry {
        ArrayGeometry {
            num_elements: self.num_elements,
            width: self.element_width,
            height: self.element_height,
            kerf: self.kerf,
        }
    }

    /// Scatterer collection
    pub fn phantom(&self) -> Result<Phantom, ConfigError> {
        Phantom::new(
            self.scatterer_positions.iter().map(|&p| Point3::from(p)).collect(),
            self.scatterer_amplitudes.clone(),
        )
    }

    pub fn line_timeout(&self) -> Option<Duration> {
        self.line_timeout_ms.map(Duration::from_millis)
    }

    pub fn planner(&self) -> GeometryPlanner {
        GeometryPlanner::from_geometry(&self.geometry(), self.num_scan_lines, self.focus_depth)
    }

    pub fn collector(&self) -> Result<PulseEchoCollector, ConfigError> {
        Ok(
            PulseEchoCollector::new(self.rf_buffer_capacity, self.sampling_frequency)?
                .with_alignment(self.trace_alignment)
                .with_line_timeout(self.line_timeout()),
        )
    }

    pub fn image_former(&self) -> Result<ImageFormer, ConfigError> {
        ImageFormer::new(self.dynamic_range_db)
    }

    pub fn axis_mapper(&self) -> Result<AxisMapper, ConfigError> {
        Ok(AxisMapper::new(self.sampling_frequency, self.speed_of_sound)?
            .with_unit(self.display_unit))
    }

    pub fn psf_analyzer(&self) -> PsfAnalyzer {
        PsfAnalyzer::new().with_drop_db(self.psf_drop_db)
    }

    /// Depth spanned by the RF buffer compared with the configured depth range
    pub fn depth_coverage(&self) -> DepthCoverage {
        DepthCoverage::new(
            self.rf_buffer_capacity,
            self.sampling_frequency,
            self.speed_of_sound,
            self.depth_range.end,
        )
    }
}

/// Startup check of RF buffer capacity against the depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthCoverage {
    /// Samples per RF column
    pub capacity: usize,
    /// Depth spanned by the buffer: `capacity / fs · c / 2` (m)
    pub max_depth: f64,
    /// Deepest point that must be imaged (m)
    pub required_depth: f64,
}

impl DepthCoverage {
    pub fn new(capacity: usize, sample_rate: f64, speed_of_sound: f64, required_depth: f64) -> Self {
        Self {
            capacity,
            max_depth: capacity as f64 / sample_rate * speed_of_sound / 2.0,
            required_depth,
        }
    }

    pub fn covers(&self) -> bool {
        self.max_depth >= self.required_depth
    }

    /// Missing depth (m), `None` when the buffer is deep enough
    pub fn shortfall(&self) -> Option<f64> {
        (!self.covers()).then(|| self.required_depth - self.max_depth)
    }

    /// Smallest capacity that reaches `required_depth`
    pub fn required_capacity(&self) -> usize {
        if self.max_depth <= 0.0 || self.capacity == 0 {
            return 0;
        }
        let per_sample = self.max_depth / self.capacity as f64;
        (self.required_depth / per_sample).ceil() as usize
    }
}
