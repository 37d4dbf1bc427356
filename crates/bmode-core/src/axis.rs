//! Physical Image Axes
//!
//! Depth follows from round-trip travel time, `depth[i] = i / fs · c / 2`,
//! and stays in metres. Lateral positions are a pure unit conversion of the
//! scan-line positions into the display unit (millimetres by default), which
//! is also the unit in which lateral and axial widths are reported.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Unit for lateral coordinates and reported widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayUnit {
    Meters,
    #[default]
    Millimeters,
}

impl DisplayUnit {
    /// Multiplier from metres into this unit
    pub fn scale(&self) -> f64 {
        match self {
            DisplayUnit::Meters => 1.0,
            DisplayUnit::Millimeters => 1e3,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            DisplayUnit::Meters => "m",
            DisplayUnit::Millimeters => "mm",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "m" | "meters" | "metres" => Some(DisplayUnit::Meters),
            "mm" | "millimeters" | "millimetres" => Some(DisplayUnit::Millimeters),
            _ => None,
        }
    }
}

/// Coordinate vectors of the image grid
#[derive(Debug, Clone, PartialEq)]
pub struct AxisVectors {
    /// Depth of each row (m), strictly increasing from 0
    pub depth: Vec<f64>,
    /// Lateral position of each column in `lateral_unit`, increasing
    pub lateral: Vec<f64>,
    pub lateral_unit: DisplayUnit,
}

impl AxisVectors {
    /// Row spacing (m)
    pub fn depth_step(&self) -> Option<f64> {
        (self.depth.len() >= 2).then(|| self.depth[1] - self.depth[0])
    }

    /// Row nearest `z` (m); ties resolve to the lower index
    pub fn nearest_depth_index(&self, z: f64) -> Option<usize> {
        nearest_index(&self.depth, z)
    }

    /// Column nearest `x` (m); ties resolve to the lower index
    pub fn nearest_lateral_index(&self, x: f64) -> Option<usize> {
        nearest_index(&self.lateral, x * self.lateral_unit.scale())
    }

    /// Depth axis expressed in the lateral display unit
    pub fn depth_in_display_unit(&self) -> Vec<f64> {
        let scale = self.lateral_unit.scale();
        self.depth.iter().map(|d| d * scale).collect()
    }

    /// Rows whose depth falls inside `[start, end]` (m)
    pub fn depth_rows(&self, start: f64, end: f64) -> std::ops::Range<usize> {
        let first = self.depth.partition_point(|&d| d < start);
        let last = self.depth.partition_point(|&d| d <= end);
        first..last.max(first)
    }
}

/// Index of the entry nearest `target` by absolute difference
///
/// Ties resolve to the lower index. `None` for an empty slice or NaN target.
pub fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    if target.is_nan() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        let d = (v - target).abs();
        match best {
            Some((_, bd)) if !(d < bd) => {}
            _ if d.is_nan() => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Derives depth and lateral axes from sampling and sound speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapper {
    sample_rate: f64,
    speed_of_sound: f64,
    unit: DisplayUnit,
}

impl AxisMapper {
    pub fn new(sample_rate: f64, speed_of_sound: f64) -> Result<Self, ConfigError> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(ConfigError::InvalidSampling(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        if !(speed_of_sound > 0.0) || !speed_of_sound.is_finite() {
            return Err(ConfigError::InvalidSampling(format!(
                "speed of sound must be positive, got {}",
                speed_of_sound
            )));
        }
        Ok(Self {
            sample_rate,
            speed_of_sound,
            unit: DisplayUnit::default(),
        })
    }

    pub fn with_unit(mut self, unit: DisplayUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Depth spacing between consecutive samples: `c / (2·fs)` (m)
    pub fn depth_step(&self) -> f64 {
        self.speed_of_sound / (2.0 * self.sample_rate)
    }

    /// Build the axes for an image with `num_samples` rows
    pub fn map(&self, num_samples: usize, lateral_positions: &[f64]) -> AxisVectors {
        let step = self.depth_step();
        let scale = self.unit.scale();
        AxisVectors {
            depth: (0..num_samples).map(|i| i as f64 * step).collect(),
            lateral: lateral_positions.iter().map(|x| x * scale).collect(),
            lateral_unit: self.unit,
        }
    }
}
