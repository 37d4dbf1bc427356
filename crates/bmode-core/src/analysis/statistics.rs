//! Image Statistics
//!
//! Summary measurements of a log image: where the brightest pixel sits, how
//! much of the image is clamped to the dynamic-range floor, and how far the
//! brightest pixel lies from where a scatterer was placed.

use crate::axis::AxisVectors;
use crate::types::{LogImage, Point3};

/// Offset of the brightest pixel from an expected scatterer position (m)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationError {
    pub axial: f64,
    pub lateral: f64,
}

impl RegistrationError {
    /// Euclidean offset in the imaging plane
    pub fn magnitude(&self) -> f64 {
        self.axial.hypot(self.lateral)
    }
}

/// Summary statistics of a formed image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStats {
    /// Image rows (depth samples)
    pub rows: usize,
    /// Image columns (scan lines)
    pub cols: usize,
    /// Row of the brightest pixel
    pub peak_row: usize,
    /// Column of the brightest pixel
    pub peak_col: usize,
    /// Depth of the brightest pixel (m)
    pub peak_depth: f64,
    /// Lateral position of the brightest pixel (m)
    pub peak_lateral: f64,
    /// Mean level over all pixels (dB)
    pub mean_db: f64,
    /// Fraction of pixels at the dynamic-range floor
    pub floor_fraction: f64,
    /// Dynamic range the image was compressed to (dB)
    pub dynamic_range_db: f64,
}

impl ImageStats {
    /// Compute statistics for `image` on the grid `axes`
    pub fn compute(image: &LogImage, axes: &AxisVectors, dynamic_range_db: f64) -> Self {
        let (rows, cols) = image.shape();
        let Some((peak_row, peak_col)) = image.argmax() else {
            return Self::empty(dynamic_range_db);
        };

        let n = image.as_slice().len() as f64;
        let mean_db = image.as_slice().iter().sum::<f64>() / n;
        let floor = -dynamic_range_db;
        let at_floor = image.as_slice().iter().filter(|&&v| v <= floor).count();

        let scale = axes.lateral_unit.scale();
        Self {
            rows,
            cols,
            peak_row,
            peak_col,
            peak_depth: axes.depth.get(peak_row).copied().unwrap_or(f64::NAN),
            peak_lateral: axes
                .lateral
                .get(peak_col)
                .map(|x| x / scale)
                .unwrap_or(f64::NAN),
            mean_db,
            floor_fraction: at_floor as f64 / n,
            dynamic_range_db,
        }
    }

    fn empty(dynamic_range_db: f64) -> Self {
        Self {
            rows: 0,
            cols: 0,
            peak_row: 0,
            peak_col: 0,
            peak_depth: f64::NAN,
            peak_lateral: f64::NAN,
            mean_db: f64::NAN,
            floor_fraction: 0.0,
            dynamic_range_db,
        }
    }

    /// Offset of the brightest pixel from `expected`
    pub fn registration_error(&self, expected: Point3) -> RegistrationError {
        RegistrationError {
            axial: self.peak_depth - expected.z,
            lateral: self.peak_lateral - expected.x,
        }
    }

    /// Format as text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str("Image Statistics\n");
        output.push_str(&"═".repeat(50));
        output.push('\n');
        output.push_str(&format!("Size:              {} x {} (depth x lines)\n", self.rows, self.cols));
        output.push_str(&format!("Dynamic Range:     {:.1} dB\n", self.dynamic_range_db));
        output.push_str(&format!(
            "Peak Pixel:        row {}, column {}\n",
            self.peak_row, self.peak_col
        ));
        output.push_str(&format!(
            "Peak Position:     z = {:.3} mm, x = {:.3} mm\n",
            self.peak_depth * 1e3,
            self.peak_lateral * 1e3
        ));
        output.push_str(&format!("Mean Level:        {:.2} dB\n", self.mean_db));
        output.push_str(&format!("At Floor:          {:.1} %\n", self.floor_fraction * 100.0));
        output
    }

    /// Format as JSON
    pub fn to_json(&self) -> String {
        format!(
            r#"{{
  "rows": {},
  "cols": {},
  "dynamic_range_db": {:.3},
  "peak": {{
    "row": {},
    "col": {},
    "depth_m": {},
    "lateral_m": {}
  }},
  "mean_db": {},
  "floor_fraction": {:.6}
}}"#,
            self.rows,
            self.cols,
            self.dynamic_range_db,
            self.peak_row,
            self.peak_col,
            json_number(self.peak_depth),
            json_number(self.peak_lateral),
            json_number(self.mean_db),
            self.floor_fraction
        )
    }
}

fn json_number(value: f64) -> String {
    if value.is_finite() {
        format!("{:.6}", value)
    } else {
        "null".to_string()
    }
}
