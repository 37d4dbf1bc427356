//! Scan Geometry Planning
//!
//! Lays out the scan lines of a linear array: lateral positions spread
//! linearly across the half-aperture extent `±N/2 · pitch`, each with a
//! single global focus at `focus_depth`.
//!
//! ```text
//!   -N/2·p                      0                      +N/2·p
//!     |────|────|────|────|────|────|────|────|────|────|   scan lines
//!     ·    ·    ·    ·    ·    ·    ·    ·    ·    ·    ·
//!     ×    ×    ×    ×    ×    ×    ×    ×    ×    ×    ×   z = focus_depth
//! ```
//!
//! Line positions are interpolated, not snapped to element centres.

use crate::config::ConfigError;
use crate::types::Point3;

/// Linear array element geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayGeometry {
    /// Number of elements
    pub num_elements: usize,
    /// Element width (m)
    pub width: f64,
    /// Element height (m)
    pub height: f64,
    /// Inter-element gap (m)
    pub kerf: f64,
}

impl ArrayGeometry {
    /// Centre-to-centre element spacing (m)
    pub fn pitch(&self) -> f64 {
        self.width + self.kerf
    }

    /// Lateral half-extent `N/2 · pitch` (m)
    pub fn half_aperture(&self) -> f64 {
        self.num_elements as f64 / 2.0 * self.pitch()
    }

    /// Lateral centre of each element, symmetric about 0
    pub fn element_positions(&self) -> Vec<f64> {
        let offset = (self.num_elements as f64 - 1.0) / 2.0;
        (0..self.num_elements)
            .map(|i| (i as f64 - offset) * self.pitch())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_elements == 0 {
            return Err(ConfigError::InvalidGeometry(
                "array must have at least one element".to_string(),
            ));
        }
        if !(self.width > 0.0) || !(self.height > 0.0) {
            return Err(ConfigError::InvalidGeometry(format!(
                "element size must be positive, got {} x {} m",
                self.width, self.height
            )));
        }
        if !(self.kerf >= 0.0) || !self.pitch().is_finite() {
            return Err(ConfigError::InvalidGeometry(format!(
                "kerf must be non-negative, got {} m",
                self.kerf
            )));
        }
        Ok(())
    }
}

/// One planned scan line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanLine {
    /// Column index in the RF matrix
    pub index: usize,
    /// Lateral position (m)
    pub lateral_x: f64,
    /// Shared transmit/receive focal point
    pub focus: Point3,
}

impl ScanLine {
    /// Aperture reference point on the array face
    pub fn center(&self) -> Point3 {
        Point3::new(self.lateral_x, 0.0, 0.0)
    }
}

/// Ordered scan lines with strictly increasing lateral positions
#[derive(Debug, Clone, PartialEq)]
pub struct ScanLinePlan {
    lines: Vec<ScanLine>,
    focus_depth: f64,
}

impl ScanLinePlan {
    pub fn lines(&self) -> &[ScanLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn focus_depth(&self) -> f64 {
        self.focus_depth
    }

    pub fn lateral_positions(&self) -> Vec<f64> {
        self.lines.iter().map(|l| l.lateral_x).collect()
    }

    /// Format as CSV (`line,lateral_x_m,focus_x_m,focus_y_m,focus_z_m`)
    pub fn to_csv(&self) -> String {
        let mut output = String::from("line,lateral_x_m,focus_x_m,focus_y_m,focus_z_m\n");
        for line in &self.lines {
            output.push_str(&format!(
                "{},{},{},{},{}\n",
                line.index, line.lateral_x, line.focus.x, line.focus.y, line.focus.z
            ));
        }
        output
    }
}

/// Computes the scan-line plan from array pitch, element count and focus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryPlanner {
    num_elements: usize,
    pitch: f64,
    scan_lines: usize,
    focus_depth: f64,
}

impl GeometryPlanner {
    pub fn new(num_elements: usize, pitch: f64, scan_lines: usize, focus_depth: f64) -> Self {
        Self {
            num_elements,
            pitch,
            scan_lines,
            focus_depth,
        }
    }

    pub fn from_geometry(geometry: &ArrayGeometry, scan_lines: usize, focus_depth: f64) -> Self {
        Self::new(geometry.num_elements, geometry.pitch(), scan_lines, focus_depth)
    }

    /// Lateral half-extent `N/2 · pitch` (m)
    pub fn half_aperture(&self) -> f64 {
        self.num_elements as f64 / 2.0 * self.pitch
    }

    /// Produce the scan-line plan
    pub fn plan(&self) -> Result<ScanLinePlan, ConfigError> {
        if self.scan_lines < 1 {
            return Err(ConfigError::InvalidScanLines(self.scan_lines));
        }
        if !(self.focus_depth > 0.0) || !self.focus_depth.is_finite() {
            return Err(ConfigError::InvalidFocusDepth(self.focus_depth));
        }
        if self.num_elements == 0 || !(self.pitch > 0.0) || !self.pitch.is_finite() {
            return Err(ConfigError::InvalidGeometry(format!(
                "need at least one element and positive pitch, got {} elements at {} m",
                self.num_elements, self.pitch
            )));
        }

        let half = self.half_aperture();
        let lines = symmetric_linspace(half, self.scan_lines)
            .into_iter()
            .enumerate()
            .map(|(index, lateral_x)| ScanLine {
                index,
                lateral_x,
                focus: Point3::new(lateral_x, 0.0, self.focus_depth),
            })
            .collect();

        Ok(ScanLinePlan {
            lines,
            focus_depth: self.focus_depth,
        })
    }
}

/// `n` points spaced linearly over `[-half, +half]`, endpoints included
///
/// Mirrored points are exact negatives of each other. A single point sits
/// at the centre.
fn symmetric_linspace(half: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![0.0];
    }
    let span = (n - 1) as f64;
    (0..n)
        .map(|i| half * ((2.0 * i as f64 - span) / span))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lateral_positions_symmetric_and_increasing() {
        for &(n, pitch, lines) in &[(128, 1.54e-4, 128), (64, 3.0e-4, 33), (7, 1e-3, 2), (1, 2e-4, 5)] {
            let plan = GeometryPlanner::new(n, pitch, lines, 0.03).plan().unwrap();
            let x = plan.lateral_positions();
            assert_eq!(x.len(), lines);
            assert_eq!(x[0], -x[lines - 1], "first must equal -last");
            for i in 0..lines {
                assert_eq!(x[i], -x[lines - 1 - i]);
            }
            assert!(x.windows(2).all(|w| w[1] > w[0]), "positions must increase");
        }
    }

    #[test]
    fn test_literal_span_128_elements() {
        let plan = GeometryPlanner::new(128, 1.54e-4, 128, 0.04).plan().unwrap();
        let x = plan.lateral_positions();
        assert!((x[0] + 0.009856).abs() < 1e-12);
        assert!((x[127] - 0.009856).abs() < 1e-12);
        assert!((x[127] - 0.00985).abs() < 1e-5);
    }

    #[test]
    fn test_focus_is_global() {
        let plan = GeometryPlanner::new(16, 3e-4, 9, 0.025).plan().unwrap();
        for line in plan.lines() {
            assert_eq!(line.focus, Point3::new(line.lateral_x, 0.0, 0.025));
            assert_eq!(line.center().z, 0.0);
        }
        assert_eq!(plan.lines()[4].lateral_x, 0.0);
    }

    #[test]
    fn test_single_line_at_centre() {
        let plan = GeometryPlanner::new(128, 1.54e-4, 1, 0.04).plan().unwrap();
        assert_eq!(plan.lateral_positions(), vec![0.0]);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            GeometryPlanner::new(128, 1.54e-4, 0, 0.04).plan(),
            Err(ConfigError::InvalidScanLines(0))
        );
        assert_eq!(
            GeometryPlanner::new(128, 1.54e-4, 10, 0.0).plan(),
            Err(ConfigError::InvalidFocusDepth(0.0))
        );
        assert!(matches!(
            GeometryPlanner::new(128, 1.54e-4, 10, -0.01).plan(),
            Err(ConfigError::InvalidFocusDepth(_))
        ));
        assert!(matches!(
            GeometryPlanner::new(0, 1.54e-4, 10, 0.04).plan(),
            Err(ConfigError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_element_positions_centred() {
        let geometry = ArrayGeometry {
            num_elements: 4,
            width: 2e-4,
            height: 5e-3,
            kerf: 1e-4,
        };
        let pos = geometry.element_positions();
        assert!((pos[0] + 4.5e-4).abs() < 1e-15);
        assert!((pos[3] - 4.5e-4).abs() < 1e-15);
        assert!((geometry.half_aperture() - 6e-4).abs() < 1e-15);
    }
}
