//! Point Spread Function Measurement
//!
//! Extracts the lateral profile (image row at the probe depth) and the axial
//! profile (image column at the probe lateral position) and measures their
//! half-maximum width.
//!
//! The width spans the outermost samples at or above `peak - drop_db`. It is
//! not restricted to the contiguous run around the peak, so a side lobe that
//! clears the threshold widens the result. A profile that never falls below
//! the threshold has no measurable width.
//!
//! Columns whose engine call failed sit at the image floor, indistinguishable
//! from silence. When the unacquired lines are known they are left out of the
//! lateral width and listed in the result's warnings.

use crate::axis::{nearest_index, AxisVectors, DisplayUnit};
use crate::types::{LogImage, Phantom, Point3};
use std::fmt;

/// Profile direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAxis {
    Lateral,
    Axial,
}

impl fmt::Display for ProfileAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileAxis::Lateral => write!(f, "lateral"),
            ProfileAxis::Axial => write!(f, "axial"),
        }
    }
}

/// Non-fatal conditions met during PSF analysis
#[derive(Debug, Clone, PartialEq)]
pub enum PsfWarning {
    /// Width undefined: the profile is empty or never drops below threshold
    DegenerateProfile { axis: ProfileAxis, drop_db: f64 },
    /// Probe coordinate lies beyond the image grid; the edge sample was used
    ProbeOutsideAxis { axis: ProfileAxis, coordinate: f64 },
    /// The lateral profile crosses columns that were never acquired
    UnacquiredLines { lines: Vec<usize>, probe_line: bool },
}

impl fmt::Display for PsfWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PsfWarning::DegenerateProfile { axis, drop_db } => write!(
                f,
                "{} profile never drops {:.1} dB below its peak, width undefined",
                axis, drop_db
            ),
            PsfWarning::ProbeOutsideAxis { axis, coordinate } => write!(
                f,
                "probe {} coordinate {} m lies outside the image, nearest edge used",
                axis, coordinate
            ),
            PsfWarning::UnacquiredLines { lines, probe_line } => {
                write!(
                    f,
                    "lateral profile crosses unacquired lines {:?}, excluded from the width",
                    lines
                )?;
                if *probe_line {
                    write!(f, "; the probe line itself is missing, axial width undefined")?;
                }
                Ok(())
            }
        }
    }
}

/// Profiles and widths through one probe location
#[derive(Debug, Clone, PartialEq)]
pub struct PsfResult {
    /// Probe location (m)
    pub probe: Point3,
    /// Image row nearest the probe depth
    pub depth_index: usize,
    /// Image column nearest the probe lateral position
    pub lateral_index: usize,
    /// `LogImage[depth_index, :]` (dB)
    pub lateral_profile: Vec<f64>,
    /// `LogImage[:, lateral_index]` (dB)
    pub axial_profile: Vec<f64>,
    /// Lateral half-maximum width in `unit`
    pub fwhm_lateral: Option<f64>,
    /// Axial half-maximum width in `unit`
    pub fwhm_axial: Option<f64>,
    pub unit: DisplayUnit,
    pub drop_db: f64,
    pub warnings: Vec<PsfWarning>,
}

impl PsfResult {
    /// One-line lateral resolution summary
    pub fn summary(&self) -> String {
        match self.fwhm_lateral {
            Some(w) => format!("Lateral FWHM: {:.2} {}", w, self.unit.suffix()),
            None => "Lateral FWHM: undefined".to_string(),
        }
    }

    /// Format as text report
    pub fn to_text(&self) -> String {
        let unit = self.unit.suffix();
        let mut output = String::new();
        output.push_str("Point Spread Function\n");
        output.push_str(&"═".repeat(50));
        output.push('\n');
        output.push_str(&format!(
            "Probe:             ({:.2}, {:.2}, {:.2}) mm\n",
            self.probe.x * 1e3,
            self.probe.y * 1e3,
            self.probe.z * 1e3
        ));
        output.push_str(&format!(
            "Grid Index:        row {}, column {}\n",
            self.depth_index, self.lateral_index
        ));
        output.push_str(&format!("Threshold:         -{:.1} dB from profile peak\n", self.drop_db));
        output.push_str(&"─".repeat(50));
        output.push('\n');
        output.push_str(&format_width("Lateral FWHM:", self.fwhm_lateral, unit));
        output.push_str(&format_width("Axial FWHM:", self.fwhm_axial, unit));
        for warning in &self.warnings {
            output.push_str(&format!("  warning: {}\n", warning));
        }
        output
    }

    /// Format as JSON
    pub fn to_json(&self) -> String {
        let warnings: Vec<String> = self
            .warnings
            .iter()
            .map(|w| format!("\"{}\"", w))
            .collect();
        format!(
            r#"{{
  "probe_m": [{:.6}, {:.6}, {:.6}],
  "depth_index": {},
  "lateral_index": {},
  "unit": "{}",
  "drop_db": {:.3},
  "fwhm_lateral": {},
  "fwhm_axial": {},
  "warnings": [{}]
}}"#,
            self.probe.x,
            self.probe.y,
            self.probe.z,
            self.depth_index,
            self.lateral_index,
            self.unit.suffix(),
            self.drop_db,
            json_option(self.fwhm_lateral),
            json_option(self.fwhm_axial),
            warnings.join(", ")
        )
    }

    /// Both profiles as CSV (`axis,index,coordinate,level_db`)
    ///
    /// Coordinates are lateral positions for the lateral profile and depths
    /// for the axial profile, both in the result unit.
    pub fn to_csv(&self, axes: &AxisVectors) -> String {
        let mut output = String::from("axis,index,coordinate,level_db\n");
        for (i, (&x, &db)) in axes.lateral.iter().zip(&self.lateral_profile).enumerate() {
            output.push_str(&format!("lateral,{},{},{}\n", i, x, db));
        }
        let depth = axes.depth_in_display_unit();
        for (i, (&z, &db)) in depth.iter().zip(&self.axial_profile).enumerate() {
            output.push_str(&format!("axial,{},{},{}\n", i, z, db));
        }
        output
    }
}

fn format_width(label: &str, width: Option<f64>, unit: &str) -> String {
    match width {
        Some(w) => format!("{:<19}{:.2} {}\n", label, w, unit),
        None => format!("{:<19}undefined\n", label),
    }
}

fn json_option(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.6}", v))
        .unwrap_or_else(|| "null".to_string())
}

/// Half-maximum width of `profile` sampled at `coords`
///
/// `threshold = max(profile) - drop_db`; the width is
/// `coords[last] - coords[first]` over all samples at or above it. `None` if
/// the profile is empty or no sample falls below the threshold.
pub fn half_max_width(profile: &[f64], coords: &[f64], drop_db: f64) -> Option<f64> {
    let n = profile.len().min(coords.len());
    let profile = &profile[..n];
    let peak = profile.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return None;
    }
    let threshold = peak - drop_db;
    if profile.iter().all(|&v| v >= threshold) {
        return None;
    }
    let first = profile.iter().position(|&v| v >= threshold)?;
    let last = profile.iter().rposition(|&v| v >= threshold)?;
    Some(coords[last] - coords[first])
}

/// Measures PSF profiles and widths on a log image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsfAnalyzer {
    /// Drop below the profile peak defining the width (dB)
    drop_db: f64,
}

impl Default for PsfAnalyzer {
    fn default() -> Self {
        Self { drop_db: 3.0 }
    }
}

impl PsfAnalyzer {
    /// Create an analyzer with the standard 3 dB drop
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the drop below peak
    pub fn with_drop_db(mut self, drop_db: f64) -> Self {
        self.drop_db = drop_db;
        self
    }

    pub fn drop_db(&self) -> f64 {
        self.drop_db
    }

    /// Profiles and widths through `probe`
    pub fn analyze(&self, image: &LogImage, axes: &AxisVectors, probe: Point3) -> PsfResult {
        self.analyze_with_gaps(image, axes, probe, &[])
    }

    /// Profiles and widths through `probe`, treating the columns in `gaps`
    /// as missing data rather than silence
    pub fn analyze_with_gaps(
        &self,
        image: &LogImage,
        axes: &AxisVectors,
        probe: Point3,
        gaps: &[usize],
    ) -> PsfResult {
        let mut warnings = Vec::new();
        let rows = image.rows().min(axes.depth.len());
        let cols = image.cols().min(axes.lateral.len());

        let probe_x = probe.x * axes.lateral_unit.scale();
        if outside(&axes.depth[..rows], probe.z) {
            warnings.push(PsfWarning::ProbeOutsideAxis {
                axis: ProfileAxis::Axial,
                coordinate: probe.z,
            });
        }
        if outside(&axes.lateral[..cols], probe_x) {
            warnings.push(PsfWarning::ProbeOutsideAxis {
                axis: ProfileAxis::Lateral,
                coordinate: probe.x,
            });
        }

        let depth_index = nearest_index(&axes.depth[..rows], probe.z);
        let lateral_index = nearest_index(&axes.lateral[..cols], probe_x);

        let lateral_profile: Vec<f64> = match depth_index {
            Some(row) => (0..cols).map(|col| image.get(row, col)).collect(),
            None => Vec::new(),
        };
        let axial_profile: Vec<f64> = match lateral_index {
            Some(col) => image.column(col)[..rows].to_vec(),
            None => Vec::new(),
        };

        let missing: Vec<usize> = gaps.iter().copied().filter(|&g| g < cols).collect();
        let probe_line = lateral_index.map_or(false, |col| missing.contains(&col));

        let fwhm_lateral = if missing.is_empty() {
            half_max_width(&lateral_profile, &axes.lateral[..cols], self.drop_db)
        } else {
            let (profile, coords): (Vec<f64>, Vec<f64>) = lateral_profile
                .iter()
                .zip(&axes.lateral[..cols])
                .enumerate()
                .filter(|(col, _)| !missing.contains(col))
                .map(|(_, (&db, &x))| (db, x))
                .unzip();
            half_max_width(&profile, &coords, self.drop_db)
        };
        let depth = axes.depth_in_display_unit();
        let fwhm_axial = if probe_line {
            None
        } else {
            half_max_width(&axial_profile, &depth[..rows], self.drop_db)
        };

        if !missing.is_empty() {
            warnings.push(PsfWarning::UnacquiredLines {
                lines: missing,
                probe_line,
            });
        }
        for (width, axis) in [
            (fwhm_lateral, ProfileAxis::Lateral),
            (fwhm_axial, ProfileAxis::Axial),
        ] {
            if width.is_none() && !(probe_line && axis == ProfileAxis::Axial) {
                warnings.push(PsfWarning::DegenerateProfile {
                    axis,
                    drop_db: self.drop_db,
                });
            }
        }

        PsfResult {
            probe,
            depth_index: depth_index.unwrap_or(0),
            lateral_index: lateral_index.unwrap_or(0),
            lateral_profile,
            axial_profile,
            fwhm_lateral,
            fwhm_axial,
            unit: axes.lateral_unit,
            drop_db: self.drop_db,
            warnings,
        }
    }

    /// One result per scatterer of `phantom`, in phantom order
    pub fn analyze_all(
        &self,
        image: &LogImage,
        axes: &AxisVectors,
        phantom: &Phantom,
        gaps: &[usize],
    ) -> Vec<PsfResult> {
        phantom
            .positions()
            .iter()
            .map(|&p| self.analyze_with_gaps(image, axes, p, gaps))
            .collect()
    }
}

fn outside(values: &[f64], target: f64) -> bool {
    match (values.first(), values.last()) {
        (Some(&lo), Some(&hi)) => target < lo || target > hi,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Grid with lateral positions 0..cols mm and depth step 0.1 mm
    fn grid(rows: usize, cols: usize) -> AxisVectors {
        AxisVectors {
            depth: (0..rows).map(|i| i as f64 * 1e-4).collect(),
            lateral: (0..cols).map(|i| i as f64).collect(),
            lateral_unit: DisplayUnit::Millimeters,
        }
    }

    /// Image with one bright row/column cross through `(row0, col0)`
    fn cross_image(rows: usize, cols: usize, row0: usize, col0: usize, lateral: &[f64]) -> LogImage {
        LogImage::from_fn(rows, cols, |r, c| {
            if r == row0 {
                lateral[c]
            } else if c == col0 {
                -(r as f64 - row0 as f64).abs()
            } else {
                -60.0
            }
        })
    }

    #[test]
    fn test_isolated_column_known_width() {
        let mut lateral = vec![-40.0; 11];
        lateral[4] = -2.0;
        lateral[5] = 0.0;
        lateral[6] = -1.0;
        let image = cross_image(50, 11, 20, 5, &lateral);
        let axes = grid(50, 11);

        let result = PsfAnalyzer::new().analyze(&image, &axes, Point3::new(0.005, 0.0, 20e-4));
        assert_eq!(result.depth_index, 20);
        assert_eq!(result.lateral_index, 5);
        assert_eq!(result.lateral_profile, lateral);
        assert!((result.fwhm_lateral.unwrap() - 2.0).abs() < 1e-12);
        // Axial profile falls 1 dB per row: rows 17..=23 clear -3 dB
        assert!((result.fwhm_axial.unwrap() - 0.6).abs() < 1e-9);
        assert!(result.warnings.is_empty());
        assert_eq!(result.summary(), "Lateral FWHM: 2.00 mm");
    }

    #[test]
    fn test_disjoint_lobes_span_outer_crossings() {
        let mut lateral = vec![-40.0; 11];
        lateral[5] = 0.0;
        lateral[9] = -2.5;
        let image = cross_image(10, 11, 3, 5, &lateral);
        let result = PsfAnalyzer::new().analyze(&image, &grid(10, 11), Point3::new(0.005, 0.0, 3e-4));
        assert!((result.fwhm_lateral.unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_profile_is_undefined() {
        let image = LogImage::zeros(8, 6);
        let result = PsfAnalyzer::new().analyze(&image, &grid(8, 6), Point3::new(0.002, 0.0, 3e-4));
        assert_eq!(result.fwhm_lateral, None);
        assert_eq!(result.fwhm_axial, None);
        assert!(result.warnings.contains(&PsfWarning::DegenerateProfile {
            axis: ProfileAxis::Lateral,
            drop_db: 3.0
        }));
        assert_eq!(result.summary(), "Lateral FWHM: undefined");
        assert!(result.to_json().contains("\"fwhm_lateral\": null"));
    }

    #[test]
    fn test_half_max_width_threshold_is_relative_to_profile_peak() {
        let coords = [0.0, 1.0, 2.0, 3.0, 4.0];
        // Peak at -20 dB: threshold -23 dB, not -3 dB
        let profile = [-40.0, -22.0, -20.0, -23.0, -40.0];
        assert_eq!(half_max_width(&profile, &coords, 3.0), Some(2.0));
        assert_eq!(half_max_width(&[], &[], 3.0), None);
        assert_eq!(half_max_width(&[-1.0], &[0.0], 3.0), None);
        assert_eq!(half_max_width(&profile, &coords, 30.0), None);
    }

    #[test]
    fn test_probe_ties_resolve_to_lower_index() {
        let image = LogImage::zeros(10, 4);
        let axes = AxisVectors {
            lateral_unit: DisplayUnit::Meters,
            ..grid(10, 4)
        };
        // x = 1.5 sits exactly between columns 1 and 2
        let result = PsfAnalyzer::new().analyze(&image, &axes, Point3::new(1.5, 0.0, 0.0));
        assert_eq!(result.lateral_index, 1);
    }

    #[test]
    fn test_probe_outside_grid() {
        let image = LogImage::zeros(10, 4);
        let result = PsfAnalyzer::new().analyze(&image, &grid(10, 4), Point3::new(0.0, 0.0, 0.04));
        assert_eq!(result.depth_index, 9);
        assert!(result.warnings.iter().any(|w| matches!(
            w,
            PsfWarning::ProbeOutsideAxis {
                axis: ProfileAxis::Axial,
                ..
            }
        )));
    }

    #[test]
    fn test_analyze_all_per_scatterer() {
        let lateral: Vec<f64> = (0..9).map(|c| -((c as f64 - 4.0).abs() * 2.0)).collect();
        let image = cross_image(20, 9, 10, 4, &lateral);
        let phantom = Phantom::new(
            vec![Point3::new(0.004, 0.0, 1e-3), Point3::new(0.004, 0.0, 5e-4)],
            vec![1.0, 0.5],
        )
        .unwrap();
        let results = PsfAnalyzer::new().analyze_all(&image, &grid(20, 9), &phantom, &[]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].depth_index, 10);
        assert_eq!(results[1].depth_index, 5);
        assert!((results[0].fwhm_lateral.unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_unacquired_lines_are_not_read_as_silence() {
        let mut lateral = vec![-40.0; 11];
        lateral[4] = -2.0;
        lateral[5] = 0.0;
        lateral[6] = -1.0;
        // A failed line at the far edge would otherwise count as signal-free
        lateral[9] = -60.0;
        let image = cross_image(50, 11, 20, 5, &lateral);
        let axes = grid(50, 11);
        let probe = Point3::new(0.005, 0.0, 20e-4);

        let result = PsfAnalyzer::new().analyze_with_gaps(&image, &axes, probe, &[9, 42]);
        assert!((result.fwhm_lateral.unwrap() - 2.0).abs() < 1e-12);
        assert!(result.fwhm_axial.is_some());
        assert_eq!(
            result.warnings,
            vec![PsfWarning::UnacquiredLines {
                lines: vec![9],
                probe_line: false
            }]
        );
        assert_eq!(result.lateral_profile, lateral, "profile keeps imaged values");
        assert!(result.to_text().contains("unacquired lines [9]"));
    }

    #[test]
    fn test_failed_line_does_not_pass_for_a_null() {
        let mut lateral = vec![0.0; 11];
        lateral[4] = -60.0;
        let image = cross_image(10, 11, 3, 5, &lateral);
        let axes = grid(10, 11);
        let probe = Point3::new(0.005, 0.0, 3e-4);

        // Read as signal, the floor column makes the flat row look resolved
        let naive = PsfAnalyzer::new().analyze(&image, &axes, probe);
        assert_eq!(naive.fwhm_lateral, Some(10.0));

        let result = PsfAnalyzer::new().analyze_with_gaps(&image, &axes, probe, &[4]);
        assert_eq!(result.fwhm_lateral, None);
        assert!(result.warnings.contains(&PsfWarning::DegenerateProfile {
            axis: ProfileAxis::Lateral,
            drop_db: 3.0
        }));
    }

    #[test]
    fn test_missing_probe_line_leaves_axial_width_undefined() {
        let lateral: Vec<f64> = (0..9).map(|c| -((c as f64 - 4.0).abs() * 2.0)).collect();
        let image = cross_image(20, 9, 10, 4, &lateral);
        let phantom = Phantom::single(Point3::new(0.004, 0.0, 1e-3), 1.0);

        let results = PsfAnalyzer::new().analyze_all(&image, &grid(20, 9), &phantom, &[4]);
        let result = &results[0];
        assert_eq!(result.fwhm_axial, None);
        assert!(result.warnings.contains(&PsfWarning::UnacquiredLines {
            lines: vec![4],
            probe_line: true
        }));
        assert!(!result.warnings.contains(&PsfWarning::DegenerateProfile {
            axis: ProfileAxis::Axial,
            drop_db: 3.0
        }));
        // Without column 4 the peak is -2 dB; columns 2..=6 clear -5 dB
        assert!((result.fwhm_lateral.unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_csv_contains_both_profiles() {
        let image = LogImage::zeros(3, 2);
        let axes = grid(3, 2);
        let result = PsfAnalyzer::new().analyze(&image, &axes, Point3::ORIGIN);
        let csv = result.to_csv(&axes);
        assert_eq!(csv.lines().count(), 1 + 2 + 3);
        assert!(csv.starts_with("axis,index,coordinate,level_db\n"));
    }
}
