//! Core types for the imaging pipeline
//!
//! Positions are expressed in metres in a right-handed frame where `x` runs
//! laterally along the array, `y` is elevation and `z` is depth into the
//! medium.
//!
//! ```text
//!        array face (z = 0)
//!   ─────┬──┬──┬──┬──┬──┬──────▶ x
//!        │
//!        │      * scatterer (x, 0, z)
//!        ▼
//!        z
//! ```

use crate::config::ConfigError;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// A real RF sample
pub type Sample = f64;

/// A point in the imaging frame (metres)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// The origin, centre of the array face
    pub const ORIGIN: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> Self {
        [p.x, p.y, p.z]
    }
}

/// A single point reflector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scatterer {
    pub position: Point3,
    pub amplitude: f64,
}

/// Collection of point scatterers
///
/// Positions and amplitudes are kept as parallel sequences, which is the
/// layout the pulse-echo engine consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phantom {
    positions: Vec<Point3>,
    amplitudes: Vec<f64>,
}

impl Phantom {
    /// Build a phantom from parallel position/amplitude sequences
    pub fn new(positions: Vec<Point3>, amplitudes: Vec<f64>) -> Result<Self, ConfigError> {
        if positions.len() != amplitudes.len() {
            return Err(ConfigError::ScattererMismatch {
                positions: positions.len(),
                amplitudes: amplitudes.len(),
            });
        }
        if let Some(p) = positions.iter().find(|p| !p.is_finite()) {
            return Err(ConfigError::InvalidGeometry(format!(
                "non-finite scatterer position {:?}",
                p
            )));
        }
        Ok(Self {
            positions,
            amplitudes,
        })
    }

    /// A phantom holding one scatterer
    pub fn single(position: Point3, amplitude: f64) -> Self {
        Self {
            positions: vec![position],
            amplitudes: vec![amplitude],
        }
    }

    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scatterer> + '_ {
        self.positions
            .iter()
            .zip(self.amplitudes.iter())
            .map(|(&position, &amplitude)| Scatterer {
                position,
                amplitude,
            })
    }
}

/// Column-major 2-D buffer of real samples
///
/// Shape is `[rows, cols]`: one column per scan line, `rows` samples per
/// column. Columns are contiguous so that each scan line can be handed to a
/// separate worker as a disjoint `&mut [f64]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl ColumnMatrix {
    /// Zero-filled matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build a matrix by evaluating `f(row, col)` for every entry
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for col in 0..cols {
            for row in 0..rows {
                data.push(f(row, col));
            }
        }
        Self { rows, cols, data }
    }

    /// Build from equal-length columns; `None` if lengths differ
    pub fn from_columns(columns: &[Vec<f64>]) -> Option<Self> {
        let rows = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|c| c.len() != rows) {
            return None;
        }
        Some(Self {
            rows,
            cols: columns.len(),
            data: columns.concat(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.rows && col < self.cols, "index out of bounds");
        self.data[col * self.rows + row]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.rows && col < self.cols, "index out of bounds");
        self.data[col * self.rows + row] = value;
    }

    pub fn column(&self, col: usize) -> &[f64] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    pub fn column_mut(&mut self, col: usize) -> &mut [f64] {
        &mut self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Copy of one row (one depth sample across all scan lines)
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.cols).map(|col| self.get(row, col)).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.rows.max(1))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Largest entry, `-inf` for an empty matrix
    pub fn max(&self) -> f64 {
        self.data.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest entry, `+inf` for an empty matrix
    pub fn min(&self) -> f64 {
        self.data.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    /// `(row, col)` of the largest entry; ties resolve to the first in
    /// column-major order
    pub fn argmax(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in self.data.iter().enumerate() {
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| (i % self.rows, i / self.rows))
    }
}

impl AsRef<ColumnMatrix> for ColumnMatrix {
    fn as_ref(&self) -> &ColumnMatrix {
        self
    }
}

/// Analytic-signal magnitude, same shape as the RF matrix
pub type EnvelopeMatrix = ColumnMatrix;

/// Log-compressed image in dB relative to its global maximum
pub type LogImage = ColumnMatrix;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_layout() {
        let m = ColumnMatrix::from_fn(3, 2, |r, c| (r + 10 * c) as f64);
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.column(1), &[10.0, 11.0, 12.0]);
        assert_eq!(m.row(2), vec![2.0, 12.0]);
        assert_eq!(m.get(1, 1), 11.0);
        assert_eq!(m.columns().count(), 2);
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        assert!(ColumnMatrix::from_columns(&[vec![1.0, 2.0], vec![3.0]]).is_none());
        let m = ColumnMatrix::from_columns(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.get(0, 1), 3.0);
    }

    #[test]
    fn test_argmax() {
        let mut m = ColumnMatrix::zeros(4, 3);
        m.set(2, 1, 5.0);
        assert_eq!(m.argmax(), Some((2, 1)));
        assert_eq!(m.max(), 5.0);
        assert_eq!(ColumnMatrix::zeros(0, 0).argmax(), None);
    }

    #[test]
    fn test_phantom_mismatch() {
        let err = Phantom::new(vec![Point3::ORIGIN], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ScattererMismatch {
                positions: 1,
                amplitudes: 2
            }
        ));
    }

    #[test]
    fn test_point_distance() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 0.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
    }
}
