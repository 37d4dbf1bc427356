//! Aperture apodization windows
//!
//! Element weights applied across the transmit and receive apertures. Windows
//! are symmetric (the first and last element receive the same weight), which
//! is what an aperture needs rather than the periodic form used for spectral
//! analysis.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Apodization window across array elements
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Apodization {
    /// Uniform weighting (default)
    #[default]
    Rectangular,
    /// Hann window, zero at the aperture edges
    Hann,
    /// Hamming window, ~0.08 at the aperture edges
    Hamming,
    /// Tukey (tapered cosine) window with taper fraction `alpha` in `[0, 1]`
    Tukey(f64),
}

impl Apodization {
    /// Generate element weights for an aperture of `size` elements
    pub fn generate(&self, size: usize) -> Vec<f64> {
        if size <= 1 {
            return vec![1.0; size];
        }
        let m = (size - 1) as f64;
        match *self {
            Apodization::Rectangular => vec![1.0; size],
            Apodization::Hann => (0..size)
                .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / m).cos()))
                .collect(),
            Apodization::Hamming => (0..size)
                .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / m).cos())
                .collect(),
            Apodization::Tukey(alpha) => {
                let alpha = alpha.clamp(0.0, 1.0);
                if alpha == 0.0 {
                    return vec![1.0; size];
                }
                let edge = alpha * m / 2.0;
                (0..size)
                    .map(|i| {
                        let n = i as f64;
                        // Mirror into the left half so both tapers match exactly
                        let d = n.min(m - n);
                        if d < edge {
                            0.5 * (1.0 - (PI * d / edge).cos())
                        } else {
                            1.0
                        }
                    })
                    .collect()
            }
        }
    }

    /// Parse from string: `rect`, `hann`, `hamming`, `tukey` or `tukey:<alpha>`
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if let Some(alpha) = s.strip_prefix("tukey:") {
            let alpha: f64 = alpha.trim().parse().ok()?;
            return (0.0..=1.0).contains(&alpha).then_some(Apodization::Tukey(alpha));
        }
        match s.as_str() {
            "none" | "rectangular" | "rect" => Some(Apodization::Rectangular),
            "hann" | "hanning" => Some(Apodization::Hann),
            "hamming" => Some(Apodization::Hamming),
            "tukey" => Some(Apodization::Tukey(0.5)),
            _ => None,
        }
    }
}

impl fmt::Display for Apodization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Apodization::Rectangular => write!(f, "rect"),
            Apodization::Hann => write!(f, "hann"),
            Apodization::Hamming => write!(f, "hamming"),
            Apodization::Tukey(alpha) => write!(f, "tukey:{}", alpha),
        }
    }
}

impl TryFrom<String> for Apodization {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Apodization::from_str(&s).ok_or_else(|| format!("unknown apodization '{}'", s))
    }
}

impl From<Apodization> for String {
    fn from(a: Apodization) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_generation() {
        let size = 65;

        let hann = Apodization::Hann.generate(size);
        assert!(hann[0].abs() < 1e-12);
        assert!((hann[size / 2] - 1.0).abs() < 1e-12);
        assert!((hann[3] - hann[size - 4]).abs() < 1e-12, "Hann must be symmetric");

        let hamming = Apodization::Hamming.generate(size);
        assert!((hamming[0] - 0.08).abs() < 1e-9);

        let tukey = Apodization::Tukey(0.5).generate(size);
        assert!(tukey[0].abs() < 1e-12);
        assert_eq!(tukey[size / 2], 1.0);
        for i in 0..size {
            assert!((tukey[i] - tukey[size - 1 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_single_element_is_unit() {
        assert_eq!(Apodization::Hann.generate(1), vec![1.0]);
        assert!(Apodization::Hann.generate(0).is_empty());
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Apodization::from_str("HANN"), Some(Apodization::Hann));
        assert_eq!(Apodization::from_str("tukey:0.25"), Some(Apodization::Tukey(0.25)));
        assert_eq!(Apodization::from_str("tukey:1.5"), None);
        assert_eq!(Apodization::from_str("kaiser"), None);
        let a: Apodization = "tukey:0.3".to_string().try_into().unwrap();
        assert_eq!(String::from(a), "tukey:0.3");
    }
}
