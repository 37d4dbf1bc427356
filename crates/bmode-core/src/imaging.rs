//! B-mode Image Formation
//!
//! Turns the raw RF matrix into an envelope matrix and a log-compressed image:
//!
//! ```text
//!   RF column ──analytic signal──▶ |·| ──▶ envelope
//!   envelope ──20·log10(· + ε)──▶ − global max ──▶ max(·, −DR) ──▶ LogImage
//! ```
//!
//! Columns are processed independently. Normalisation is global, so the
//! brightest pixel of the whole image sits at exactly 0 dB and every pixel
//! lies in `[−DR, 0]`.

use crate::config::ConfigError;
use crate::fft_utils::FftProcessor;
use crate::types::{ColumnMatrix, EnvelopeMatrix, LogImage};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Positive floor added before the logarithm so that silent samples map to a
/// finite level instead of `-inf`
pub const LOG_EPSILON: f64 = f64::EPSILON;

/// Envelope and log image produced from one RF matrix
#[derive(Debug, Clone, PartialEq)]
pub struct FormedImage {
    pub envelope: EnvelopeMatrix,
    pub log_image: LogImage,
    pub dynamic_range_db: f64,
}

/// RF → envelope → log-compressed image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFormer {
    dynamic_range_db: f64,
}

impl ImageFormer {
    pub fn new(dynamic_range_db: f64) -> Result<Self, ConfigError> {
        if !(dynamic_range_db > 0.0) || !dynamic_range_db.is_finite() {
            return Err(ConfigError::InvalidDynamicRange(dynamic_range_db));
        }
        Ok(Self { dynamic_range_db })
    }

    pub fn dynamic_range_db(&self) -> f64 {
        self.dynamic_range_db
    }

    /// Form envelope and log image from an RF matrix
    pub fn form<M: AsRef<ColumnMatrix>>(&self, rf: &M) -> FormedImage {
        let envelope = envelope(rf.as_ref());
        let log_image = self.log_compress(&envelope);
        FormedImage {
            envelope,
            log_image,
            dynamic_range_db: self.dynamic_range_db,
        }
    }

    /// `20·log10(env + ε)`, normalised to the global maximum, floored at `−DR`
    pub fn log_compress(&self, envelope: &EnvelopeMatrix) -> LogImage {
        let (rows, cols) = envelope.shape();
        let mut image = ColumnMatrix::zeros(rows, cols);
        for (out, &e) in image.as_mut_slice().iter_mut().zip(envelope.as_slice()) {
            *out = 20.0 * (e + LOG_EPSILON).log10();
        }
        let peak = image.max();
        let floor = -self.dynamic_range_db;
        for v in image.as_mut_slice() {
            *v = (*v - peak).max(floor);
        }
        image
    }
}

/// Form an image in one call, validating the dynamic range
pub fn form(rf: &ColumnMatrix, dynamic_range_db: f64) -> Result<FormedImage, ConfigError> {
    Ok(ImageFormer::new(dynamic_range_db)?.form(rf))
}

/// Analytic-signal magnitude of every column
pub fn envelope(rf: &ColumnMatrix) -> EnvelopeMatrix {
    let (rows, cols) = rf.shape();
    let mut out = ColumnMatrix::zeros(rows, cols);
    if rows == 0 || cols == 0 {
        return out;
    }

    #[cfg(feature = "parallel")]
    out.as_mut_slice()
        .par_chunks_mut(rows)
        .zip(rf.as_slice().par_chunks(rows))
        .for_each_init(
            || FftProcessor::new(rows),
            |fft, (dst, src)| fft.envelope_into(src, dst),
        );

    #[cfg(not(feature = "parallel"))]
    {
        let mut fft = FftProcessor::new(rows);
        for (dst, src) in out
            .as_mut_slice()
            .chunks_mut(rows)
            .zip(rf.as_slice().chunks(rows))
        {
            fft.envelope_into(src, dst);
        }
    }

    out
}
