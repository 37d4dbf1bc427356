//! FFT Utilities for Envelope Detection
//!
//! Wraps a planned forward/inverse FFT pair and builds the analytic signal of
//! a real RF trace in the frequency domain:
//!
//! ```text
//!   x[n] ──FFT──▶ X[k] ──× h[k]──▶ IFFT ──▶ x[n] + j·H{x}[n]
//!
//!   h[k] = 1   k = 0 (and k = N/2 for even N)
//!          2   0 < k < N/2
//!          0   otherwise (negative frequencies)
//! ```
//!
//! The magnitude of the analytic signal is the envelope.

use crate::types::Complex;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Planned FFT processor of a fixed size
pub struct FftProcessor {
    size: usize,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex>,
    buffer: Vec<Complex>,
    weights: Vec<f64>,
}

impl fmt::Debug for FftProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftProcessor")
            .field("size", &self.size)
            .finish()
    }
}

impl FftProcessor {
    /// Create a new FFT processor for the given size
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(size);
        let fft_inverse = planner.plan_fft_inverse(size);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());

        Self {
            size,
            fft_forward,
            fft_inverse,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            buffer: vec![Complex::new(0.0, 0.0); size],
            weights: analytic_weights(size),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward FFT in place
    pub fn fft_inplace(&mut self, buffer: &mut [Complex]) {
        assert_eq!(buffer.len(), self.size);
        self.fft_forward.process_with_scratch(buffer, &mut self.scratch);
    }

    /// Inverse FFT in place, normalised by `1/N`
    pub fn ifft_inplace(&mut self, buffer: &mut [Complex]) {
        assert_eq!(buffer.len(), self.size);
        self.fft_inverse.process_with_scratch(buffer, &mut self.scratch);

        let scale = 1.0 / self.size as f64;
        for sample in buffer.iter_mut() {
            *sample *= scale;
        }
    }

    /// Analytic signal of a real trace of length `size`
    pub fn analytic_signal(&mut self, input: &[f64]) -> Vec<Complex> {
        self.load_analytic(input);
        self.buffer.clone()
    }

    /// Write `|analytic(input)|` into `output`
    pub fn envelope_into(&mut self, input: &[f64], output: &mut [f64]) {
        assert_eq!(output.len(), self.size);
        self.load_analytic(input);
        for (out, z) in output.iter_mut().zip(self.buffer.iter()) {
            *out = z.norm();
        }
    }

    fn load_analytic(&mut self, input: &[f64]) {
        assert_eq!(input.len(), self.size);
        if self.size == 0 {
            return;
        }
        let mut buffer = std::mem::take(&mut self.buffer);
        for (b, &x) in buffer.iter_mut().zip(input.iter()) {
            *b = Complex::new(x, 0.0);
        }
        self.fft_inplace(&mut buffer);
        for (b, &h) in buffer.iter_mut().zip(self.weights.iter()) {
            *b *= h;
        }
        self.ifft_inplace(&mut buffer);
        self.buffer = buffer;
    }
}

/// Frequency-domain weights turning a spectrum into an analytic spectrum
fn analytic_weights(n: usize) -> Vec<f64> {
    let mut h = vec![0.0; n];
    if n == 0 {
        return h;
    }
    h[0] = 1.0;
    if n % 2 == 0 {
        h[n / 2] = 1.0;
        h[1..n / 2].iter_mut().for_each(|w| *w = 2.0);
    } else {
        h[1..=(n - 1) / 2].iter_mut().for_each(|w| *w = 2.0);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_fft_roundtrip_identity() {
        let n = 64;
        let mut fft = FftProcessor::new(n);
        let original: Vec<Complex> = (0..n).map(|i| Complex::new(i as f64, -(i as f64))).collect();
        let mut buffer = original.clone();
        fft.fft_inplace(&mut buffer);
        fft.ifft_inplace(&mut buffer);
        for (a, b) in buffer.iter().zip(original.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_analytic_signal_of_cosine() {
        // Integer number of cycles: the Hilbert pair of cos is sin
        let n = 256;
        let k = 8.0;
        let x: Vec<f64> = (0..n).map(|i| (2.0 * PI * k * i as f64 / n as f64).cos()).collect();
        let mut fft = FftProcessor::new(n);
        let z = fft.analytic_signal(&x);
        for (i, zi) in z.iter().enumerate() {
            let expected_im = (2.0 * PI * k * i as f64 / n as f64).sin();
            assert!((zi.re - x[i]).abs() < 1e-9, "real part must be the input");
            assert!((zi.im - expected_im).abs() < 1e-9);
            assert!((zi.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_weights_odd_and_even() {
        assert_eq!(analytic_weights(4), vec![1.0, 2.0, 1.0, 0.0]);
        assert_eq!(analytic_weights(5), vec![1.0, 2.0, 2.0, 0.0, 0.0]);
        assert_eq!(analytic_weights(1), vec![1.0]);
    }

    #[test]
    fn test_envelope_into_matches_analytic() {
        let n = 33;
        let x: Vec<f64> = (0..n).map(|i| ((i as f64) * 0.7).sin() * (-(i as f64) / 10.0).exp()).collect();
        let mut fft = FftProcessor::new(n);
        let z = fft.analytic_signal(&x);
        let mut env = vec![0.0; n];
        fft.envelope_into(&x, &mut env);
        for (e, zi) in env.iter().zip(z.iter()) {
            assert_eq!(*e, zi.norm());
        }
    }
}
