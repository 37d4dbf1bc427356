//! Excitation and Impulse Response Waveforms
//!
//! The two-way pulse seen by the receiver is the excitation convolved with
//! the element impulse response twice, once on transmit and once on receive:
//!
//! ```text
//!   excitation ─▶ * h_tx ─▶ * h_rx ─▶ pulse-echo waveform
//! ```
//!
//! Both waveforms are sine bursts at the centre frequency. The impulse
//! response is Hann-weighted, the excitation is not.

use std::f64::consts::PI;

/// Number of samples spanned by `cycles` periods at `frequency`
fn burst_len(frequency: f64, sample_rate: f64, cycles: f64) -> usize {
    ((cycles / frequency * sample_rate).round() as usize).max(1)
}

/// Plain sine burst: `sin(2π f0 t)` over `cycles` periods
pub fn excitation(center_frequency: f64, sample_rate: f64, cycles: f64) -> Vec<f64> {
    let n = burst_len(center_frequency, sample_rate, cycles);
    (0..n)
        .map(|i| (2.0 * PI * center_frequency * i as f64 / sample_rate).sin())
        .collect()
}

/// Hann-weighted sine burst
pub fn impulse_response(center_frequency: f64, sample_rate: f64, cycles: f64) -> Vec<f64> {
    let n = burst_len(center_frequency, sample_rate, cycles);
    let m = (n.max(2) - 1) as f64;
    (0..n)
        .map(|i| {
            let t = i as f64;
            let hann = 0.5 * (1.0 - (2.0 * PI * t / m).cos());
            hann * (2.0 * PI * center_frequency * t / sample_rate).sin()
        })
        .collect()
}

/// Full linear convolution, length `a.len() + b.len() - 1`
pub fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (o, &y) in out[i..].iter_mut().zip(b) {
            *o += x * y;
        }
    }
    out
}

/// `excitation * h_tx * h_rx`, scaled to unit peak magnitude
///
/// Returns an empty waveform if any input is empty or the result is silent.
pub fn pulse_echo_waveform(excitation: &[f64], tx_impulse: &[f64], rx_impulse: &[f64]) -> Vec<f64> {
    let mut waveform = convolve(&convolve(excitation, tx_impulse), rx_impulse);
    let peak = waveform.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if !(peak > 0.0) {
        return Vec::new();
    }
    for v in waveform.iter_mut() {
        *v /= peak;
    }
    waveform
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_lengths() {
        // Two cycles at 5 MHz sampled at 100 MHz
        assert_eq!(excitation(5e6, 100e6, 2.0).len(), 40);
        assert_eq!(impulse_response(5e6, 100e6, 2.0).len(), 40);
        assert_eq!(excitation(5e6, 100e6, 0.0).len(), 1);
    }

    #[test]
    fn test_impulse_response_is_tapered() {
        let h = impulse_response(5e6, 100e6, 2.0);
        assert_eq!(h[0], 0.0);
        assert!(h[h.len() - 1].abs() < 1e-12);
        let e = excitation(5e6, 100e6, 2.0);
        // A quarter period in, the burst is at its crest
        assert!((e[5] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_convolve() {
        assert_eq!(convolve(&[1.0, 2.0], &[1.0, 1.0, 1.0]), vec![1.0, 3.0, 3.0, 2.0]);
        assert_eq!(convolve(&[], &[1.0]), Vec::<f64>::new());
    }

    #[test]
    fn test_pulse_echo_waveform_normalised() {
        let e = excitation(5e6, 100e6, 2.0);
        let h = impulse_response(5e6, 100e6, 2.0);
        let w = pulse_echo_waveform(&e, &h, &h);
        assert_eq!(w.len(), 40 + 40 + 40 - 2);
        let peak = w.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!((peak - 1.0).abs() < 1e-12);
        assert!(pulse_echo_waveform(&[0.0], &h, &h).is_empty());
    }
}
