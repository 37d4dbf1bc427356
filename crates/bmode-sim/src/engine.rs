//! Point-Scatterer Pulse-Echo Engine
//!
//! Computes the received RF line for a set of point scatterers by summing,
//! for every transmit element `i` and receive element `j`, one copy of the
//! two-way pulse delayed by
//!
//! ```text
//!   t_ij = tx_delay_i + |e_i - s| / c + |s - e_j| / c + rx_delay_j
//! ```
//!
//! and weighted by `amplitude · w_tx,i · w_rx,j`. Fractional delays are
//! placed by linear interpolation on an impulse grid, which is then convolved
//! once with the pulse-echo waveform. The sum is normalised by the total
//! weight, so a scatterer at the focus returns a unit-amplitude echo.
//!
//! Element directivity and spherical spreading loss are not modelled.
//!
//! The waveform is referenced to its midpoint: `start_time` is chosen so that
//! an echo from depth `z` on axis peaks at `2z / c`.

use crate::aperture::LinearArray;
use crate::pulse;
use bmode_core::acquisition::{EchoTrace, EngineError, PulseEchoEngine};
use bmode_core::config::RunConfig;
use bmode_core::types::{Phantom, Point3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sample rate (Hz)
    pub sample_rate: f64,
    /// Speed of sound (m/s)
    pub speed_of_sound: f64,
    /// Additive Gaussian noise standard deviation, relative to a focused echo
    pub noise_std: f64,
    /// Noise seed; each line derives its own stream from it
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 100e6,
            speed_of_sound: 1540.0,
            noise_std: 0.0,
            seed: 0x5EED,
        }
    }
}

impl EngineConfig {
    pub fn from_run_config(config: &RunConfig) -> Self {
        Self {
            sample_rate: config.sampling_frequency,
            speed_of_sound: config.speed_of_sound,
            noise_std: config.noise_std,
            seed: config.seed,
        }
    }
}

/// Pulse-echo simulator for point scatterers and linear arrays
#[derive(Debug, Clone)]
pub struct PointScatterEngine {
    config: EngineConfig,
}

impl PointScatterEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Emission-to-scatterer (or scatterer-to-reception) times per element
    fn one_way_times(&self, aperture: &LinearArray, delays: &[f64], target: &Point3) -> Vec<f64> {
        let c = self.config.speed_of_sound;
        aperture
            .element_positions()
            .zip(delays)
            .map(|(e, d)| d + e.distance(target) / c)
            .collect()
    }

    fn add_noise(&self, samples: &mut [f64], line_key: f64) -> Result<(), EngineError> {
        if self.config.noise_std <= 0.0 {
            return Ok(());
        }
        let noise = Normal::new(0.0, self.config.noise_std)
            .map_err(|e| EngineError::Failed(format!("noise distribution: {}", e)))?;
        let mut rng = StdRng::seed_from_u64(self.config.seed ^ line_key.to_bits());
        for s in samples.iter_mut() {
            *s += noise.sample(&mut rng);
        }
        Ok(())
    }
}

impl PulseEchoEngine for PointScatterEngine {
    type Aperture = LinearArray;

    fn pulse_echo(
        &self,
        tx: &LinearArray,
        rx: &LinearArray,
        phantom: &Phantom,
    ) -> Result<EchoTrace, EngineError> {
        if phantom.is_empty() {
            return Err(EngineError::Failed("phantom holds no scatterers".to_string()));
        }
        let excitation = tx
            .excitation()
            .ok_or_else(|| EngineError::Failed("transmit aperture has no excitation".to_string()))?;
        let waveform = pulse::pulse_echo_waveform(excitation, tx.impulse_response(), rx.impulse_response());
        if waveform.is_empty() {
            return Err(EngineError::Failed("pulse-echo waveform is silent".to_string()));
        }

        let c = self.config.speed_of_sound;
        let fs = self.config.sample_rate;
        let tx_delays = tx.focus_delays(c);
        let rx_delays = rx.focus_delays(c);
        let total_weight: f64 = tx.weights().iter().sum::<f64>() * rx.weights().iter().sum::<f64>();
        if !(total_weight > 0.0) {
            return Err(EngineError::Failed("aperture weights sum to zero".to_string()));
        }

        // (tx times, rx times, amplitude) per scatterer
        let paths: Vec<(Vec<f64>, Vec<f64>, f64)> = phantom
            .iter()
            .map(|s| {
                (
                    self.one_way_times(tx, &tx_delays, &s.position),
                    self.one_way_times(rx, &rx_delays, &s.position),
                    s.amplitude,
                )
            })
            .collect();

        let (mut t_min, mut t_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for (a, b, _) in &paths {
            let (a_lo, a_hi) = min_max(a);
            let (b_lo, b_hi) = min_max(b);
            t_min = t_min.min(a_lo + b_lo);
            t_max = t_max.max(a_hi + b_hi);
        }
        if !t_min.is_finite() || !t_max.is_finite() {
            return Err(EngineError::InvalidTrace("non-finite arrival times".to_string()));
        }

        let first = (t_min * fs).floor() as i64;
        let last = (t_max * fs).ceil() as i64;
        let mut impulses = vec![0.0; (last - first + 2) as usize];
        for (a, b, amplitude) in &paths {
            for (&ta, &wa) in a.iter().zip(tx.weights()) {
                for (&tb, &wb) in b.iter().zip(rx.weights()) {
                    let w = amplitude * wa * wb;
                    if w == 0.0 {
                        continue;
                    }
                    let pos = (ta + tb) * fs - first as f64;
                    let k = pos.floor();
                    let frac = pos - k;
                    let k = k as usize;
                    impulses[k] += w * (1.0 - frac);
                    impulses[k + 1] += w * frac;
                }
            }
        }

        let mut samples = pulse::convolve(&impulses, &waveform);
        for s in samples.iter_mut() {
            *s /= total_weight;
        }
        self.add_noise(&mut samples, tx.center().x)?;

        let lag = (waveform.len() - 1) as f64 / 2.0;
        let start_time = (first as f64 - lag) / fs;
        trace!(
            "Line at x = {:.3} mm: {} samples from {:.3} us",
            tx.center().x * 1e3,
            samples.len(),
            start_time * 1e6
        );
        Ok(EchoTrace {
            samples,
            start_time,
        })
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmode_core::acquisition::ApertureControl;

    fn setup(focus_depth: f64) -> (PointScatterEngine, LinearArray, LinearArray) {
        let config = RunConfig {
            num_elements: 16,
            sampling_frequency: 50e6,
            ..Default::default()
        };
        let mut tx = LinearArray::transmit(&config);
        let mut rx = LinearArray::receive(&config);
        let focus = Point3::new(0.0, 0.0, focus_depth);
        tx.set_focus(0.0, focus);
        rx.set_focus(0.0, focus);
        (PointScatterEngine::new(EngineConfig::from_run_config(&config)), tx, rx)
    }

    fn peak_time(trace: &EchoTrace, fs: f64) -> f64 {
        let (idx, _) = trace
            .samples
            .iter()
            .enumerate()
            .fold((0, 0.0), |(bi, bv), (i, &v)| if v.abs() > bv { (i, v.abs()) } else { (bi, bv) });
        trace.start_time + idx as f64 / fs
    }

    #[test]
    fn test_echo_arrives_at_round_trip_time() {
        let (engine, tx, rx) = setup(0.02);
        let phantom = Phantom::single(Point3::new(0.0, 0.0, 0.02), 1.0);
        let trace = engine.pulse_echo(&tx, &rx, &phantom).unwrap();
        let expected = 2.0 * 0.02 / 1540.0;
        // Within one carrier period of the round trip
        assert!(
            (peak_time(&trace, 50e6) - expected).abs() < 1.0 / 5e6,
            "peak at {} s, expected {} s",
            peak_time(&trace, 50e6),
            expected
        );
    }

    #[test]
    fn test_focused_echo_has_unit_scale() {
        let (engine, tx, rx) = setup(0.02);
        let phantom = Phantom::single(Point3::new(0.0, 0.0, 0.02), 1.0);
        let trace = engine.pulse_echo(&tx, &rx, &phantom).unwrap();
        let peak = trace.samples.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(peak > 0.8 && peak <= 1.0 + 1e-9, "peak {}", peak);
    }

    #[test]
    fn test_off_axis_scatterer_is_weaker() {
        let (engine, tx, rx) = setup(0.02);
        let on = engine
            .pulse_echo(&tx, &rx, &Phantom::single(Point3::new(0.0, 0.0, 0.02), 1.0))
            .unwrap();
        let off = engine
            .pulse_echo(&tx, &rx, &Phantom::single(Point3::new(2e-3, 0.0, 0.02), 1.0))
            .unwrap();
        let peak = |t: &EchoTrace| t.samples.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(peak(&off) < 0.5 * peak(&on));
    }

    #[test]
    fn test_noise_is_seeded() {
        let (engine, tx, rx) = setup(0.02);
        let noisy = PointScatterEngine::new(EngineConfig {
            noise_std: 0.01,
            ..engine.config().clone()
        });
        let phantom = Phantom::single(Point3::new(0.0, 0.0, 0.02), 1.0);
        let a = noisy.pulse_echo(&tx, &rx, &phantom).unwrap();
        let b = noisy.pulse_echo(&tx, &rx, &phantom).unwrap();
        let clean = engine.pulse_echo(&tx, &rx, &phantom).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.samples, clean.samples);
    }

    #[test]
    fn test_failures() {
        let (engine, tx, rx) = setup(0.02);
        assert!(matches!(
            engine.pulse_echo(&tx, &rx, &Phantom::default()),
            Err(EngineError::Failed(_))
        ));
        // Receive apertures carry no excitation
        let phantom = Phantom::single(Point3::new(0.0, 0.0, 0.02), 1.0);
        assert!(engine.pulse_echo(&rx, &rx, &phantom).is_err());
    }
}
