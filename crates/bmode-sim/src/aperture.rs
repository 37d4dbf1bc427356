//! Linear Array Aperture
//!
//! A fixed linear array whose elements all take part in every transmit and
//! receive event. Steering and focusing come from per-element delays computed
//! against the current aperture centre and focal point:
//!
//! ```text
//!   delay_i = (|f - c| - |f - e_i|) / speed_of_sound
//! ```
//!
//! so that a wave leaving element `e_i` at `delay_i` reaches the focus `f`
//! at the same time as one leaving the centre `c` at time 0.

use bmode_core::acquisition::ApertureControl;
use bmode_core::config::RunConfig;
use bmode_core::geometry::ArrayGeometry;
use bmode_core::types::Point3;
use bmode_core::window::Apodization;
use std::sync::Arc;

use crate::pulse;

/// Focal point active from `time` (s) onwards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusZone {
    pub time: f64,
    pub point: Point3,
}

/// Linear array transducer with apodization, impulse response and optional
/// excitation
///
/// Waveforms are shared between clones, so cloning per scan line is cheap.
#[derive(Debug, Clone)]
pub struct LinearArray {
    geometry: ArrayGeometry,
    element_x: Arc<[f64]>,
    weights: Arc<[f64]>,
    impulse_response: Arc<[f64]>,
    excitation: Option<Arc<[f64]>>,
    center: Point3,
    zones: Vec<FocusZone>,
}

impl LinearArray {
    /// Array with uniform weights, unfocused, centred at the origin
    pub fn new(geometry: ArrayGeometry, impulse_response: Vec<f64>) -> Self {
        let element_x: Arc<[f64]> = geometry.element_positions().into();
        let weights: Arc<[f64]> = vec![1.0; geometry.num_elements].into();
        Self {
            geometry,
            element_x,
            weights,
            impulse_response: impulse_response.into(),
            excitation: None,
            center: Point3::ORIGIN,
            zones: Vec::new(),
        }
    }

    /// Transmit aperture from a run configuration
    pub fn transmit(config: &RunConfig) -> Self {
        let fs = config.sampling_frequency;
        let f0 = config.center_frequency;
        Self::new(
            config.geometry(),
            pulse::impulse_response(f0, fs, config.impulse_cycles),
        )
        .with_apodization(config.tx_apodization)
        .with_excitation(pulse::excitation(f0, fs, config.excitation_cycles))
    }

    /// Receive aperture from a run configuration
    pub fn receive(config: &RunConfig) -> Self {
        Self::new(
            config.geometry(),
            pulse::impulse_response(
                config.center_frequency,
                config.sampling_frequency,
                config.impulse_cycles,
            ),
        )
        .with_apodization(config.rx_apodization)
    }

    pub fn with_apodization(mut self, apodization: Apodization) -> Self {
        self.weights = apodization.generate(self.geometry.num_elements).into();
        self
    }

    pub fn with_excitation(mut self, excitation: Vec<f64>) -> Self {
        self.excitation = Some(excitation.into());
        self
    }

    pub fn geometry(&self) -> &ArrayGeometry {
        &self.geometry
    }

    pub fn num_elements(&self) -> usize {
        self.element_x.len()
    }

    /// Element centres on the array face
    pub fn element_positions(&self) -> impl Iterator<Item = Point3> + '_ {
        self.element_x.iter().map(|&x| Point3::new(x, 0.0, 0.0))
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn impulse_response(&self) -> &[f64] {
        &self.impulse_response
    }

    /// Drive waveform; receive-only apertures have none
    pub fn excitation(&self) -> Option<&[f64]> {
        self.excitation.as_deref()
    }

    pub fn center(&self) -> Point3 {
        self.center
    }

    pub fn focus_zones(&self) -> &[FocusZone] {
        &self.zones
    }

    /// Focal point in effect at `time`, `None` if never focused
    pub fn focus_at(&self, time: f64) -> Option<Point3> {
        self.zones
            .iter()
            .rev()
            .find(|z| z.time <= time)
            .or_else(|| self.zones.first())
            .map(|z| z.point)
    }

    /// Per-element focusing delays (s) for the focus active at time 0
    ///
    /// All zero when unfocused.
    pub fn focus_delays(&self, speed_of_sound: f64) -> Vec<f64> {
        match self.focus_at(0.0) {
            Some(focus) => {
                let reference = focus.distance(&self.center);
                self.element_positions()
                    .map(|e| (reference - focus.distance(&e)) / speed_of_sound)
                    .collect()
            }
            None => vec![0.0; self.num_elements()],
        }
    }
}

impl ApertureControl for LinearArray {
    fn set_center(&mut self, center: Point3) {
        self.center = center;
    }

    /// A focus at `time <= 0` replaces every zone; later zones are inserted in
    /// time order, replacing a zone with the same start time.
    fn set_focus(&mut self, time: f64, point: Point3) {
        if time <= 0.0 {
            self.zones.clear();
        }
        self.zones.retain(|z| z.time != time);
        let at = self.zones.partition_point(|z| z.time < time);
        self.zones.insert(at, FocusZone { time, point });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> ArrayGeometry {
        ArrayGeometry {
            num_elements: 8,
            width: 2e-4,
            height: 5e-3,
            kerf: 0.0,
        }
    }

    #[test]
    fn test_delays_equalise_path_to_focus() {
        let mut array = LinearArray::new(geometry(), vec![1.0]);
        let c = 1540.0;
        array.set_center(Point3::new(2e-4, 0.0, 0.0));
        let focus = Point3::new(2e-4, 0.0, 0.02);
        array.set_focus(0.0, focus);

        let delays = array.focus_delays(c);
        let arrival: Vec<f64> = array
            .element_positions()
            .zip(&delays)
            .map(|(e, d)| d + focus.distance(&e) / c)
            .collect();
        for t in &arrival {
            assert!((t - 0.02 / c).abs() < 1e-15, "arrival {} s", t);
        }
        // Elements farther from the focus fire earlier
        assert!(delays[0] < delays[4]);
    }

    #[test]
    fn test_unfocused_has_zero_delays() {
        let array = LinearArray::new(geometry(), vec![1.0]);
        assert_eq!(array.focus_delays(1540.0), vec![0.0; 8]);
        assert_eq!(array.focus_at(0.0), None);
    }

    #[test]
    fn test_focus_zones() {
        let mut array = LinearArray::new(geometry(), vec![1.0]);
        let near = Point3::new(0.0, 0.0, 0.01);
        let far = Point3::new(0.0, 0.0, 0.03);
        array.set_focus(0.0, near);
        array.set_focus(2e-5, far);
        assert_eq!(array.focus_at(0.0), Some(near));
        assert_eq!(array.focus_at(3e-5), Some(far));

        // A new focus at time zero starts over
        array.set_focus(0.0, far);
        assert_eq!(array.focus_zones().len(), 1);
    }

    #[test]
    fn test_apodization_and_config() {
        let config = RunConfig {
            num_elements: 16,
            tx_apodization: Apodization::Hann,
            ..Default::default()
        };
        let tx = LinearArray::transmit(&config);
        let rx = LinearArray::receive(&config);
        assert_eq!(tx.weights().len(), 16);
        assert_eq!(tx.weights()[0], 0.0);
        assert!(rx.weights().iter().all(|&w| w == 1.0));
        assert_eq!(tx.excitation().map(<[f64]>::len), Some(40));
        assert!(rx.excitation().is_none());
    }

    #[test]
    fn test_clones_are_independent() {
        let template = LinearArray::new(geometry(), vec![1.0]);
        let mut a = template.clone();
        a.set_center(Point3::new(1e-3, 0.0, 0.0));
        assert_eq!(template.center(), Point3::ORIGIN);
        assert_eq!(a.center().x, 1e-3);
    }
}
