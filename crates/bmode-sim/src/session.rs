//! Simulation Session
//!
//! Owns the engine and both aperture templates for the lifetime of a run.
//! Resources are released when the session is dropped, whether the run
//! succeeded, failed or never started; [`Session::release`] does the same
//! explicitly.

use crate::aperture::LinearArray;
use crate::engine::{EngineConfig, PointScatterEngine};
use crate::SimError;
use bmode_core::config::RunConfig;
use bmode_core::pipeline::{self, RunOutput};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::debug;

/// Configured engine plus transmit/receive apertures
#[derive(Debug)]
pub struct Session {
    config: RunConfig,
    engine: Arc<PointScatterEngine>,
    tx: LinearArray,
    rx: LinearArray,
    released: bool,
}

impl Session {
    /// Validate `config` and build the engine and apertures
    pub fn setup(config: &RunConfig) -> Result<Self, SimError> {
        config.validate()?;
        let engine = Arc::new(PointScatterEngine::new(EngineConfig::from_run_config(config)));
        let tx = LinearArray::transmit(config);
        let rx = LinearArray::receive(config);
        if tx.impulse_response().iter().all(|&h| h == 0.0) {
            return Err(SimError::InvalidWaveform(format!(
                "{} impulse cycles at {} Hz sampled at {} Hz leave a silent impulse response",
                config.impulse_cycles, config.center_frequency, config.sampling_frequency
            )));
        }
        debug!(
            "Session setup: {} elements, {} Hz sampling, tx {}, rx {}",
            config.num_elements, config.sampling_frequency, config.tx_apodization, config.rx_apodization
        );
        Ok(Self {
            config: config.clone(),
            engine,
            tx,
            rx,
            released: false,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn engine(&self) -> &PointScatterEngine {
        self.engine.as_ref()
    }

    pub fn transmit_aperture(&self) -> &LinearArray {
        &self.tx
    }

    pub fn receive_aperture(&self) -> &LinearArray {
        &self.rx
    }

    /// Run the full pipeline with this session's collaborators
    pub fn run(&self) -> Result<RunOutput, SimError> {
        Ok(pipeline::run(&self.config, &self.engine, &self.tx, &self.rx)?)
    }

    /// Run, skipping lines not yet started once `cancel` is set
    pub fn run_with_cancel(&self, cancel: &AtomicBool) -> Result<RunOutput, SimError> {
        Ok(pipeline::run_with_cancel(
            &self.config,
            &self.engine,
            &self.tx,
            &self.rx,
            cancel,
        )?)
    }

    /// Release the session now
    pub fn release(mut self) {
        self.release_resources();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn release_resources(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        debug!("Session released");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release_resources();
    }
}
