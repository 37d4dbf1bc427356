//! # B-mode Pulse-Echo Simulation
//!
//! Concrete collaborators for `bmode-core`: a linear-array aperture and a
//! point-scatterer pulse-echo engine, plus a session handle that owns them
//! for the duration of a run.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 bmode-core pipeline                     │
//! │     GeometryPlanner → PulseEchoCollector → ImageFormer  │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │          Collaborator traits (bmode-core)               │
//! │          PulseEchoEngine, ApertureControl               │
//! └─────────────────────────────────────────────────────────┘
//!                 │                       │
//!                 ▼                       ▼
//!   ┌─────────────────────┐   ┌─────────────────────────┐
//!   │ PointScatterEngine  │   │ LinearArray (tx / rx)   │
//!   │ delay-and-sum echo  │   │ delays, apodization     │
//!   └─────────────────────┘   └─────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bmode_core::config::RunConfig;
//! use bmode_sim::Session;
//!
//! let session = Session::setup(&RunConfig::default())?;
//! let output = session.run()?;
//! if let Some(psf) = output.primary_psf() {
//!     println!("{}", psf.summary());
//! }
//! # Ok::<(), bmode_sim::SimError>(())
//! ```

pub mod aperture;
pub mod engine;
pub mod pulse;
pub mod session;

use bmode_core::config::ConfigError;

// Re-exports
pub use aperture::{FocusZone, LinearArray};
pub use engine::{EngineConfig, PointScatterEngine};
pub use session::Session;

/// Session setup and run failures
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid waveform: {0}")]
    InvalidWaveform(String),
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::aperture::LinearArray;
    pub use crate::engine::{EngineConfig, PointScatterEngine};
    pub use crate::session::Session;
    pub use crate::SimError;
}
