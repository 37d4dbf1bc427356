//! End-to-end PSF Run
//!
//! ```text
//!   RunConfig ──▶ GeometryPlanner ──▶ PulseEchoCollector ──▶ ImageFormer
//!                                                              │
//!                                  AxisMapper ◀────────────────┤
//!                                       │                      ▼
//!                                       └──────────────▶ PsfAnalyzer
//! ```
//!
//! Configuration errors abort before the first engine call. Everything after
//! that is recoverable and ends up in the [`RunOutput`].

use crate::acquisition::{Acquisition, PulseEchoEngine};
use crate::analysis::{ImageStats, PsfResult};
use crate::axis::AxisVectors;
use crate::config::{ConfigError, DepthCoverage, RunConfig};
use crate::geometry::ScanLinePlan;
use crate::imaging::FormedImage;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything produced by one run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub plan: ScanLinePlan,
    pub acquisition: Acquisition,
    pub image: FormedImage,
    pub axes: AxisVectors,
    /// One result per configured scatterer
    pub psf: Vec<PsfResult>,
    pub stats: ImageStats,
    pub coverage: DepthCoverage,
}

impl RunOutput {
    /// PSF of the first scatterer
    pub fn primary_psf(&self) -> Option<&PsfResult> {
        self.psf.first()
    }

    /// Format as text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str(&self.acquisition.report.to_text());
        if let Some(shortfall) = self.coverage.shortfall() {
            output.push_str(&format!(
                "RF buffer covers {:.2} mm, {:.2} mm short of the depth range ({} samples needed)\n",
                self.coverage.max_depth * 1e3,
                shortfall * 1e3,
                self.coverage.required_capacity()
            ));
        }
        output.push('\n');
        output.push_str(&self.stats.to_text());
        if let Some(psf) = self.primary_psf() {
            let err = self.stats.registration_error(psf.probe);
            output.push_str(&format!(
                "Registration:      {:.3} mm from scatterer\n",
                err.magnitude() * 1e3
            ));
        }
        for psf in &self.psf {
            output.push('\n');
            output.push_str(&psf.to_text());
        }
        output
    }

    /// Format as JSON
    pub fn to_json(&self) -> String {
        let psf: Vec<String> = self.psf.iter().map(|p| indent(&p.to_json())).collect();
        format!(
            r#"{{
  "lines_acquired": {},
  "scan_lines": {},
  "gaps": {:?},
  "truncated_lines": {},
  "samples_discarded": {},
  "buffer_depth_m": {:.6},
  "required_depth_m": {:.6},
  "stats": {},
  "psf": [
{}
  ]
}}"#,
            self.acquisition.report.lines_acquired,
            self.acquisition.report.scan_lines,
            self.acquisition.report.gaps,
            self.acquisition.report.truncations().count(),
            self.acquisition.report.total_discarded(),
            self.coverage.max_depth,
            self.coverage.required_depth,
            self.stats.to_json().replace('\n', "\n  "),
            psf.join(",\n")
        )
    }
}

fn indent(block: &str) -> String {
    block
        .lines()
        .map(|l| format!("    {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the whole pipeline against `engine`
pub fn run<E: PulseEchoEngine + 'static>(
    config: &RunConfig,
    engine: &Arc<E>,
    tx: &E::Aperture,
    rx: &E::Aperture,
) -> Result<RunOutput, ConfigError> {
    run_with_cancel(config, engine, tx, rx, &AtomicBool::new(false))
}

/// Run the whole pipeline, stopping acquisition early once `cancel` is set
pub fn run_with_cancel<E: PulseEchoEngine + 'static>(
    config: &RunConfig,
    engine: &Arc<E>,
    tx: &E::Aperture,
    rx: &E::Aperture,
    cancel: &AtomicBool,
) -> Result<RunOutput, ConfigError> {
    config.validate()?;

    let coverage = config.depth_coverage();
    if let Some(shortfall) = coverage.shortfall() {
        warn!(
            "RF buffer of {} samples reaches {:.2} mm, {:.2} mm short of depth range end {:.2} mm",
            coverage.capacity,
            coverage.max_depth * 1e3,
            shortfall * 1e3,
            coverage.required_depth * 1e3
        );
    }

    let plan = config.planner().plan()?;
    let collector = config.collector()?;
    let former = config.image_former()?;
    let mapper = config.axis_mapper()?;
    let phantom = config.phantom()?;

    let acquisition = collector.collect_with_cancel(engine, tx, rx, &plan, &phantom, cancel);
    let image = former.form(&acquisition.rf);
    let axes = mapper.map(acquisition.rf.num_samples(), &plan.lateral_positions());

    let psf = config
        .psf_analyzer()
        .analyze_all(&image.log_image, &axes, &phantom, &acquisition.report.gaps);
    for result in &psf {
        for warning in &result.warnings {
            warn!("PSF at z = {:.2} mm: {}", result.probe.z * 1e3, warning);
        }
    }
    if let Some(primary) = psf.first() {
        info!("{}", primary.summary());
    }

    let stats = ImageStats::compute(&image.log_image, &axes, former.dynamic_range_db());

    Ok(RunOutput {
        plan,
        acquisition,
        image,
        axes,
        psf,
        stats,
        coverage,
    })
}
