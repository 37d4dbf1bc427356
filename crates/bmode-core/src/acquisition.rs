//! Pulse-Echo Acquisition
//!
//! Drives the external physics engine once per scan line and collects the
//! returned RF traces into a pre-allocated `[num_samples, scan_lines]`
//! matrix.
//!
//! ## Contract
//!
//! For each line the collector
//!
//! 1. clones the transmit and receive aperture templates,
//! 2. moves their centre to `(lateral_x, 0, 0)` and focus to the line focus,
//! 3. asks the engine for `(rf_trace, start_time)`,
//! 4. writes the trace into that line's column at the aligned offset.
//!
//! Traces longer than the column are truncated and reported, engine failures
//! leave the column as a reported gap. Neither aborts the run.
//!
//! ## Concurrency
//!
//! Each line writes only its own column, so with the `parallel` feature the
//! columns are handed out as disjoint `&mut [f64]` chunks to a rayon pool.
//! The engine is shared through an `Arc`; aperture state is per line.
//!
//! ## Deadlines
//!
//! With a line timeout set, each engine call runs on its own worker thread
//! and the collector waits at most the timeout for its result. A call that
//! overruns is reported as [`EngineError::Timeout`] and its worker is left
//! detached, so a hung engine cannot stall the run.

use crate::config::ConfigError;
use crate::geometry::{ScanLine, ScanLinePlan};
use crate::types::{ColumnMatrix, Phantom, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Transducer aperture state updated between engine calls
pub trait ApertureControl {
    /// Move the aperture reference point
    fn set_center(&mut self, center: Point3);

    /// Set the focal point active from `time` (s) onwards
    fn set_focus(&mut self, time: f64, point: Point3);
}

/// One pulse-echo response returned by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EchoTrace {
    /// RF samples
    pub samples: Vec<f64>,
    /// Time of the first sample (s)
    pub start_time: f64,
}

/// Per-line engine failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("engine call failed: {0}")]
    Failed(String),

    #[error("engine call took {elapsed:?}, over the {limit:?} limit")]
    Timeout { elapsed: Duration, limit: Duration },

    #[error("engine returned an invalid trace: {0}")]
    InvalidTrace(String),
}

/// External pulse-echo physics engine
///
/// Implementations must be callable concurrently through `&self`.
pub trait PulseEchoEngine: Send + Sync {
    /// Aperture description consumed by the engine
    type Aperture: ApertureControl + Clone + Send + Sync + 'static;

    /// Compute the received RF trace for one transmit/receive event
    fn pulse_echo(
        &self,
        tx: &Self::Aperture,
        rx: &Self::Aperture,
        phantom: &Phantom,
    ) -> Result<EchoTrace, EngineError>;
}

/// Placement of a returned trace within its RF column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceAlignment {
    /// Every trace starts at sample 0, ignoring the reported start time
    #[default]
    Zero,
    /// Trace starts at `round(start_time · sample_rate)`
    Absolute,
}

impl TraceAlignment {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "zero" | "none" => Some(TraceAlignment::Zero),
            "absolute" | "start-time" | "start_time" => Some(TraceAlignment::Absolute),
            _ => None,
        }
    }
}

/// Fixed-capacity RF buffer with a per-column acquisition mask
#[derive(Debug, Clone, PartialEq)]
pub struct RfMatrix {
    samples: ColumnMatrix,
    acquired: Vec<bool>,
}

impl RfMatrix {
    /// Zeroed buffer, no column acquired yet
    pub fn with_capacity(num_samples: usize, scan_lines: usize) -> Self {
        Self {
            samples: ColumnMatrix::zeros(num_samples, scan_lines),
            acquired: vec![false; scan_lines],
        }
    }

    /// Wrap an existing matrix with every column marked acquired
    pub fn from_matrix(samples: ColumnMatrix) -> Self {
        let acquired = vec![true; samples.cols()];
        Self { samples, acquired }
    }

    pub fn num_samples(&self) -> usize {
        self.samples.rows()
    }

    pub fn scan_lines(&self) -> usize {
        self.samples.cols()
    }

    pub fn samples(&self) -> &ColumnMatrix {
        &self.samples
    }

    pub fn into_samples(self) -> ColumnMatrix {
        self.samples
    }

    pub fn column(&self, line: usize) -> &[f64] {
        self.samples.column(line)
    }

    pub fn is_acquired(&self, line: usize) -> bool {
        self.acquired.get(line).copied().unwrap_or(false)
    }

    /// Indices of columns never written
    pub fn gaps(&self) -> Vec<usize> {
        self.acquired
            .iter()
            .enumerate()
            .filter(|(_, &a)| !a)
            .map(|(i, _)| i)
            .collect()
    }

    /// Write `trace` into column `line` at `offset`; returns discarded samples
    pub fn write_column(&mut self, line: usize, trace: &[f64], offset: i64) -> usize {
        let discarded = write_trace(self.samples.column_mut(line), trace, offset);
        self.acquired[line] = true;
        discarded
    }
}

impl AsRef<ColumnMatrix> for RfMatrix {
    fn as_ref(&self) -> &ColumnMatrix {
        &self.samples
    }
}

/// Recoverable per-line condition
#[derive(Debug, Clone, PartialEq)]
pub enum LineIssue {
    /// Trace exceeded the column capacity; `discarded` samples were dropped
    Truncated { line: usize, discarded: usize },
    /// Engine call failed or overran its deadline; column left as a gap
    EngineFailure { line: usize, error: EngineError },
}

impl LineIssue {
    pub fn line(&self) -> usize {
        match self {
            LineIssue::Truncated { line, .. } | LineIssue::EngineFailure { line, .. } => *line,
        }
    }
}

impl fmt::Display for LineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineIssue::Truncated { line, discarded } => {
                write!(f, "line {}: trace truncated, {} samples discarded", line, discarded)
            }
            LineIssue::EngineFailure { line, error } => write!(f, "line {}: {}", line, error),
        }
    }
}

/// Per-line conditions collected over a run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AcquisitionReport {
    /// Issues ordered by line index
    pub issues: Vec<LineIssue>,
    /// Lines whose column holds engine output
    pub lines_acquired: usize,
    /// Planned lines
    pub scan_lines: usize,
    /// Lines never written (engine failure or cancellation)
    pub gaps: Vec<usize>,
    /// Run was cancelled before every line started
    pub cancelled: bool,
    /// Latest start time (s) of a trace placed at sample 0 by
    /// [`TraceAlignment::Zero`] although it began later than half a sample
    pub ignored_start_time: Option<f64>,
}

impl AcquisitionReport {
    pub fn truncations(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.issues.iter().filter_map(|issue| match issue {
            LineIssue::Truncated { line, discarded } => Some((*line, *discarded)),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &EngineError)> + '_ {
        self.issues.iter().filter_map(|issue| match issue {
            LineIssue::EngineFailure { line, error } => Some((*line, error)),
            _ => None,
        })
    }

    pub fn total_discarded(&self) -> usize {
        self.truncations().map(|(_, d)| d).sum()
    }

    /// No issues and no gaps
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.gaps.is_empty() && !self.cancelled
    }

    pub fn to_text(&self) -> String {
        let mut output = format!(
            "Acquired {}/{} lines",
            self.lines_acquired, self.scan_lines
        );
        if self.cancelled {
            output.push_str(" (cancelled)");
        }
        output.push('\n');
        for issue in &self.issues {
            output.push_str(&format!("  {}\n", issue));
        }
        if !self.gaps.is_empty() {
            output.push_str(&format!("  gaps: {:?}\n", self.gaps));
        }
        if let Some(start) = self.ignored_start_time {
            output.push_str(&format!(
                "  traces start up to {:.2} us after transmit but were written from sample 0; \
                 use absolute trace alignment to image echoes at their true depth\n",
                start * 1e6
            ));
        }
        output
    }
}

/// Filled RF matrix plus the conditions met while filling it
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub rf: RfMatrix,
    pub report: AcquisitionReport,
}

struct LineOutcome {
    acquired: bool,
    issue: Option<LineIssue>,
    start_time: Option<f64>,
}

/// Orchestrates per-line engine calls into a fixed-shape RF matrix
#[derive(Debug, Clone, PartialEq)]
pub struct PulseEchoCollector {
    capacity: usize,
    sample_rate: f64,
    alignment: TraceAlignment,
    line_timeout: Option<Duration>,
}

impl PulseEchoCollector {
    pub fn new(capacity: usize, sample_rate: f64) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidSampling(
                "RF buffer capacity must be at least 1".to_string(),
            ));
        }
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(ConfigError::InvalidSampling(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        Ok(Self {
            capacity,
            sample_rate,
            alignment: TraceAlignment::Zero,
            line_timeout: None,
        })
    }

    pub fn with_alignment(mut self, alignment: TraceAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_line_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.line_timeout = timeout;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Column offset for a trace starting at `start_time`
    pub fn offset_for(&self, start_time: f64) -> i64 {
        match self.alignment {
            TraceAlignment::Zero => 0,
            TraceAlignment::Absolute => (start_time * self.sample_rate).round() as i64,
        }
    }

    /// Acquire every line of `plan`
    pub fn collect<E: PulseEchoEngine + 'static>(
        &self,
        engine: &Arc<E>,
        tx: &E::Aperture,
        rx: &E::Aperture,
        plan: &ScanLinePlan,
        phantom: &Phantom,
    ) -> Acquisition {
        self.collect_with_cancel(engine, tx, rx, plan, phantom, &AtomicBool::new(false))
    }

    /// Acquire every line of `plan`, skipping lines not yet started once
    /// `cancel` is set
    ///
    /// Columns written before cancellation stay valid; skipped lines are
    /// reported as gaps.
    pub fn collect_with_cancel<E: PulseEchoEngine + 'static>(
        &self,
        engine: &Arc<E>,
        tx: &E::Aperture,
        rx: &E::Aperture,
        plan: &ScanLinePlan,
        phantom: &Phantom,
        cancel: &AtomicBool,
    ) -> Acquisition {
        let total = plan.len();
        let mut samples = ColumnMatrix::zeros(self.capacity, total);
        let completed = AtomicUsize::new(0);
        let phantom = Arc::new(phantom.clone());
        debug!(
            "Acquiring {} lines into {}x{} buffer",
            total, self.capacity, total
        );

        let work = |(column, line): (&mut [f64], &ScanLine)| -> LineOutcome {
            if cancel.load(Ordering::Relaxed) {
                return LineOutcome {
                    acquired: false,
                    issue: None,
                    start_time: None,
                };
            }
            let outcome = self.acquire_line(engine, tx, rx, line, &phantom, column);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            info!("Completed {}/{} lines", done, total);
            outcome
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<LineOutcome> = samples
            .as_mut_slice()
            .par_chunks_mut(self.capacity)
            .zip(plan.lines().par_iter())
            .map(work)
            .collect();

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<LineOutcome> = samples
            .as_mut_slice()
            .chunks_mut(self.capacity)
            .zip(plan.lines().iter())
            .map(work)
            .collect();

        let mut acquired = Vec::with_capacity(total);
        let mut issues = Vec::new();
        let mut latest_start: Option<f64> = None;
        for outcome in outcomes {
            acquired.push(outcome.acquired);
            issues.extend(outcome.issue);
            if let Some(t) = outcome.start_time {
                latest_start = Some(latest_start.map_or(t, |l| l.max(t)));
            }
        }
        let ignored_start_time = latest_start.filter(|&t| {
            self.alignment == TraceAlignment::Zero && t * self.sample_rate >= 0.5
        });
        if let Some(t) = ignored_start_time {
            warn!(
                "Traces start up to {:.2} us after transmit but are written from sample 0; \
                 echoes appear shallower than they are (use absolute alignment)",
                t * 1e6
            );
        }
        let gaps: Vec<usize> = acquired
            .iter()
            .enumerate()
            .filter(|(_, &a)| !a)
            .map(|(i, _)| i)
            .collect();
        let cancelled = cancel.load(Ordering::Relaxed) && completed.load(Ordering::Relaxed) < total;

        let report = AcquisitionReport {
            issues,
            lines_acquired: total - gaps.len(),
            scan_lines: total,
            gaps,
            cancelled,
            ignored_start_time,
        };

        Acquisition {
            rf: RfMatrix { samples, acquired },
            report,
        }
    }

    fn acquire_line<E: PulseEchoEngine + 'static>(
        &self,
        engine: &Arc<E>,
        tx_template: &E::Aperture,
        rx_template: &E::Aperture,
        line: &ScanLine,
        phantom: &Arc<Phantom>,
        column: &mut [f64],
    ) -> LineOutcome {
        let mut tx = tx_template.clone();
        let mut rx = rx_template.clone();
        tx.set_center(line.center());
        tx.set_focus(0.0, line.focus);
        rx.set_center(line.center());
        rx.set_focus(0.0, line.focus);

        let failure = |error: EngineError| {
            warn!("Line {} failed: {}", line.index, error);
            LineOutcome {
                acquired: false,
                issue: Some(LineIssue::EngineFailure {
                    line: line.index,
                    error,
                }),
                start_time: None,
            }
        };

        let result = match self.line_timeout {
            Some(limit) => call_with_deadline(engine, tx, rx, phantom, limit),
            None => engine.pulse_echo(&tx, &rx, phantom),
        };
        let trace = match result {
            Ok(trace) => trace,
            Err(error) => return failure(error),
        };
        if !trace.start_time.is_finite() || trace.samples.iter().any(|s| !s.is_finite()) {
            return failure(EngineError::InvalidTrace(
                "non-finite sample or start time".to_string(),
            ));
        }

        let offset = self.offset_for(trace.start_time);
        let discarded = write_trace(column, &trace.samples, offset);
        let issue = (discarded > 0).then(|| {
            warn!(
                "Line {}: trace of {} samples at offset {} exceeds capacity {}, {} discarded",
                line.index,
                trace.samples.len(),
                offset,
                self.capacity,
                discarded
            );
            LineIssue::Truncated {
                line: line.index,
                discarded,
            }
        });

        LineOutcome {
            acquired: true,
            issue,
            start_time: Some(trace.start_time),
        }
    }
}

/// Run one engine call on a worker thread, waiting at most `limit`
///
/// On timeout the worker is detached; its late result is dropped.
fn call_with_deadline<E: PulseEchoEngine + 'static>(
    engine: &Arc<E>,
    tx: E::Aperture,
    rx: E::Aperture,
    phantom: &Arc<Phantom>,
    limit: Duration,
) -> Result<EchoTrace, EngineError> {
    let (sender, receiver) = mpsc::channel();
    let engine = Arc::clone(engine);
    let phantom = Arc::clone(phantom);
    let started = Instant::now();

    thread::Builder::new()
        .name("pulse-echo".to_string())
        .spawn(move || {
            // The receiver is gone once the deadline has passed
            let _ = sender.send(engine.pulse_echo(&tx, &rx, &phantom));
        })
        .map_err(|e| EngineError::Failed(format!("could not start engine worker: {}", e)))?;

    match receiver.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout {
            elapsed: started.elapsed(),
            limit,
        }),
        Err(RecvTimeoutError::Disconnected) => {
            Err(EngineError::Failed("engine worker panicked".to_string()))
        }
    }
}

/// Copy `trace` into `column` starting at `offset`, returning the number of
/// samples that fell outside the column
///
/// A negative offset drops the leading samples.
fn write_trace(column: &mut [f64], trace: &[f64], offset: i64) -> usize {
    let (src, dst_start, leading) = if offset < 0 {
        let skip = (offset.unsigned_abs() as usize).min(trace.len());
        (&trace[skip..], 0, skip)
    } else {
        (trace, offset as usize, 0)
    };
    let room = column.len().saturating_sub(dst_start);
    let take = src.len().min(room);
    if take > 0 {
        column[dst_start..dst_start + take].copy_from_slice(&src[..take]);
    }
    leading + (src.len() - take)
}
