//! B-mode PSF Simulator Command-Line Interface
//!
//! This CLI provides tools for:
//! - Running the synthetic B-mode pipeline on a point-scatterer phantom
//! - Inspecting the scan-line plan and derived acquisition parameters
//! - Writing and validating YAML run configurations
//!
//! Build without default features to drop PNG output.

use anyhow::{Context, Result};
use bmode_core::acquisition::TraceAlignment;
use bmode_core::axis::DisplayUnit;
use bmode_core::config::RunConfig;
use bmode_core::pipeline::RunOutput;
use bmode_core::render::{BModeView, Colormap};
use bmode_core::window::Apodization;
use bmode_sim::Session;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "bmode")]
#[command(author, version, about = "Synthetic B-mode PSF simulator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options overriding fields of the loaded configuration
#[derive(clap::Args, Debug, Default)]
struct ConfigArgs {
    /// YAML configuration file (defaults apply to missing keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of array elements
    #[arg(long)]
    elements: Option<usize>,

    /// Number of scan lines
    #[arg(long)]
    scan_lines: Option<usize>,

    /// Focus depth in metres
    #[arg(long)]
    focus_depth: Option<f64>,

    /// Displayed dynamic range in dB
    #[arg(long)]
    dynamic_range: Option<f64>,

    /// RF buffer capacity in samples per line
    #[arg(long)]
    capacity: Option<usize>,

    /// Sampling frequency in Hz
    #[arg(long)]
    sampling_frequency: Option<f64>,

    /// Scatterer as x,y,z[,amplitude] in metres (repeat for several)
    #[arg(long = "scatterer", value_name = "X,Y,Z[,AMP]")]
    scatterers: Vec<String>,

    /// Trace alignment (zero, absolute)
    #[arg(long)]
    alignment: Option<String>,

    /// Apodization for both apertures (rect, hann, hamming, tukey:<alpha>)
    #[arg(long)]
    apodization: Option<String>,

    /// Per-line engine deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Receiver noise standard deviation
    #[arg(long)]
    noise: Option<f64>,

    /// Noise seed
    #[arg(long)]
    seed: Option<u64>,

    /// Unit for lateral positions and widths (m, mm)
    #[arg(long)]
    unit: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate, form the image and measure the PSF
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Report format (text, json, csv)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the B-mode image as PNG
        #[arg(long)]
        png: Option<PathBuf>,

        /// Print the B-mode image as ASCII art
        #[arg(long)]
        ascii: bool,

        /// Show only the configured depth range in image output
        #[arg(long)]
        crop: bool,

        /// Colormap for PNG output (grayscale, hot, viridis)
        #[arg(long, default_value = "grayscale")]
        colormap: String,
    },

    /// Print the scan-line plan
    Plan {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output format (text, csv)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show derived acquisition parameters and buffer coverage
    Info {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Write the effective configuration as YAML
    Config {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl ConfigArgs {
    /// Load the configuration file, if any, then apply overrides
    fn resolve(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load_from(path)
                .with_context(|| format!("Failed to load configuration {:?}", path))?,
            None => RunConfig::default(),
        };

        if let Some(n) = self.elements {
            config.num_elements = n;
        }
        if let Some(n) = self.scan_lines {
            config.num_scan_lines = n;
        }
        if let Some(z) = self.focus_depth {
            config.focus_depth = z;
        }
        if let Some(dr) = self.dynamic_range {
            config.dynamic_range_db = dr;
        }
        if let Some(n) = self.capacity {
            config.rf_buffer_capacity = n;
        }
        if let Some(fs) = self.sampling_frequency {
            config.sampling_frequency = fs;
        }
        if !self.scatterers.is_empty() {
            let mut positions = Vec::new();
            let mut amplitudes = Vec::new();
            for spec in &self.scatterers {
                let (p, a) = parse_scatterer(spec)?;
                positions.push(p);
                amplitudes.push(a);
            }
            config.scatterer_positions = positions;
            config.scatterer_amplitudes = amplitudes;
        }
        if let Some(ref s) = self.alignment {
            config.trace_alignment = TraceAlignment::from_str(s)
                .ok_or_else(|| anyhow::anyhow!("Unknown alignment: {}. Use zero or absolute", s))?;
        }
        if let Some(ref s) = self.apodization {
            let apodization = Apodization::from_str(s).ok_or_else(|| {
                anyhow::anyhow!("Unknown apodization: {}. Use rect, hann, hamming or tukey:<alpha>", s)
            })?;
            config.tx_apodization = apodization;
            config.rx_apodization = apodization;
        }
        if let Some(ms) = self.timeout_ms {
            config.line_timeout_ms = Some(ms);
        }
        if let Some(std) = self.noise {
            config.noise_std = std;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(ref s) = self.unit {
            config.display_unit = DisplayUnit::from_str(s)
                .ok_or_else(|| anyhow::anyhow!("Unknown unit: {}. Use m or mm", s))?;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Parse `x,y,z[,amplitude]` (metres)
fn parse_scatterer(spec: &str) -> Result<([f64; 3], f64)> {
    let values: Vec<f64> = spec
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid scatterer '{}'", spec))?;
    match values.as_slice() {
        [x, y, z] => Ok(([*x, *y, *z], 1.0)),
        [x, y, z, a] => Ok(([*x, *y, *z], *a)),
        _ => anyhow::bail!("Scatterer '{}' must be x,y,z or x,y,z,amplitude", spec),
    }
}

fn write_or_print(output: Option<&Path>, text: &str, what: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
            println!("{} written to {:?}", what, path);
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// Report format for `run` and `plan`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    /// Parse a format name, accepting only those listed in `allowed`
    fn parse(s: &str, allowed: &[ReportFormat]) -> Result<Self> {
        let format = match s.to_lowercase().as_str() {
            "text" | "txt" => ReportFormat::Text,
            "json" => ReportFormat::Json,
            "csv" => ReportFormat::Csv,
            _ => anyhow::bail!("Unknown format: {}. Use {}", s, format_names(allowed)),
        };
        if !allowed.contains(&format) {
            anyhow::bail!("Format {} is not available here. Use {}", s, format_names(allowed));
        }
        Ok(format)
    }
}

fn format_names(allowed: &[ReportFormat]) -> String {
    allowed
        .iter()
        .map(|f| match f {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        })
        .collect::<Vec<_>>()
        .join(", ")
}

struct RunArgs {
    format: String,
    output: Option<PathBuf>,
    png: Option<PathBuf>,
    ascii: bool,
    crop: bool,
    colormap: String,
}

fn cmd_run(config: RunConfig, args: RunArgs) -> Result<()> {
    let format = ReportFormat::parse(
        &args.format,
        &[ReportFormat::Text, ReportFormat::Json, ReportFormat::Csv],
    )?;
    let colormap = Colormap::from_str(&args.colormap)
        .ok_or_else(|| anyhow::anyhow!("Unknown colormap: {}. Use grayscale, hot or viridis", args.colormap))?;

    // Setup Ctrl+C handler
    let cancel = Arc::new(AtomicBool::new(false));
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        c.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let session = Session::setup(&config).context("Failed to set up simulation session")?;
    let started = Instant::now();
    let output = session.run_with_cancel(&cancel).context("Simulation failed")?;
    info!(
        "Simulated {} lines in {:.2} s",
        output.acquisition.report.lines_acquired,
        started.elapsed().as_secs_f64()
    );
    session.release();

    let report = match format {
        ReportFormat::Json => output.to_json(),
        ReportFormat::Csv => output
            .primary_psf()
            .map(|psf| psf.to_csv(&output.axes))
            .unwrap_or_default(),
        ReportFormat::Text => output.to_text(),
    };
    write_or_print(args.output.as_deref(), &report, "Report")?;

    if args.ascii {
        println!("{}", image_view(&config, &output, args.crop).to_ascii(80, 40));
    }

    if let Some(png_path) = args.png {
        write_png(&config, &output, args.crop, colormap, &png_path)?;
    }

    if let Some(psf) = output.primary_psf() {
        println!("{}", psf.summary());
    }
    if output.acquisition.report.cancelled {
        anyhow::bail!(
            "Run cancelled after {}/{} lines",
            output.acquisition.report.lines_acquired,
            output.acquisition.report.scan_lines
        );
    }
    Ok(())
}

fn image_view<'a>(config: &RunConfig, output: &'a RunOutput, crop: bool) -> BModeView<'a> {
    let view = BModeView::new(&output.image.log_image, &output.axes, config.dynamic_range_db);
    if crop {
        view.cropped(config.depth_range.start, config.depth_range.end)
    } else {
        view
    }
}

#[cfg(feature = "image")]
fn write_png(config: &RunConfig, output: &RunOutput, crop: bool, colormap: Colormap, path: &Path) -> Result<()> {
    let view = image_view(config, output, crop);
    if view.is_empty() {
        anyhow::bail!("Image is empty; the depth range may lie beyond the RF buffer");
    }
    let png = view.to_png(colormap).context("Failed to encode PNG")?;
    std::fs::write(path, &png).with_context(|| format!("Failed to write {:?}", path))?;
    let (width, height) = view.dimensions();
    println!("B-mode PNG written to {:?}", path);
    println!("Dimensions: {}x{}", width, height);
    Ok(())
}

#[cfg(not(feature = "image"))]
fn write_png(_config: &RunConfig, _output: &RunOutput, _crop: bool, _colormap: Colormap, _path: &Path) -> Result<()> {
    anyhow::bail!("PNG output requires the 'image' feature. Use --ascii instead.")
}

fn cmd_plan(config: RunConfig, format: String) -> Result<()> {
    let format = ReportFormat::parse(&format, &[ReportFormat::Text, ReportFormat::Csv])?;
    let plan = config.planner().plan()?;
    if format == ReportFormat::Csv {
        print!("{}", plan.to_csv());
        return Ok(());
    }

    println!("Scan-Line Plan");
    println!("{}", "═".repeat(50));
    println!("Lines:             {}", plan.len());
    println!("Focus Depth:       {:.2} mm", plan.focus_depth() * 1e3);
    let x = plan.lateral_positions();
    if let (Some(first), Some(last)) = (x.first(), x.last()) {
        println!("Lateral Span:      {:.3} mm to {:.3} mm", first * 1e3, last * 1e3);
    }
    if x.len() >= 2 {
        println!("Line Spacing:      {:.4} mm", (x[1] - x[0]) * 1e3);
    }
    Ok(())
}

fn cmd_info(config: RunConfig) -> Result<()> {
    let geometry = config.geometry();
    let coverage = config.depth_coverage();
    let step = config.axis_mapper()?.depth_step();

    println!("Acquisition Parameters");
    println!("{}", "═".repeat(50));
    println!("Center Frequency:  {:.2} MHz", config.center_frequency / 1e6);
    println!("Sampling:          {:.2} MHz", config.sampling_frequency / 1e6);
    println!("Wavelength:        {:.4} mm", config.wavelength() * 1e3);
    println!("Elements:          {}", geometry.num_elements);
    println!("Pitch:             {:.4} mm", geometry.pitch() * 1e3);
    println!("Aperture:          {:.3} mm", 2.0 * geometry.half_aperture() * 1e3);
    println!("Scan Lines:        {}", config.num_scan_lines);
    println!("Focus Depth:       {:.2} mm", config.focus_depth * 1e3);
    println!("Scatterers:        {}", config.scatterer_positions.len());
    println!("Alignment:         {:?}", config.trace_alignment);
    if config.trace_alignment == TraceAlignment::Zero {
        println!("                   traces are written from sample 0; use --alignment absolute");
        println!("                   to place echoes at their round-trip depth");
    }
    println!("Apodization:       tx {}, rx {}", config.tx_apodization, config.rx_apodization);
    println!();
    println!("RF Buffer");
    println!("{}", "─".repeat(50));
    println!("Capacity:          {} samples", coverage.capacity);
    println!("Depth Step:        {:.4} mm", step * 1e3);
    println!("Buffer Depth:      {:.2} mm", coverage.max_depth * 1e3);
    println!(
        "Depth Range:       {:.2} mm to {:.2} mm",
        config.depth_range.start * 1e3,
        config.depth_range.end * 1e3
    );
    match coverage.shortfall() {
        Some(shortfall) => println!(
            "Coverage:          SHORT by {:.2} mm (needs {} samples)",
            shortfall * 1e3,
            coverage.required_capacity()
        ),
        None => println!("Coverage:          OK"),
    }
    Ok(())
}

fn cmd_config(config: RunConfig, output: Option<PathBuf>) -> Result<()> {
    let yaml = config.to_yaml().context("Failed to serialize configuration")?;
    write_or_print(output.as_deref(), &yaml, "Configuration")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            config,
            format,
            output,
            png,
            ascii,
            crop,
            colormap,
        } => cmd_run(
            config.resolve()?,
            RunArgs {
                format,
                output,
                png,
                ascii,
                crop,
                colormap,
            },
        ),

        Commands::Plan { config, format } => cmd_plan(config.resolve()?, format),

        Commands::Info { config } => cmd_info(config.resolve()?),

        Commands::Config { config, output } => cmd_config(config.resolve()?, output),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scatterer() {
        assert_eq!(parse_scatterer("0,0,0.04").unwrap(), ([0.0, 0.0, 0.04], 1.0));
        assert_eq!(parse_scatterer("0.001, 0, 0.03, 0.5").unwrap(), ([0.001, 0.0, 0.03], 0.5));
        assert!(parse_scatterer("0,0").is_err());
        assert!(parse_scatterer("a,b,c").is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let args = ConfigArgs {
            elements: Some(64),
            scan_lines: Some(33),
            scatterers: vec!["0,0,0.03".to_string(), "0.002,0,0.035,0.5".to_string()],
            alignment: Some("absolute".to_string()),
            apodization: Some("hann".to_string()),
            unit: Some("m".to_string()),
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.num_elements, 64);
        assert_eq!(config.num_scan_lines, 33);
        assert_eq!(config.scatterer_amplitudes, vec![1.0, 0.5]);
        assert_eq!(config.trace_alignment, TraceAlignment::Absolute);
        assert_eq!(config.rx_apodization, Apodization::Hann);
        assert_eq!(config.display_unit, DisplayUnit::Meters);
    }

    #[test]
    fn test_report_format_parsing() {
        let all = [ReportFormat::Text, ReportFormat::Json, ReportFormat::Csv];
        assert_eq!(ReportFormat::parse("json", &all).unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::parse("CSV", &all).unwrap(), ReportFormat::Csv);
        let err = ReportFormat::parse("xml", &all).unwrap_err();
        assert!(err.to_string().contains("Unknown format: xml"));
        assert!(ReportFormat::parse("json", &[ReportFormat::Text, ReportFormat::Csv]).is_err());
    }

    #[test]
    fn test_unknown_run_format_fails_before_simulating() {
        let args = RunArgs {
            format: "yaml".to_string(),
            output: None,
            png: None,
            ascii: false,
            crop: false,
            colormap: "grayscale".to_string(),
        };
        let err = cmd_run(RunConfig::default(), args).unwrap_err();
        assert!(err.to_string().contains("Unknown format: yaml"));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = ConfigArgs {
            scan_lines: Some(0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
