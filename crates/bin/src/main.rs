//! SVCJ CLI binary.
//!
//! Provides a command-line interface for rolling-window SVCJ estimation.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use svcj::data::{PanelLoadOptions, ReturnPanel, ValueKind};
use svcj::model::{EstimatorConfig, Parameter, ParameterBounds};
use svcj::output::{ExportFormat, Exporter, FactorSummary};
use svcj::{PanelConfig, PanelEstimator};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "svcj")]
#[command(about = "SVCJ: rolling-window stochastic volatility factor estimation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the factor matrix of a return panel
    Estimate {
        /// CSV file with a date column and one column per asset
        #[arg(long, short)]
        input: PathBuf,

        /// Input columns hold prices instead of log-returns
        #[arg(long)]
        prices: bool,

        /// Name of the date column
        #[arg(long, default_value = "date")]
        date_column: String,

        /// Observations per window
        #[arg(long, default_value = "126")]
        window: usize,

        /// Observations between window starts
        #[arg(long, default_value = "1")]
        step: usize,

        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Cancel windows not started within this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// JSON file with estimator settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file for the factor matrix (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,

        /// Also write per-window estimation diagnostics as CSV
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// List the model parameters and their default bounds
    Params,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
    PrettyJson,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => Self::Csv,
            OutputFormat::Json => Self::Json,
            OutputFormat::PrettyJson => Self::PrettyJson,
        }
    }
}

/// Options of the `estimate` subcommand.
struct EstimateArgs {
    input: PathBuf,
    load: PanelLoadOptions,
    panel: PanelConfig,
    output: Option<PathBuf>,
    format: ExportFormat,
    diagnostics: Option<PathBuf>,
    progress: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            input,
            prices,
            date_column,
            window,
            step,
            threads,
            timeout_secs,
            config,
            output,
            format,
            diagnostics,
            no_progress,
        } => {
            let estimator = match config {
                Some(path) => load_estimator_config(&path)?,
                None => EstimatorConfig::default(),
            };
            let args = EstimateArgs {
                input,
                load: PanelLoadOptions {
                    date_column,
                    values: if prices {
                        ValueKind::Prices
                    } else {
                        ValueKind::LogReturns
                    },
                },
                panel: PanelConfig {
                    window_size: window,
                    step_size: step,
                    threads,
                    timeout: timeout_secs.map(Duration::from_secs),
                    estimator,
                },
                output,
                format: format.into(),
                diagnostics,
                progress: !no_progress,
            };
            estimate(args)?;
        }
        Commands::Params => list_parameters(),
    }

    Ok(())
}

fn load_estimator_config(path: &Path) -> Result<EstimatorConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let config: EstimatorConfig = serde_json::from_str(&content)?;
    info!(path = %path.display(), "Loaded estimator configuration");
    Ok(config)
}

fn estimate(args: EstimateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = PanelEstimator::new(args.panel)?;

    let panel = ReturnPanel::from_csv_path(&args.input, &args.load)?;
    info!(
        path = %args.input.display(),
        assets = panel.n_assets(),
        dates = panel.n_dates(),
        "Loaded panel"
    );

    let total = engine.task_count(&panel) as u64;
    let pb = if args.progress {
        ProgressBar::new(total)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} windows ({eta})")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let estimate = engine.run_with_observer(&panel, |_, _| pb.inc(1))?;
    pb.finish_and_clear();

    let summary = FactorSummary::from_matrix(&estimate.matrix);
    eprintln!("{}", summary.to_ascii_table());
    eprintln!(
        "Windows: {} estimated, {} failed, {} cancelled",
        estimate.results.len(),
        estimate.failures.len() - estimate.cancelled,
        estimate.cancelled
    );
    if !estimate.insufficient_assets.is_empty() {
        eprintln!(
            "Assets shorter than one window: {}",
            estimate.insufficient_assets.join(", ")
        );
    }

    match &args.output {
        Some(path) => {
            estimate.matrix.export_to_file(path, args.format)?;
            info!(path = %path.display(), "Wrote factor matrix");
        }
        None => print!("{}", estimate.matrix.export_to_string(args.format)?),
    }

    if let Some(path) = &args.diagnostics {
        estimate.results.export_to_file(path, ExportFormat::Csv)?;
        info!(path = %path.display(), "Wrote estimation diagnostics");
    }

    Ok(())
}

fn list_parameters() {
    let bounds = ParameterBounds::default();

    println!("\nSVCJ Parameters");
    println!("{}", "=".repeat(80));
    println!(
        "{:<10} {:>12} {:>12}   {}",
        "Name", "Lower", "Upper", "Description"
    );
    println!("{}", "-".repeat(80));
    for parameter in Parameter::ALL {
        let (lo, hi) = bounds.get(parameter);
        println!(
            "{:<10} {:>12} {:>12}   {}",
            parameter.name(),
            lo,
            hi,
            parameter.description()
        );
    }
    println!("{}", "=".repeat(80));
    println!("Rates are per year; dt = 1 / 252 by default.");
}
