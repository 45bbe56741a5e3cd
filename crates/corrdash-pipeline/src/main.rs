//! CLI entry point for the signal correlation pipeline.

use anyhow::{Result, anyhow, bail};
use chrono::Local;
use clap::{Parser, ValueEnum};
use corrdash_pipeline::profiler::DEFAULT_BINS;
use corrdash_pipeline::reconstruction::{DEFAULT_CONVERSION_RATIO, DEFAULT_WHEEL_BASE};
use corrdash_pipeline::signals::DEFAULT_SAMPLING_FREQUENCY;
use corrdash_pipeline::{
    ColumnSummary, Dataset, HistogramBin, PathReconstructor, Pipeline, PipelineOptions,
    ResultBundle, SignalTrace, Slot, SummaryComparison, TransformConfig, VehiclePath, apply,
    describe_many, histogram, signal_traces,
};
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// CLI-compatible transform selector
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTransform {
    /// Leave the data unchanged
    None,
    /// First difference of every column
    Derivative,
    /// Z-score every column
    Scaling,
    /// Trailing moving average (see --window)
    Smoothing,
}

impl CliTransform {
    fn to_config(self, window: usize) -> TransformConfig {
        match self {
            Self::None => TransformConfig::None,
            Self::Derivative => TransformConfig::Derivative,
            Self::Scaling => TransformConfig::Scaling,
            Self::Smoothing => TransformConfig::Smoothing { window },
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Signal correlation pipeline for drive recordings",
    long_about = "Transforms a numeric drive recording and computes PCA, k-means and \
                  pivot projections of it.\n\n\
                  EXAMPLES:\n  \
                  # Smooth the signals and cluster the rows\n  \
                  corrdash -i drive.parquet --transform smoothing --window 5 --clusters 3\n\n  \
                  # Compare the speed distribution of two drives\n  \
                  corrdash -i a.csv -i b.csv --describe speed\n\n  \
                  # Machine-readable output\n  \
                  corrdash -i drive.csv --embed --pivot gear,lane --json"
)]
struct Args {
    /// CSV or Parquet files to load; projections run on the first one, the
    /// transform, --describe, --signals and --reconstruct-path on all of them
    #[arg(short, long, required = true)]
    input: Vec<String>,

    /// Preprocessing applied to every column
    #[arg(short, long, value_enum, default_value = "none")]
    transform: CliTransform,

    /// Window length for --transform smoothing (1 - 10)
    #[arg(short, long, default_value = "5")]
    window: usize,

    /// Compute the 2-component PCA embedding
    #[arg(long)]
    embed: bool,

    /// Number of k-means clusters (2 - 10)
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Pivot heat map keys as "X,Y"
    #[arg(long)]
    pivot: Option<String>,

    /// Seed for k-means initialisation
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Summarise this (transformed) column across all input files
    #[arg(long)]
    describe: Option<String>,

    /// Histogram bins for --describe (10 - 100)
    #[arg(long, default_value_t = DEFAULT_BINS)]
    bins: usize,

    /// Signals to emit as time series, comma separated
    #[arg(long, value_delimiter = ',')]
    signals: Vec<String>,

    /// Sampling frequency of the recording in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLING_FREQUENCY)]
    sampling_frequency: f64,

    /// Reconstruct the vehicle path from wheel_angle and speed
    #[arg(long)]
    reconstruct_path: bool,

    /// Steering-wheel to road-wheel angle ratio (0.1 - 10)
    #[arg(long, default_value_t = DEFAULT_CONVERSION_RATIO)]
    conversion_ratio: f64,

    /// Wheel base in metres
    #[arg(long, default_value_t = DEFAULT_WHEEL_BASE)]
    wheel_base: f64,

    /// Write the transformed (and cluster-labelled) data to this CSV file
    #[arg(short, long)]
    output: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logs; only the final JSON document is written.
    #[arg(long)]
    json: bool,
}

/// Distribution view of one column, per input file.
#[derive(Debug, Serialize)]
struct Distribution {
    comparison: SummaryComparison,
    histograms: Vec<(String, Vec<HistogramBin>)>,
}

/// Everything the CLI computed for one invocation.
#[derive(Debug, Serialize)]
struct Report<'a> {
    input: &'a str,
    generated_at: String,
    bundle: &'a ResultBundle,
    #[serde(skip_serializing_if = "Option::is_none")]
    distribution: Option<Distribution>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    signals: Vec<(String, Vec<SignalTrace>)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    paths: Vec<(String, VehiclePath)>,
}

/// Initialize the tracing subscriber for logging.
///
/// Nothing is installed for JSON output so stdout carries only the document.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    let mut datasets = Vec::with_capacity(args.input.len());
    for path in &args.input {
        info!("Loading dataset from: {}", path);
        let df = load_dataframe(path)?;
        let dataset = Dataset::from_dataframe(&df)?;
        info!(
            "Loaded {} rows x {} numeric columns",
            dataset.height(),
            dataset.width()
        );
        datasets.push((extract_file_stem(path), dataset));
    }
    let (_, primary) = datasets
        .first()
        .ok_or_else(|| anyhow!("No input files given"))?;

    let config = args.transform.to_config(args.window);
    let options = build_options(&args)?;
    let pipeline = build_pipeline(&args, options)?;

    let bundle = match pipeline.run(primary.clone(), &config) {
        Ok(bundle) => bundle,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            bail!("Pipeline failed: {}", e);
        }
    };

    let signal_names: Vec<&str> = args.signals.iter().map(String::as_str).collect();
    let transformed = if args.describe.is_some() || !signal_names.is_empty() {
        transform_inputs(&datasets, &bundle.transformed, &config)?
    } else {
        Vec::new()
    };

    let distribution = match &args.describe {
        Some(column) => Some(build_distribution(&transformed, column, args.bins)?),
        None => None,
    };

    let signals = build_signals(
        &transformed,
        &signal_names,
        args.sampling_frequency,
        &bundle.transform_label,
    )?;

    let paths = if args.reconstruct_path {
        let reconstructor = PathReconstructor::new()
            .with_wheel_base(args.wheel_base)?
            .with_conversion_ratio(args.conversion_ratio)?;
        build_paths(&datasets, &reconstructor, args.sampling_frequency)?
    } else {
        Vec::new()
    };

    if let Some(output) = &args.output {
        write_csv(&bundle, output)?;
        info!("Transformed data written to: {}", output);
    }

    let report = Report {
        input: &args.input[0],
        generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        bundle: &bundle,
        distribution,
        signals,
        paths,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_human_readable_summary(&report, primary);
    Ok(())
}

fn build_options(args: &Args) -> Result<PipelineOptions> {
    let mut builder = PipelineOptions::builder().embed(args.embed).seed(args.seed);
    if let Some(k) = args.clusters {
        builder = builder.cluster_k(k);
    }
    if let Some(pivot_spec) = &args.pivot {
        let (x, y) = pivot_spec
            .split_once(',')
            .ok_or_else(|| anyhow!("--pivot expects two columns as X,Y, got '{}'", pivot_spec))?;
        builder = builder.pivot_columns(x.trim(), y.trim());
    }
    Ok(builder.build()?)
}

fn build_pipeline(args: &Args, options: PipelineOptions) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().options(options);

    if !args.quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

/// Every input after the transform. The first input reuses the pipeline's
/// output.
fn transform_inputs(
    datasets: &[(String, Dataset)],
    primary_transformed: &Dataset,
    config: &TransformConfig,
) -> Result<Vec<(String, Dataset)>> {
    let mut transformed = Vec::with_capacity(datasets.len());
    for (index, (name, dataset)) in datasets.iter().enumerate() {
        let dataset = if index == 0 {
            primary_transformed.clone()
        } else {
            debug!("Transforming '{}' with {}", name, config.label());
            apply(dataset, config)?
        };
        transformed.push((name.clone(), dataset));
    }
    Ok(transformed)
}

/// Traces for the requested signals, per input. Signals an input lacks are
/// skipped for that input.
fn build_signals(
    datasets: &[(String, Dataset)],
    signal_names: &[&str],
    sampling_frequency: f64,
    transform_label: &str,
) -> Result<Vec<(String, Vec<SignalTrace>)>> {
    if signal_names.is_empty() {
        return Ok(Vec::new());
    }

    let mut signals = Vec::new();
    for (name, dataset) in datasets {
        let (present, missing): (Vec<&str>, Vec<&str>) = signal_names
            .iter()
            .copied()
            .partition(|signal| dataset.has_column(signal));
        if !missing.is_empty() {
            warn!("'{}' has no column(s) {:?}; skipping them", name, missing);
        }
        if present.is_empty() {
            continue;
        }
        let traces = signal_traces(dataset, &present, sampling_frequency, transform_label)?;
        signals.push((name.clone(), traces));
    }

    if signals.is_empty() {
        bail!("None of the inputs has any of the signals {:?}", signal_names);
    }
    Ok(signals)
}

/// One path per input that carries the angle and speed columns.
fn build_paths(
    datasets: &[(String, Dataset)],
    reconstructor: &PathReconstructor,
    sampling_frequency: f64,
) -> Result<Vec<(String, VehiclePath)>> {
    let mut paths = Vec::new();
    for (name, dataset) in datasets {
        if reconstructor.supports(dataset) {
            paths.push((name.clone(), reconstructor.reconstruct(dataset, sampling_frequency)?));
        } else {
            warn!(
                "'{}' must contain 'wheel_angle' and 'speed' columns for path reconstruction",
                name
            );
        }
    }
    Ok(paths)
}

fn build_distribution(
    datasets: &[(String, Dataset)],
    column: &str,
    bins: usize,
) -> Result<Distribution> {
    let named: Vec<(&str, &Dataset)> = datasets
        .iter()
        .map(|(name, dataset)| (name.as_str(), dataset))
        .collect();
    let comparison = describe_many(&named, column)?;

    let mut histograms = Vec::new();
    for (name, dataset) in datasets {
        if dataset.has_column(column) {
            histograms.push((name.clone(), histogram(&dataset.values(column)?, bins)?));
        }
    }

    Ok(Distribution {
        comparison,
        histograms,
    })
}

/// Load a CSV or Parquet file, chosen by extension.
fn load_dataframe(path: &str) -> Result<DataFrame> {
    if !Path::new(path).exists() {
        bail!("Input file not found: {}", path);
    }

    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("parquet") => {
            debug!("Reading parquet file");
            Ok(ParquetReader::new(File::open(path)?).finish()?)
        }
        Some("csv") | None => {
            debug!("Reading CSV file");
            Ok(CsvReadOptions::default()
                .with_infer_schema_length(Some(100))
                .with_has_header(true)
                .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
                .finish()?)
        }
        Some(other) => bail!("Unsupported file type '.{}': expected .csv or .parquet", other),
    }
}

fn write_csv(bundle: &ResultBundle, output: &str) -> Result<()> {
    let mut df = bundle.labeled_dataset()?.into_dataframe();
    let mut file = File::create(output)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input")
        .to_string()
}

/// Print a human-readable summary of the run.
///
/// Uses `println!` rather than logging so the summary shows at any log level.
fn print_human_readable_summary(report: &Report<'_>, input: &Dataset) {
    let bundle = report.bundle;

    println!();
    println!("{}", "=".repeat(80));
    println!("PIPELINE COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!(
        "Input:     {} ({} rows x {} columns)",
        report.input,
        input.height(),
        input.width()
    );
    println!("Generated: {}", report.generated_at);
    println!("Transform: {}", bundle.transform_label);
    println!("Duration:  {}ms", bundle.duration_ms);
    println!();

    match &bundle.embedding {
        Slot::NotRequested => {}
        Slot::Ready { value } => println!(
            "Embedding: PC1 {:.1}% / PC2 {:.1}% of variance",
            value.explained_variance_ratio[0] * 100.0,
            value.explained_variance_ratio[1] * 100.0
        ),
        Slot::Failed { error } => println!("Embedding: FAILED [{}] {}", error.code, error.message),
    }

    match &bundle.clusters {
        Slot::NotRequested => {}
        Slot::Ready { value } => {
            println!(
                "Clusters:  k = {}, sizes {:?}, inertia {:.4}{}",
                value.k,
                value.cluster_sizes(),
                value.inertia,
                if value.converged { "" } else { " (not converged)" }
            );
        }
        Slot::Failed { error } => println!("Clusters:  FAILED [{}] {}", error.code, error.message),
    }

    match &bundle.pivot {
        Slot::NotRequested => {}
        Slot::Ready { value } => {
            println!(
                "Pivot:     {} x {} -> {} x {} cells, {} value columns",
                value.x_column,
                value.y_column,
                value.x_keys.len(),
                value.y_keys.len(),
                value.layers.len()
            );
            for warning in &value.warnings {
                println!("  ! {:?}", warning);
            }
        }
        Slot::Failed { error } => println!("Pivot:     FAILED [{}] {}", error.code, error.message),
    }

    if let Some(distribution) = &report.distribution {
        println!();
        println!("Distribution of '{}':", distribution.comparison.column);
        println!(
            "  {:<20} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "File", "Count", "Mean", "Std", "Min", "Median", "Max"
        );
        for (name, summary) in &distribution.comparison.summaries {
            print_summary_row(name, summary);
        }
        for name in &distribution.comparison.missing {
            println!("  {:<20} (column missing)", truncate_str(name, 19));
        }
    }

    for (name, traces) in &report.signals {
        println!();
        println!("Signals of '{}':", name);
        for trace in traces {
            println!(
                "  {:<28} {} samples over {:.2}s",
                truncate_str(&trace.label, 27),
                trace.values.len(),
                trace.time.last().copied().unwrap_or(0.0)
            );
        }
    }

    if !report.paths.is_empty() {
        println!();
        println!("Paths:");
        for (name, path) in &report.paths {
            let (x, y) = path.end();
            println!(
                "  {:<20} {} points, ends at ({:.2} m, {:.2} m)",
                truncate_str(name, 19),
                path.len(),
                x,
                y
            );
        }
    }

    println!();
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}

fn print_summary_row(name: &str, summary: &ColumnSummary) {
    println!(
        "  {:<20} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
        truncate_str(name, 19),
        summary.count,
        summary.mean,
        summary.std,
        summary.min,
        summary.median,
        summary.max
    );
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
