//! # CLI Module
//!
//! Command-line interface for tile-diff.
//!
//! ## Usage
//! ```bash
//! # Compare 512px units of a scan
//! tile-diff -i scan.png
//!
//! # Smaller units, stricter threshold, four workers
//! tile-diff -i scan.png -o diffs -s 128 -t 1.5 -c 4
//!
//! # JSON summary for scripting
//! tile-diff -i scan.png --report json
//! ```

use clap::{Parser, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;
use tile_diff::core::loader::InputFormat;
use tile_diff::core::pipeline::{default_workers, Pipeline, PipelineResult, RunOutcome};
use tile_diff::error::Result;
use tile_diff::events::{CompareEvent, Event, EventChannel, PersistEvent, PipelineEvent};

/// tile-diff - Find the parts of an image that look different
#[derive(Parser, Debug)]
#[command(name = "tile-diff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the source image
    #[arg(short, long)]
    input: PathBuf,

    /// Root directory for flagged pairs
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Unit edge length in pixels
    #[arg(short = 's', long, default_value_t = 512)]
    unit_size: u32,

    /// CIEDE2000 difference above which a pair is reported
    #[arg(short, long, default_value_t = 3.0, allow_negative_numbers = true)]
    threshold: f64,

    /// Worker threads (defaults to the number of available cores)
    #[arg(short = 'c', long)]
    cpu_cores: Option<usize>,

    /// Input format; auto detects from the file contents
    #[arg(long, default_value = "auto")]
    format: Format,

    /// How to report the result
    #[arg(long, default_value = "pretty")]
    report: Report,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Auto,
    Png,
    Jpeg,
    Bmp,
    Gif,
    Tiff,
    Webp,
}

impl From<Format> for InputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Auto => InputFormat::Auto,
            Format::Png => InputFormat::Png,
            Format::Jpeg => InputFormat::Jpeg,
            Format::Bmp => InputFormat::Bmp,
            Format::Gif => InputFormat::Gif,
            Format::Tiff => InputFormat::Tiff,
            Format::Webp => InputFormat::WebP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    /// Progress bar and a colored summary
    Pretty,
    /// The full result as JSON on stdout
    Json,
    /// Nothing beyond logs and the exit status
    Quiet,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    tile_diff::init_tracing(cli.verbose);

    let pipeline = Pipeline::builder()
        .input(&cli.input)
        .output(&cli.output)
        .unit_size(cli.unit_size)
        .threshold(cli.threshold)
        .workers(cli.cpu_cores.unwrap_or_else(default_workers))
        .format(cli.format.into())
        .build();

    let term = Term::stderr();
    if cli.report == Report::Pretty {
        term.write_line(&format!(
            "{} {}",
            style("tile-diff").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    // Set up event handling
    let (sender, receiver) = EventChannel::new();

    let progress = if cli.report == Report::Pretty {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} pairs {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose = cli.verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        let Some(pb) = progress_clone else {
            for _ in receiver.iter() {}
            return;
        };

        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Compare(CompareEvent::Started { total_pairs, .. }) => {
                    pb.set_length(total_pairs as u64);
                }
                Event::Compare(CompareEvent::Progress { compared }) => {
                    pb.inc(compared as u64);
                }
                Event::Compare(CompareEvent::Flagged {
                    unit_a,
                    unit_b,
                    distance,
                }) if verbose => {
                    pb.println(format!(
                        "  {} ({}, {}) vs ({}, {}) {}",
                        style("≠").yellow(),
                        unit_a.0,
                        unit_a.1,
                        unit_b.0,
                        unit_b.1,
                        style(format_distance(distance)).dim()
                    ));
                }
                Event::Persist(PersistEvent::Failed { directory, message }) => {
                    pb.println(format!(
                        "  {} {}: {}",
                        style("!").red().bold(),
                        directory.display(),
                        message
                    ));
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Error { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    // Run the pipeline
    let result = pipeline.run_with_events(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let result = result?;
    match cli.report {
        Report::Pretty => print_pretty_results(&term, &result, &cli.output),
        Report::Json => print_json_results(&result),
        Report::Quiet => {}
    }

    Ok(())
}

fn print_pretty_results(term: &Term, result: &PipelineResult, output: &std::path::Path) {
    let headline = match result.outcome {
        RunOutcome::Completed => style("✓").green().bold(),
        RunOutcome::NothingToCompare | RunOutcome::Cancelled => style("•").yellow().bold(),
    };
    term.write_line(&format!("{} {}", headline, result.outcome)).ok();
    term.write_line("").ok();

    // Summary
    term.write_line(&format!(
        "  {}x{} image, {} units of {}px ({} x {})",
        result.image_width,
        result.image_height,
        style(result.units).cyan(),
        result.unit_size,
        result.columns,
        result.rows
    ))
    .ok();

    term.write_line(&format!(
        "  {} of {} pairs compared in {:.1}s",
        style(result.pairs_compared).cyan(),
        result.total_pairs,
        result.compare_duration_ms as f64 / 1000.0
    ))
    .ok();

    term.write_line(&format!(
        "  {} pairs above threshold",
        style(result.flagged).yellow()
    ))
    .ok();

    if result.flagged > 0 {
        term.write_line(&format!(
            "  {} pairs written to {}",
            style(result.persisted).cyan(),
            output.display()
        ))
        .ok();
    }

    if !result.errors.is_empty() {
        term.write_line(&format!(
            "  {} pairs could not be written",
            style(result.errors.len()).red()
        ))
        .ok();
    }

    term.write_line("").ok();
    term.write_line(&format!(
        "{}",
        style(format!(
            "Finished in {:.1}s",
            result.duration_ms as f64 / 1000.0
        ))
        .dim()
    ))
    .ok();
}

fn print_json_results(result: &PipelineResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to serialise result: {}", e),
    }
}

fn format_distance(distance: f64) -> String {
    if distance == f64::MAX {
        "extent mismatch".to_string()
    } else {
        format!("ΔE {:.2}", distance)
    }
}
