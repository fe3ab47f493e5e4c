//! Pipeline execution implementation.

use crate::core::comparator::{Comparator, CpuComparator};
use crate::core::loader::{FileLoader, ImageLoader, InputFormat};
use crate::core::pairs::{pair_count, PairEnumerator};
use crate::core::pool::{result_queue, PoolStats, WorkerPool};
use crate::core::sink::{PngTileEncoder, ResultSink, SinkReport, TileEncoder};
use crate::core::tiler::{SourceImage, Tiler};
use crate::error::{ConfigError, TileDiffError};
use crate::events::{
    null_sender, CompareEvent, Event, EventSender, PipelineEvent, PipelinePhase,
    PipelineSummary, TileEvent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cooperative cancellation for a running pipeline.
///
/// Clones share one flag. Once cancelled, no further pairs are enqueued and
/// workers stop before their next comparison; flagged pairs already queued
/// are still persisted.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Every pair was compared
    Completed,
    /// The image produced fewer than two units
    NothingToCompare,
    /// The run was cancelled part way through
    Cancelled,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "Completed"),
            RunOutcome::NothingToCompare => write!(f, "Nothing to compare"),
            RunOutcome::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Result of pipeline execution
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub outcome: RunOutcome,
    /// When the run started
    pub started_at: DateTime<Utc>,
    pub image_width: u32,
    pub image_height: u32,
    pub unit_size: u32,
    /// Grid columns
    pub columns: u32,
    /// Grid rows
    pub rows: u32,
    /// Units the image was divided into
    pub units: usize,
    /// Unique pairs among the units
    pub total_pairs: usize,
    /// Pairs actually compared (less than `total_pairs` only when cancelled)
    pub pairs_compared: usize,
    /// Pairs whose distance exceeded the threshold
    pub flagged: usize,
    /// Flagged pairs written to disk
    pub persisted: usize,
    /// Non-fatal errors (skipped pairs)
    pub errors: Vec<String>,
    /// Wall clock of the comparison phase in milliseconds
    pub compare_duration_ms: u64,
    /// Wall clock of the whole run in milliseconds
    pub duration_ms: u64,
}

impl PipelineResult {
    fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            units: self.units,
            pairs_compared: self.pairs_compared,
            flagged: self.flagged,
            persisted: self.persisted,
            duration_ms: self.duration_ms,
        }
    }
}

/// Configuration for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Image to split and compare
    pub input_path: PathBuf,
    /// Root directory for flagged pairs
    pub output_directory: PathBuf,
    /// Unit edge length in pixels
    pub unit_size: u32,
    /// Mean ΔE₀₀ above which a pair is reported
    pub threshold: f64,
    /// Worker threads
    pub workers: usize,
    /// Decoder hint for the input
    pub format: InputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_directory: PathBuf::from("./output"),
            unit_size: 512,
            threshold: 3.0,
            workers: default_workers(),
            format: InputFormat::Auto,
        }
    }
}

impl PipelineConfig {
    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingInput);
        }
        if !self.input_path.exists() {
            return Err(ConfigError::InputNotFound {
                path: self.input_path.clone(),
            });
        }
        if self.unit_size == 0 {
            return Err(ConfigError::InvalidUnitSize {
                value: self.unit_size,
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount {
                value: self.workers,
            });
        }
        if !self.threshold.is_finite() {
            return Err(ConfigError::InvalidThreshold {
                value: self.threshold,
            });
        }
        Ok(())
    }
}

/// Number of available cores, or 1 if that cannot be determined
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: PipelineConfig,
    comparator: Option<Box<dyn Comparator>>,
    loader: Option<Box<dyn ImageLoader>>,
    encoder: Option<Box<dyn TileEncoder>>,
    cancel: CancellationToken,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            comparator: None,
            loader: None,
            encoder: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the input image
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_path = path.into();
        self
    }

    /// Set the output root
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_directory = path.into();
        self
    }

    /// Set the unit edge length
    pub fn unit_size(mut self, unit_size: u32) -> Self {
        self.config.unit_size = unit_size;
        self
    }

    /// Set the difference threshold
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the worker count
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the input format hint
    pub fn format(mut self, format: InputFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Swap the comparison backend
    pub fn comparator(mut self, comparator: Box<dyn Comparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Swap the image loader
    pub fn loader(mut self, loader: Box<dyn ImageLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Swap the tile encoder
    pub fn encoder(mut self, encoder: Box<dyn TileEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Share a cancellation token with the caller
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        let format = self.config.format;
        Pipeline {
            config: self.config,
            comparator: self.comparator.unwrap_or_else(|| Box::new(CpuComparator::new())),
            loader: self
                .loader
                .unwrap_or_else(|| Box::new(FileLoader::new(format))),
            encoder: self.encoder.unwrap_or_else(|| Box::new(PngTileEncoder)),
            cancel: self.cancel,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The tile comparison pipeline
pub struct Pipeline {
    config: PipelineConfig,
    comparator: Box<dyn Comparator>,
    loader: Box<dyn ImageLoader>,
    encoder: Box<dyn TileEncoder>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline without events
    pub fn run(&self) -> Result<PipelineResult, TileDiffError> {
        self.run_with_events(&null_sender())
    }

    /// Run the pipeline with event reporting
    pub fn run_with_events(&self, events: &EventSender) -> Result<PipelineResult, TileDiffError> {
        let start_time = Instant::now();
        let started_at = Utc::now();

        events.send(Event::Pipeline(PipelineEvent::Started));

        if let Err(e) = self.config.validate() {
            events.send(Event::Pipeline(PipelineEvent::Error {
                message: e.to_string(),
            }));
            return Err(e.into());
        }

        // Phase 1: Loading
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Loading,
        }));
        info!(
            input = %self.config.input_path.display(),
            workers = self.config.workers,
            "starting image comparison"
        );

        let decoded = match self.loader.load(&self.config.input_path) {
            Ok(image) => image,
            Err(e) => {
                events.send(Event::Pipeline(PipelineEvent::Error {
                    message: e.to_string(),
                }));
                return Err(e.into());
            }
        };
        let source = SourceImage::from_dynamic(decoded);

        // Phase 2: Tiling
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Tiling,
        }));

        let tiler = Tiler::new(self.config.unit_size);
        let units = tiler.tile(&source);
        let (columns, rows) = tiler.grid_dimensions(source.width(), source.height());

        events.send(Event::Tile(TileEvent::Completed {
            units: units.len(),
            columns,
            rows,
            unit_size: self.config.unit_size,
        }));

        let mut result = PipelineResult {
            outcome: RunOutcome::NothingToCompare,
            started_at,
            image_width: source.width(),
            image_height: source.height(),
            unit_size: self.config.unit_size,
            columns,
            rows,
            units: units.len(),
            total_pairs: pair_count(units.len()),
            pairs_compared: 0,
            flagged: 0,
            persisted: 0,
            errors: Vec::new(),
            compare_duration_ms: 0,
            duration_ms: 0,
        };

        if units.len() < 2 {
            info!("image resulted in fewer than two units; no comparison is possible");
            result.duration_ms = start_time.elapsed().as_millis() as u64;
            events.send(Event::Pipeline(PipelineEvent::Completed {
                summary: result.summary(),
            }));
            return Ok(result);
        }
        info!(units = units.len(), columns, rows, "divided image into units");

        // Phase 3: Comparing, with the sink draining concurrently
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Comparing,
        }));

        let pool = WorkerPool::new(self.config.workers);
        let sink = ResultSink::new(&self.config.output_directory, self.encoder.as_ref());

        let (stats, compare_elapsed, report) = thread::scope(|scope| {
            let (result_tx, result_rx) = result_queue();
            let sink_events = events.clone();
            let sink_handle = scope.spawn(move || sink.persist(result_rx, &sink_events));

            let compare_start = Instant::now();
            let stats: PoolStats = pool.run(
                PairEnumerator::new(&units),
                self.comparator.as_ref(),
                self.config.threshold,
                result_tx,
                events,
                &self.cancel,
            );
            let compare_elapsed: Duration = compare_start.elapsed();

            let report: SinkReport = match sink_handle.join() {
                Ok(report) => report,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            (stats, compare_elapsed, report)
        });

        info!(
            pairs = stats.compared,
            flagged = stats.flagged,
            "comparison of all units took {:.2?}",
            compare_elapsed
        );
        events.send(Event::Compare(CompareEvent::Completed {
            compared: stats.compared,
            flagged: stats.flagged,
            duration_ms: compare_elapsed.as_millis() as u64,
        }));

        result.outcome = if self.cancel.is_cancelled() {
            events.send(Event::Pipeline(PipelineEvent::Cancelled));
            RunOutcome::Cancelled
        } else {
            RunOutcome::Completed
        };
        result.pairs_compared = stats.compared;
        result.flagged = stats.flagged;
        result.persisted = report.saved;
        result.errors = report.errors;
        result.compare_duration_ms = compare_elapsed.as_millis() as u64;
        result.duration_ms = start_time.elapsed().as_millis() as u64;

        debug!(persisted = result.persisted, skipped = result.errors.len(), "sink drained");
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: result.summary(),
        }));
        info!("processing complete");

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::events::EventChannel;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::path::Path;
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, image: &RgbImage) -> PathBuf {
        let path = dir.path().join(name);
        image.save(&path).unwrap();
        path
    }

    /// Serves a fixed image regardless of path
    struct StaticLoader(RgbImage);

    impl ImageLoader for StaticLoader {
        fn load(&self, _path: &Path) -> Result<DynamicImage, LoadError> {
            Ok(DynamicImage::ImageRgb8(self.0.clone()))
        }
    }

    #[test]
    fn pipeline_builder_creates_pipeline() {
        let pipeline = Pipeline::builder()
            .input("/scans/page.png")
            .output("/tmp/diffs")
            .unit_size(256)
            .threshold(1.5)
            .workers(3)
            .format(InputFormat::Png)
            .build();

        let config = pipeline.config();
        assert_eq!(config.unit_size, 256);
        assert_eq!(config.threshold, 1.5);
        assert_eq!(config.workers, 3);
        assert_eq!(config.format, InputFormat::Png);
        assert_eq!(config.output_directory, PathBuf::from("/tmp/diffs"));
    }

    #[test]
    fn defaults_match_cli_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_directory, PathBuf::from("./output"));
        assert_eq!(config.unit_size, 512);
        assert_eq!(config.threshold, 3.0);
        assert!(config.workers >= 1);
    }

    #[test]
    fn validate_rejects_bad_configuration() {
        let dir = TempDir::new().unwrap();
        let input = write_png(&dir, "in.png", &RgbImage::new(4, 4));
        let valid = PipelineConfig {
            input_path: input,
            ..PipelineConfig::default()
        };
        assert!(valid.validate().is_ok());

        let missing = PipelineConfig::default();
        assert!(matches!(missing.validate(), Err(ConfigError::MissingInput)));

        let nonexistent = PipelineConfig {
            input_path: dir.path().join("absent.png"),
            ..valid.clone()
        };
        assert!(matches!(
            nonexistent.validate(),
            Err(ConfigError::InputNotFound { .. })
        ));

        let zero_unit = PipelineConfig {
            unit_size: 0,
            ..valid.clone()
        };
        assert!(matches!(
            zero_unit.validate(),
            Err(ConfigError::InvalidUnitSize { value: 0 })
        ));

        let zero_workers = PipelineConfig {
            workers: 0,
            ..valid.clone()
        };
        assert!(matches!(
            zero_workers.validate(),
            Err(ConfigError::InvalidWorkerCount { value: 0 })
        ));

        let nan = PipelineConfig {
            threshold: f64::NAN,
            ..valid.clone()
        };
        assert!(matches!(
            nan.validate(),
            Err(ConfigError::InvalidThreshold { .. })
        ));

        let negative = PipelineConfig {
            threshold: -1.0,
            ..valid
        };
        assert!(negative.validate().is_ok());
    }

    #[test]
    fn invalid_configuration_aborts_before_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out");

        let result = Pipeline::builder()
            .input(dir.path().join("absent.png"))
            .output(&output)
            .build()
            .run();

        assert!(matches!(result, Err(TileDiffError::Config(_))));
        assert!(!output.exists());
    }

    #[test]
    fn decode_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("corrupt.png");
        std::fs::write(&input, b"this is not a valid image file").unwrap();

        let result = Pipeline::builder()
            .input(&input)
            .output(dir.path().join("out"))
            .build()
            .run();

        assert!(matches!(result, Err(TileDiffError::Load(_))));
    }

    #[test]
    fn single_unit_is_nothing_to_compare() {
        let dir = TempDir::new().unwrap();
        let input = write_png(&dir, "small.png", &RgbImage::new(8, 8));

        let result = Pipeline::builder()
            .input(&input)
            .output(dir.path().join("out"))
            .unit_size(16)
            .build()
            .run()
            .unwrap();

        assert_eq!(result.outcome, RunOutcome::NothingToCompare);
        assert_eq!(result.units, 1);
        assert_eq!(result.total_pairs, 0);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn injected_loader_and_events() {
        let dir = TempDir::new().unwrap();
        let input = write_png(&dir, "placeholder.png", &RgbImage::new(1, 1));
        let image = RgbImage::from_fn(8, 4, |x, _| {
            if x < 4 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let (sender, receiver) = EventChannel::new();

        let result = Pipeline::builder()
            .input(&input)
            .output(dir.path().join("out"))
            .unit_size(4)
            .workers(2)
            .loader(Box::new(StaticLoader(image)))
            .build()
            .run_with_events(&sender)
            .unwrap();
        drop(sender);

        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.units, 2);
        assert_eq!(result.flagged, 1);
        assert_eq!(result.persisted, 1);
        assert!(dir
            .path()
            .join("out/unit_0_0_vs_unit_1_0/unit_1_0.png")
            .exists());

        let events: Vec<_> = receiver.iter().collect();
        assert!(matches!(events[0], Event::Pipeline(PipelineEvent::Started)));
        assert!(matches!(
            events.last(),
            Some(Event::Pipeline(PipelineEvent::Completed { .. }))
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Tile(TileEvent::Completed { units: 2, .. }))));
    }

    #[test]
    fn many_units_with_nothing_flagged() {
        let dir = TempDir::new().unwrap();
        let input = write_png(&dir, "blank.png", &RgbImage::from_pixel(64, 64, Rgb([250, 250, 250])));

        let result = Pipeline::builder()
            .input(&input)
            .output(dir.path().join("out"))
            .unit_size(2)
            .workers(4)
            .build()
            .run()
            .unwrap();

        assert_eq!(result.units, 1024);
        assert_eq!(result.pairs_compared, pair_count(1024));
        assert_eq!(result.flagged, 0);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn cancelled_before_start_compares_nothing() {
        let dir = TempDir::new().unwrap();
        let input = write_png(&dir, "in.png", &RgbImage::new(16, 16));
        let token = CancellationToken::new();
        token.cancel();

        let result = Pipeline::builder()
            .input(&input)
            .output(dir.path().join("out"))
            .unit_size(4)
            .cancellation(token)
            .build()
            .run()
            .unwrap();

        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert_eq!(result.pairs_compared, 0);
        assert_eq!(result.total_pairs, 120);
    }

    #[test]
    fn cancellation_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
