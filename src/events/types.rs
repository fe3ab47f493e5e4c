//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the tile comparison pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Tiling phase events
    Tile(TileEvent),
    /// Comparison phase events
    Compare(CompareEvent),
    /// Result persistence events
    Persist(PersistEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during the tiling phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TileEvent {
    /// The source image was split into units
    Completed {
        units: usize,
        columns: u32,
        rows: u32,
        unit_size: u32,
    },
}

/// Events during the comparison phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompareEvent {
    /// Workers are starting on the pair queue
    Started { total_pairs: usize, workers: usize },
    /// A worker finished `compared` more pairs since its last report
    Progress { compared: usize },
    /// A pair exceeded the threshold
    Flagged {
        unit_a: (u32, u32),
        unit_b: (u32, u32),
        distance: f64,
    },
    /// Every worker has returned
    Completed {
        compared: usize,
        flagged: usize,
        duration_ms: u64,
    },
}

/// Events from the result sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PersistEvent {
    /// Both units of a pair were written
    Saved { directory: PathBuf },
    /// A pair could not be written and was skipped
    Failed { directory: PathBuf, message: String },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed successfully
    Completed { summary: PipelineSummary },
    /// Pipeline was cancelled
    Cancelled,
    /// Pipeline encountered a fatal error
    Error { message: String },
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Loading,
    Tiling,
    Comparing,
}

/// Summary of pipeline results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Units the image was divided into
    pub units: usize,
    /// Pairs compared
    pub pairs_compared: usize,
    /// Pairs above the threshold
    pub flagged: usize,
    /// Pairs written to disk
    pub persisted: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Loading => write!(f, "Loading"),
            PipelinePhase::Tiling => write!(f, "Tiling"),
            PipelinePhase::Comparing => write!(f, "Comparing"),
        }
    }
}
