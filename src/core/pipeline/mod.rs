//! # Pipeline Module
//!
//! Orchestrates a full comparison run.
//!
//! ## Pipeline Stages
//! 1. **Load** - Decode the input into a single pixel arena
//! 2. **Tile** - Divide it into grid-aligned units
//! 3. **Compare** - Score every unordered pair on the worker pool
//! 4. **Persist** - Write flagged pairs while comparison is still running
//!
//! ## Parallelism
//! Workers and the sink run as scoped threads borrowing the arena, so no
//! pixel data is copied until a flagged tile is encoded.

mod executor;

pub use executor::{
    default_workers, CancellationToken, Pipeline, PipelineBuilder, PipelineConfig,
    PipelineResult, RunOutcome,
};
