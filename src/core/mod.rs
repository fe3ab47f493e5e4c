//! # Core Module
//!
//! The front-end agnostic comparison engine.
//!
//! ## Modules
//! - `loader` - Reads and decodes the input image
//! - `tiler` - Divides the image into units
//! - `pairs` - Enumerates every unordered pair of units
//! - `comparator` - Scores a pair by mean CIEDE2000 difference
//! - `pool` - Runs comparisons on a fixed set of workers
//! - `sink` - Writes flagged pairs to disk
//! - `pipeline` - Orchestrates the full workflow

pub mod comparator;
pub mod loader;
pub mod pairs;
pub mod pipeline;
pub mod pool;
pub mod sink;
pub mod tiler;

// Re-export commonly used types
pub use comparator::{Comparator, CpuComparator, MAX_DISTANCE};
pub use loader::{FileLoader, ImageLoader, InputFormat};
pub use pairs::{PairEnumerator, UnitPair};
pub use pool::{DiffResult, WorkerPool};
pub use sink::{PngTileEncoder, ResultSink, TileEncoder};
pub use tiler::{GridId, SourceImage, TileView, Tiler, Unit};
