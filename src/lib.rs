//! # tile-diff
//!
//! Finds the regions of an image that look different from the rest.
//!
//! The image is cut into a grid of square units, every unordered pair of
//! units is scored by mean CIEDE2000 color difference, and pairs above a
//! threshold are written out side by side for inspection.
//!
//! ## Architecture
//! - `core` - The comparison engine
//! - `events` - Event-driven progress reporting
//! - `error` - Error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::core::pipeline::{Pipeline, PipelineConfig, PipelineResult, RunOutcome};
pub use error::{Result, TileDiffError};

/// Initialize tracing for the application
///
/// Logs go to stderr. `RUST_LOG` takes precedence; otherwise `verbose`
/// selects `debug` over `info`. Calling this twice is harmless.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
