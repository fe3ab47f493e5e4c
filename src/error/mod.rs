//! # Error Module
//!
//! Error types for the tile comparison pipeline.
//!
//! ## Taxonomy
//! - **Fatal** - configuration and load errors stop the run before any
//!   comparison starts
//! - **Recoverable** - persistence errors are reported per pair and never
//!   escape the result sink
//! - Messages always carry the offending path or value

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum TileDiffError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load image: {0}")]
    Load(#[from] LoadError),
}

/// Invalid run configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("--input/-i is required")]
    MissingInput,

    #[error("input file does not exist: {path}")]
    InputNotFound { path: PathBuf },

    #[error("--unit-size must be a positive integer (got {value})")]
    InvalidUnitSize { value: u32 },

    #[error("--cpu-cores must be a positive integer (got {value})")]
    InvalidWorkerCount { value: usize },

    #[error("--threshold must be a finite number (got {value})")]
    InvalidThreshold { value: f64 },
}

/// Errors that occur while reading or decoding the source image
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a recognised raster image")]
    UnrecognisedFormat { path: PathBuf },

    #[error("could not decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("image is empty: {path}")]
    EmptyImage { path: PathBuf },
}

/// Errors that occur while writing a flagged pair to disk.
///
/// The sink records these per pair; they never reach [`TileDiffError`].
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("could not create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, TileDiffError>;
