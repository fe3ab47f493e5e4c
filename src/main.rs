//! # tile-diff CLI
//!
//! Command-line interface for the tile comparison pipeline.
//!
//! ## Usage
//! ```bash
//! tile-diff -i scan.png -s 256 -t 2.5
//! tile-diff -i scan.png --report json
//! ```

mod cli;

use console::style;
use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
