//! # Comparator Module
//!
//! Computes a perceptual distance between two equally-sized tiles.
//!
//! ## How It Works
//! 1. Reject tiles whose extents differ with [`MAX_DISTANCE`]
//! 2. Convert every pixel of both tiles to CIE L*a*b*
//! 3. Average the per-pixel CIEDE2000 ΔE₀₀
//!
//! ## Reading Distances
//! | ΔE₀₀    | Meaning                         |
//! |---------|---------------------------------|
//! | < 1     | Imperceptible                   |
//! | 1 - 2   | Visible on close inspection     |
//! | 2 - 10  | Noticeable at a glance          |
//! | > 10    | Clearly different colors        |
//!
//! Boundary tiles that were clipped to a smaller extent than their partner
//! always get [`MAX_DISTANCE`], so they are flagged under any finite
//! threshold.

pub mod color;

pub use color::{ciede2000, Lab};

use crate::core::tiler::{Row, TileView};

/// Distance reported for tiles that cannot be compared pixel for pixel
pub const MAX_DISTANCE: f64 = f64::MAX;

/// Capability to measure how different two tiles look.
///
/// Implementations must be pure: `compare(a, a) == 0` and
/// `compare(a, b) == compare(b, a)` for tiles of equal extent.
pub trait Comparator: Send + Sync {
    /// Distance in `[0, MAX_DISTANCE]`
    fn compare(&self, a: &TileView<'_>, b: &TileView<'_>) -> f64;

    /// Short name for logs and reports
    fn name(&self) -> &'static str;
}

/// Mean CIEDE2000 difference computed on the CPU
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuComparator;

impl CpuComparator {
    pub fn new() -> Self {
        Self
    }
}

impl Comparator for CpuComparator {
    fn compare(&self, a: &TileView<'_>, b: &TileView<'_>) -> f64 {
        if a.dimensions() != b.dimensions() {
            return MAX_DISTANCE;
        }

        let pixel_count = a.width() as u64 * a.height() as u64;
        if pixel_count == 0 {
            return 0.0;
        }

        let mut total = 0.0;
        for y in 0..a.height() {
            total += match (a.row(y), b.row(y)) {
                (Row::Eight(ra), Row::Eight(rb)) => row_delta(ra, rb, Lab::from_rgb8),
                (Row::Sixteen(ra), Row::Sixteen(rb)) => row_delta(ra, rb, Lab::from_rgb16),
                _ => (0..a.width())
                    .map(|x| (a.pixel(x, y), b.pixel(x, y)))
                    .filter(|(pa, pb)| pa != pb)
                    .map(|(pa, pb)| ciede2000(&Lab::from_rgb16(pa), &Lab::from_rgb16(pb)))
                    .sum(),
            };
        }

        total / pixel_count as f64
    }

    fn name(&self) -> &'static str {
        "cpu-ciede2000"
    }
}

/// Summed ΔE₀₀ over two interleaved RGB rows; identical pixels add 0
fn row_delta<T>(a: &[T], b: &[T], to_lab: fn([T; 3]) -> Lab) -> f64
where
    T: Copy + PartialEq,
{
    let mut total = 0.0;
    for (pa, pb) in a.chunks_exact(3).zip(b.chunks_exact(3)) {
        if pa == pb {
            continue;
        }
        let lab_a = to_lab([pa[0], pa[1], pa[2]]);
        let lab_b = to_lab([pb[0], pb[1], pb[2]]);
        total += ciede2000(&lab_a, &lab_b);
    }
    total
}
