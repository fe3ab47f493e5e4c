//! # Sink Module
//!
//! Persists flagged pairs.
//!
//! ## Layout
//! ```text
//! <output>/
//!   unit_0_0_vs_unit_1_0/
//!     unit_0_0.png
//!     unit_1_0.png
//! ```
//!
//! A pair that cannot be written is logged, reported and skipped; the sink
//! keeps draining. Directory names are deterministic, so a repeated pair
//! overwrites the earlier files.

use crate::core::pool::DiffResult;
use crate::core::tiler::{GridId, SourceDepth, TileView};
use crate::error::PersistError;
use crate::events::{Event, EventSender, PersistEvent};
use crossbeam_channel::Receiver;
use image::ImageFormat;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Writes a tile to disk in some lossless format
pub trait TileEncoder: Send + Sync {
    /// File extension without the dot
    fn extension(&self) -> &'static str;

    /// Encode `view` to `path`, replacing any existing file
    fn encode(&self, view: &TileView<'_>, path: &Path) -> Result<(), PersistError>;
}

/// PNG encoder that keeps the source's channel depth
#[derive(Debug, Clone, Copy, Default)]
pub struct PngTileEncoder;

impl TileEncoder for PngTileEncoder {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn encode(&self, view: &TileView<'_>, path: &Path) -> Result<(), PersistError> {
        let written = match view.source().depth() {
            SourceDepth::Eight => view.to_rgb8().save_with_format(path, ImageFormat::Png),
            SourceDepth::Sixteen => view.to_rgb16().save_with_format(path, ImageFormat::Png),
        };

        written.map_err(|e| PersistError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Directory name for a flagged pair
pub fn pair_directory_name(a: GridId, b: GridId) -> String {
    format!("unit_{}_{}_vs_unit_{}_{}", a.x, a.y, b.x, b.y)
}

/// File name for one unit of a pair
pub fn unit_file_name(id: GridId, extension: &str) -> String {
    format!("unit_{}_{}.{}", id.x, id.y, extension)
}

/// What the sink managed to write
#[derive(Debug, Clone, Default)]
pub struct SinkReport {
    /// Pairs written completely
    pub saved: usize,
    /// One message per skipped pair
    pub errors: Vec<String>,
}

/// Drains the result queue to disk
pub struct ResultSink<'s> {
    root: &'s Path,
    encoder: &'s dyn TileEncoder,
}

impl<'s> ResultSink<'s> {
    pub fn new(root: &'s Path, encoder: &'s dyn TileEncoder) -> Self {
        Self { root, encoder }
    }

    /// Persist results until the queue is closed.
    pub fn persist(&self, results: Receiver<DiffResult<'_>>, events: &EventSender) -> SinkReport {
        let mut report = SinkReport::default();

        for result in results.iter() {
            let directory = self
                .root
                .join(pair_directory_name(result.pair.a.id, result.pair.b.id));

            match self.persist_pair(&result, &directory) {
                Ok(()) => {
                    debug!(
                        directory = %directory.display(),
                        distance = result.distance,
                        "saved differing pair"
                    );
                    report.saved += 1;
                    events.send(Event::Persist(PersistEvent::Saved { directory }));
                }
                Err(e) => {
                    warn!(directory = %directory.display(), error = %e, "skipping pair");
                    report.errors.push(e.to_string());
                    events.send(Event::Persist(PersistEvent::Failed {
                        directory,
                        message: e.to_string(),
                    }));
                }
            }
        }

        report
    }

    fn persist_pair(&self, result: &DiffResult<'_>, directory: &Path) -> Result<(), PersistError> {
        fs::create_dir_all(directory).map_err(|e| PersistError::CreateDirectory {
            path: directory.to_path_buf(),
            source: e,
        })?;

        for unit in [result.pair.a, result.pair.b] {
            let path = directory.join(unit_file_name(unit.id, self.encoder.extension()));
            self.encoder.encode(&unit.view, &path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pairs::UnitPair;
    use crate::core::tiler::{SourceImage, Tiler, Unit};
    use crate::events::{null_sender, EventChannel};
    use crossbeam_channel::unbounded;
    use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
    use tempfile::TempDir;

    /// Fails for any file belonging to the given pair directory
    struct FailingEncoder(&'static str);

    impl TileEncoder for FailingEncoder {
        fn extension(&self) -> &'static str {
            "png"
        }

        fn encode(&self, view: &TileView<'_>, path: &Path) -> Result<(), PersistError> {
            if path.to_string_lossy().contains(self.0) {
                return Err(PersistError::Encode {
                    path: path.to_path_buf(),
                    reason: "disk full".to_string(),
                });
            }
            PngTileEncoder.encode(view, path)
        }
    }

    fn source() -> SourceImage {
        let image = RgbImage::from_fn(6, 4, |x, y| Rgb([x as u8 * 40, y as u8 * 60, 5]));
        SourceImage::from_dynamic(DynamicImage::ImageRgb8(image))
    }

    fn results<'a>(units: &[Unit<'a>], pairs: &[(usize, usize)]) -> Receiver<DiffResult<'a>> {
        let (tx, rx) = unbounded();
        for &(a, b) in pairs {
            tx.send(DiffResult {
                pair: UnitPair {
                    a: units[a],
                    b: units[b],
                },
                distance: 10.0,
            })
            .unwrap();
        }
        rx
    }

    #[test]
    fn names_encode_both_grid_coordinates() {
        let a = GridId { x: 0, y: 1 };
        let b = GridId { x: 2, y: 1 };
        assert_eq!(pair_directory_name(a, b), "unit_0_1_vs_unit_2_1");
        assert_eq!(unit_file_name(b, "png"), "unit_2_1.png");
    }

    #[test]
    fn writes_both_units_of_a_pair() {
        let dir = TempDir::new().unwrap();
        let tiles = source();
        let units = Tiler::new(4).tile(&tiles);

        let report = ResultSink::new(dir.path(), &PngTileEncoder)
            .persist(results(&units, &[(0, 1)]), &null_sender());

        assert_eq!(report.saved, 1);
        assert!(report.errors.is_empty());

        let pair_dir = dir.path().join("unit_0_0_vs_unit_1_0");
        let a = image::open(pair_dir.join("unit_0_0.png")).unwrap().to_rgb8();
        let b = image::open(pair_dir.join("unit_1_0.png")).unwrap().to_rgb8();

        assert_eq!(a.dimensions(), (4, 4));
        assert_eq!(b.dimensions(), (2, 4));
        assert_eq!(b.get_pixel(1, 3), &Rgb([200, 180, 5]));
        assert_eq!(fs::read_dir(&pair_dir).unwrap().count(), 2);
    }

    #[test]
    fn sixteen_bit_sources_stay_sixteen_bit() {
        let dir = TempDir::new().unwrap();
        let buffer: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(4, 2, Rgb([1, 60000, 300]));
        let tiles = SourceImage::from_dynamic(DynamicImage::ImageRgb16(buffer));
        let units = Tiler::new(2).tile(&tiles);

        ResultSink::new(dir.path(), &PngTileEncoder)
            .persist(results(&units, &[(0, 1)]), &null_sender());

        let decoded = image::open(dir.path().join("unit_0_0_vs_unit_1_0/unit_1_0.png")).unwrap();
        assert_eq!(decoded.to_rgb16().get_pixel(0, 0), &Rgb([1, 60000, 300]));
    }

    #[test]
    fn failed_pair_is_skipped_and_sink_continues() {
        let dir = TempDir::new().unwrap();
        let tiles = source();
        let units = Tiler::new(2).tile(&tiles);
        let (sender, receiver) = EventChannel::new();

        let report = ResultSink::new(dir.path(), &FailingEncoder("unit_0_0_vs_unit_1_0"))
            .persist(results(&units, &[(0, 1), (0, 2)]), &sender);
        drop(sender);

        assert_eq!(report.saved, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("disk full"));
        assert!(dir.path().join("unit_0_0_vs_unit_2_0/unit_2_0.png").exists());

        let failures = receiver
            .iter()
            .filter(|e| matches!(e, Event::Persist(PersistEvent::Failed { .. })))
            .count();
        assert_eq!(failures, 1);
    }

    #[test]
    fn unusable_root_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("not-a-directory");
        fs::write(&root, b"occupied").unwrap();
        let tiles = source();
        let units = Tiler::new(2).tile(&tiles);

        let report = ResultSink::new(&root, &PngTileEncoder)
            .persist(results(&units, &[(0, 1), (1, 2)]), &null_sender());

        assert_eq!(report.saved, 0);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn repeated_pair_overwrites_quietly() {
        let dir = TempDir::new().unwrap();
        let tiles = source();
        let units = Tiler::new(4).tile(&tiles);

        let report = ResultSink::new(dir.path(), &PngTileEncoder)
            .persist(results(&units, &[(0, 1), (0, 1)]), &null_sender());

        assert_eq!(report.saved, 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
