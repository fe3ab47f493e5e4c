//! # Tiler Module
//!
//! Splits the decoded source image into a grid of units.
//!
//! ## Ownership
//! The [`SourceImage`] is decoded once and never mutated. Every [`Unit`]
//! carries a [`TileView`]: an offset and extent borrowed from that image,
//! never a copy of its pixels. Units are therefore cheap `Copy` values that
//! can be handed to any number of worker threads while the image outlives
//! them.
//!
//! ## Boundary units
//! Units along the right and bottom edges of an image whose size is not a
//! multiple of the unit size are clipped to the remaining pixels. They are
//! never padded.

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// 16-bit-per-channel RGB buffer
pub type Rgb16Image = ImageBuffer<Rgb<u16>, Vec<u16>>;

/// Channel depth of the image as it was decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceDepth {
    Eight,
    Sixteen,
}

/// Samples of the decoded image, kept at their decoded depth
#[derive(Debug, Clone)]
enum Pixels {
    Eight(RgbImage),
    Sixteen(Rgb16Image),
}

/// The decoded, read-only image every unit views into.
///
/// Alpha is discarded. 8-bit inputs stay 8-bit; anything deeper is held as
/// 16-bit RGB.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: Pixels,
    width: u32,
    height: u32,
}

impl SourceImage {
    /// Take ownership of a decoded image.
    ///
    /// An 8-bit RGB image is moved in without copying.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let color = image.color();
        let bytes_per_channel = color.bytes_per_pixel() / color.channel_count().max(1);

        let pixels = if bytes_per_channel <= 1 {
            Pixels::Eight(image.into_rgb8())
        } else {
            Pixels::Sixteen(image.into_rgb16())
        };

        Self {
            pixels,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> SourceDepth {
        match self.pixels {
            Pixels::Eight(_) => SourceDepth::Eight,
            Pixels::Sixteen(_) => SourceDepth::Sixteen,
        }
    }

    /// A view of the rectangle at `(x, y)`, clipped to the image bounds
    pub fn view(&self, x: u32, y: u32, width: u32, height: u32) -> TileView<'_> {
        let x = x.min(self.width);
        let y = y.min(self.height);
        TileView {
            source: self,
            x,
            y,
            width: width.min(self.width - x),
            height: height.min(self.height - y),
        }
    }
}

/// One row of a [`TileView`] as interleaved `[r, g, b, r, g, b, ...]` samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row<'a> {
    Eight(&'a [u8]),
    Sixteen(&'a [u16]),
}

/// A read-only window onto a [`SourceImage`]
#[derive(Clone, Copy)]
pub struct TileView<'a> {
    source: &'a SourceImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for TileView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileView")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl<'a> TileView<'a> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel offset of the view's top-left corner in the source image
    pub fn offset(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn source(&self) -> &'a SourceImage {
        self.source
    }

    /// One row of the view at the source's depth
    ///
    /// # Panics
    /// If `y` is outside the view.
    pub fn row(&self, y: u32) -> Row<'a> {
        assert!(y < self.height, "row {} outside view of height {}", y, self.height);
        let source: &'a SourceImage = self.source;
        let stride = source.width as usize * 3;
        let start = (self.y + y) as usize * stride + self.x as usize * 3;
        let end = start + self.width as usize * 3;

        match &source.pixels {
            Pixels::Eight(buffer) => Row::Eight(&buffer.as_raw()[start..end]),
            Pixels::Sixteen(buffer) => Row::Sixteen(&buffer.as_raw()[start..end]),
        }
    }

    /// The pixel at `(x, y)` relative to the view, widened to 16 bits
    pub fn pixel(&self, x: u32, y: u32) -> [u16; 3] {
        match &self.source.pixels {
            Pixels::Eight(buffer) => {
                let [r, g, b] = buffer.get_pixel(self.x + x, self.y + y).0;
                [r as u16 * 257, g as u16 * 257, b as u16 * 257]
            }
            Pixels::Sixteen(buffer) => buffer.get_pixel(self.x + x, self.y + y).0,
        }
    }

    /// Copy the view out at 16-bit precision
    pub fn to_rgb16(&self) -> Rgb16Image {
        Rgb16Image::from_fn(self.width, self.height, |x, y| Rgb(self.pixel(x, y)))
    }

    /// Copy the view out at 8-bit precision, truncating 16-bit sources
    pub fn to_rgb8(&self) -> RgbImage {
        match &self.source.pixels {
            Pixels::Eight(buffer) => RgbImage::from_fn(self.width, self.height, |x, y| {
                *buffer.get_pixel(self.x + x, self.y + y)
            }),
            Pixels::Sixteen(buffer) => RgbImage::from_fn(self.width, self.height, |x, y| {
                let [r, g, b] = buffer.get_pixel(self.x + x, self.y + y).0;
                Rgb([(r / 257) as u8, (g / 257) as u8, (b / 257) as u8])
            }),
        }
    }
}

/// Position of a unit in the grid: pixel offset divided by the unit size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridId {
    pub x: u32,
    pub y: u32,
}

impl std::fmt::Display for GridId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One grid cell of the source image
#[derive(Debug, Clone, Copy)]
pub struct Unit<'a> {
    /// Position in row-major generation order
    pub index: usize,
    /// Grid coordinate
    pub id: GridId,
    /// Pixels covered by this unit
    pub view: TileView<'a>,
}

/// Partitions images into fixed-size units
#[derive(Debug, Clone, Copy)]
pub struct Tiler {
    unit_size: u32,
}

impl Tiler {
    pub fn new(unit_size: u32) -> Self {
        Self { unit_size }
    }

    /// Number of columns and rows the grid will have
    pub fn grid_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.unit_size == 0 {
            return (0, 0);
        }
        (width.div_ceil(self.unit_size), height.div_ceil(self.unit_size))
    }

    /// Split `image` into units, row-major (increasing y, then x).
    ///
    /// A zero unit size yields no units.
    pub fn tile<'a>(&self, image: &'a SourceImage) -> Vec<Unit<'a>> {
        if self.unit_size == 0 {
            return Vec::new();
        }

        let (columns, rows) = self.grid_dimensions(image.width(), image.height());
        let mut units = Vec::with_capacity(columns as usize * rows as usize);
        let step = self.unit_size as usize;

        for y in (0..image.height()).step_by(step) {
            for x in (0..image.width()).step_by(step) {
                let view = image.view(x, y, self.unit_size, self.unit_size);
                if view.is_empty() {
                    continue;
                }

                units.push(Unit {
                    index: units.len(),
                    id: GridId {
                        x: x / self.unit_size,
                        y: y / self.unit_size,
                    },
                    view,
                });
            }
        }

        units
    }
}
