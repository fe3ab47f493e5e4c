//! # Pairs Module
//!
//! Lazily enumerates every unordered pair of units exactly once, in
//! lexicographic index order `(i, j)` with `i < j`.

use crate::core::tiler::Unit;

/// Two units to compare; `a` always precedes `b` in generation order
#[derive(Debug, Clone, Copy)]
pub struct UnitPair<'a> {
    pub a: Unit<'a>,
    pub b: Unit<'a>,
}

/// Number of unordered pairs among `units` units
pub fn pair_count(units: usize) -> usize {
    units * units.saturating_sub(1) / 2
}

/// Iterator over all unique unit pairs
#[derive(Debug, Clone)]
pub struct PairEnumerator<'u, 'a> {
    units: &'u [Unit<'a>],
    i: usize,
    j: usize,
    remaining: usize,
}

impl<'u, 'a> PairEnumerator<'u, 'a> {
    /// Fewer than two units yields an empty sequence.
    pub fn new(units: &'u [Unit<'a>]) -> Self {
        Self {
            units,
            i: 0,
            j: 1,
            remaining: pair_count(units.len()),
        }
    }
}

impl<'a> Iterator for PairEnumerator<'_, 'a> {
    type Item = UnitPair<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let pair = UnitPair {
            a: self.units[self.i],
            b: self.units[self.j],
        };

        self.j += 1;
        if self.j == self.units.len() {
            self.i += 1;
            self.j = self.i + 1;
        }
        self.remaining -= 1;

        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PairEnumerator<'_, '_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tiler::{SourceImage, Tiler};
    use image::{DynamicImage, RgbImage};
    use std::collections::HashSet;

    fn image(width: u32, height: u32) -> SourceImage {
        SourceImage::from_dynamic(DynamicImage::ImageRgb8(RgbImage::new(width, height)))
    }

    #[test]
    fn pair_count_formula() {
        assert_eq!(pair_count(0), 0);
        assert_eq!(pair_count(1), 0);
        assert_eq!(pair_count(2), 1);
        assert_eq!(pair_count(4), 6);
        assert_eq!(pair_count(100), 4950);
    }

    #[test]
    fn enumerates_in_lexicographic_order() {
        let source = image(8, 8);
        let units = Tiler::new(4).tile(&source);

        let order: Vec<_> = PairEnumerator::new(&units)
            .map(|p| (p.a.index, p.b.index))
            .collect();

        assert_eq!(order, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn every_unordered_pair_exactly_once() {
        let source = image(35, 21);
        let units = Tiler::new(5).tile(&source);
        let n = units.len();

        let pairs: Vec<_> = PairEnumerator::new(&units)
            .map(|p| (p.a.index, p.b.index))
            .collect();
        let unique: HashSet<_> = pairs.iter().copied().collect();

        assert_eq!(pairs.len(), n * (n - 1) / 2);
        assert_eq!(unique.len(), pairs.len());
        assert!(pairs.iter().all(|(a, b)| a < b));
    }

    #[test]
    fn fewer_than_two_units_is_empty() {
        let source = image(3, 3);
        let one = Tiler::new(4).tile(&source);
        assert_eq!(one.len(), 1);
        assert_eq!(PairEnumerator::new(&one).count(), 0);
        assert_eq!(PairEnumerator::new(&[]).count(), 0);
    }

    #[test]
    fn reports_exact_length() {
        let source = image(16, 4);
        let units = Tiler::new(4).tile(&source);
        let mut pairs = PairEnumerator::new(&units);

        assert_eq!(pairs.len(), 6);
        pairs.next();
        assert_eq!(pairs.len(), 5);
    }
}
