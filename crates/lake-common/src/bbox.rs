//! Grid-index bounding boxes.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// An axis-aligned window of grid indices.
///
/// Lower bounds are inclusive and upper bounds are exclusive, so a region
/// occupying rows 2..=4 has `row_min = 2` and `row_max = 5`. Slicing a raster
/// with `row_min..row_max` therefore yields exactly the region's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl BoundingBox {
    /// Create a new box from index bounds (upper bounds exclusive).
    pub fn new(row_min: usize, row_max: usize, col_min: usize, col_max: usize) -> Self {
        Self {
            row_min,
            row_max,
            col_min,
            col_max,
        }
    }

    /// Tightest box around the `true` cells of a row-major mask.
    ///
    /// Returns `None` when no cell is set.
    pub fn from_mask(mask: &[bool], cols: usize) -> Option<Self> {
        if cols == 0 {
            return None;
        }

        let mut bbox: Option<Self> = None;
        for (idx, _) in mask.iter().enumerate().filter(|(_, &member)| member) {
            let (row, col) = (idx / cols, idx % cols);
            bbox = Some(match bbox {
                None => Self::new(row, row + 1, col, col + 1),
                Some(b) => Self {
                    row_min: b.row_min.min(row),
                    row_max: b.row_max.max(row + 1),
                    col_min: b.col_min.min(col),
                    col_max: b.col_max.max(col + 1),
                },
            });
        }
        bbox
    }

    /// Number of rows covered.
    pub fn height(&self) -> usize {
        self.row_max - self.row_min
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        self.col_max - self.col_min
    }

    /// Number of cells covered.
    pub fn cell_count(&self) -> usize {
        self.height() * self.width()
    }

    pub fn rows(&self) -> Range<usize> {
        self.row_min..self.row_max
    }

    pub fn cols(&self) -> Range<usize> {
        self.col_min..self.col_max
    }

    /// Check if a grid cell lies within this box.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows().contains(&row) && self.cols().contains(&col)
    }

    /// Check if this box fits inside a grid of the given shape.
    pub fn fits_within(&self, rows: usize, cols: usize) -> bool {
        self.row_max <= rows && self.col_max <= cols
    }

    /// The same extent anchored at the grid origin.
    ///
    /// Used for rasters that were already subset to this box upstream.
    pub fn at_origin(&self) -> Self {
        Self::new(0, self.height(), 0, self.width())
    }

    /// Row range in OPeNDAP hyperslab syntax (`[start:stride:stop]`, stop inclusive).
    pub fn row_constraint(&self) -> String {
        format!("[{}:1:{}]", self.row_min, self.row_max - 1)
    }

    /// Column range in OPeNDAP hyperslab syntax (`[start:stride:stop]`, stop inclusive).
    pub fn col_constraint(&self) -> String {
        format!("[{}:1:{}]", self.col_min, self.col_max - 1)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows {}..{}, cols {}..{}",
            self.row_min, self.row_max, self.col_min, self.col_max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mask_rectangle() {
        // 10x10 grid, block at rows 2-4, cols 5-7
        let mut mask = vec![false; 100];
        for row in 2..=4 {
            for col in 5..=7 {
                mask[row * 10 + col] = true;
            }
        }

        let bbox = BoundingBox::from_mask(&mask, 10).unwrap();
        assert_eq!(bbox, BoundingBox::new(2, 5, 5, 8));
        assert_eq!(bbox.height(), 3);
        assert_eq!(bbox.width(), 3);
    }

    #[test]
    fn test_from_mask_empty() {
        assert!(BoundingBox::from_mask(&[false; 16], 4).is_none());
        assert!(BoundingBox::from_mask(&[], 4).is_none());
        assert!(BoundingBox::from_mask(&[true], 0).is_none());
    }

    #[test]
    fn test_opendap_constraints_are_inclusive() {
        let bbox = BoundingBox::new(2, 5, 5, 8);
        assert_eq!(bbox.row_constraint(), "[2:1:4]");
        assert_eq!(bbox.col_constraint(), "[5:1:7]");
    }
}
