//! Region membership masks cropped to a bounding box.

use crate::bbox::BoundingBox;
use crate::error::{CommonError, CommonResult};

/// Byte value marking a member cell in the derived mask layer.
pub const MASK_MEMBER: u8 = 1;

/// Byte value marking a non-member cell (the unsigned-byte fill sentinel).
pub const MASK_FILL: u8 = 255;

/// Membership flags for the cells of a bounding box, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedMask {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl CroppedMask {
    /// Slice a full-extent row-major mask to `bbox`.
    pub fn crop(full: &[bool], full_cols: usize, bbox: &BoundingBox) -> Self {
        let mut cells = Vec::with_capacity(bbox.cell_count());
        for row in bbox.rows() {
            let offset = row * full_cols;
            cells.extend_from_slice(&full[offset + bbox.col_min..offset + bbox.col_max]);
        }
        Self {
            rows: bbox.height(),
            cols: bbox.width(),
            cells,
        }
    }

    pub fn from_cells(rows: usize, cols: usize, cells: Vec<bool>) -> CommonResult<Self> {
        if cells.len() != rows * cols {
            return Err(CommonError::shape_mismatch(rows * cols, cells.len()));
        }
        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of cells, members or not.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn is_member(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols && self.cells[row * self.cols + col]
    }

    /// Number of member cells.
    pub fn member_count(&self) -> usize {
        self.cells.iter().filter(|&&member| member).count()
    }

    /// Overwrite every non-member cell of a single slice with `fill`.
    pub fn apply(&self, values: &mut [f64], fill: f64) -> CommonResult<()> {
        if values.len() != self.cells.len() {
            return Err(CommonError::shape_mismatch(self.cells.len(), values.len()));
        }
        for (value, &member) in values.iter_mut().zip(&self.cells) {
            if !member {
                *value = fill;
            }
        }
        Ok(())
    }

    /// The mask as a byte layer: members 1, everything else 255.
    pub fn to_layer(&self) -> Vec<u8> {
        self.cells
            .iter()
            .map(|&member| if member { MASK_MEMBER } else { MASK_FILL })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal_mask() -> Vec<bool> {
        // 4x4 with members on the diagonal
        (0..16).map(|i| i / 4 == i % 4).collect()
    }

    #[test]
    fn test_crop() {
        let full = diagonal_mask();
        let bbox = BoundingBox::new(1, 3, 1, 3);
        let mask = CroppedMask::crop(&full, 4, &bbox);

        assert_eq!(mask.rows(), 2);
        assert_eq!(mask.cols(), 2);
        assert_eq!(mask.cells(), &[true, false, false, true]);
        assert_eq!(mask.member_count(), 2);
        assert!(mask.is_member(1, 1));
        assert!(!mask.is_member(0, 1));
        assert!(!mask.is_member(5, 0));
    }

    #[test]
    fn test_apply_fills_non_members() {
        let mask = CroppedMask::from_cells(1, 3, vec![true, false, true]).unwrap();
        let mut values = vec![1.0, 2.0, 3.0];
        mask.apply(&mut values, -999.0).unwrap();
        assert_eq!(values, vec![1.0, -999.0, 3.0]);
    }

    #[test]
    fn test_apply_rejects_wrong_length() {
        let mask = CroppedMask::from_cells(1, 2, vec![true, false]).unwrap();
        let mut values = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            mask.apply(&mut values, 0.0),
            Err(CommonError::ShapeMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_to_layer() {
        let mask = CroppedMask::from_cells(2, 1, vec![false, true]).unwrap();
        assert_eq!(mask.to_layer(), vec![MASK_FILL, MASK_MEMBER]);
    }
}
