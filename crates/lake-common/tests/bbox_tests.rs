//! Tests for bounding-box derivation from membership masks.

use lake_common::{BoundingBox, CroppedMask};

/// Brute-force check that `bbox` is the minimal box around the set cells.
fn assert_minimal(mask: &[bool], rows: usize, cols: usize, bbox: &BoundingBox) {
    let members: Vec<(usize, usize)> = (0..rows * cols)
        .filter(|&i| mask[i])
        .map(|i| (i / cols, i % cols))
        .collect();

    // Every member is inside the box
    for &(row, col) in &members {
        assert!(bbox.contains(row, col), "member ({row},{col}) outside {bbox}");
    }

    // Every edge of the box touches at least one member
    assert!(members.iter().any(|&(r, _)| r == bbox.row_min));
    assert!(members.iter().any(|&(r, _)| r == bbox.row_max - 1));
    assert!(members.iter().any(|&(_, c)| c == bbox.col_min));
    assert!(members.iter().any(|&(_, c)| c == bbox.col_max - 1));
}

// ============================================================================
// Shape tests
// ============================================================================

#[test]
fn test_single_cell() {
    for row in 0..5 {
        for col in 0..7 {
            let mut mask = vec![false; 35];
            mask[row * 7 + col] = true;
            let bbox = BoundingBox::from_mask(&mask, 7).unwrap();
            assert_eq!(bbox, BoundingBox::new(row, row + 1, col, col + 1));
            assert_eq!(bbox.cell_count(), 1);
        }
    }
}

#[test]
fn test_checkerboard() {
    let (rows, cols) = (6, 9);
    let mask: Vec<bool> = (0..rows * cols).map(|i| (i / cols + i % cols) % 2 == 0).collect();
    let bbox = BoundingBox::from_mask(&mask, cols).unwrap();
    assert_eq!(bbox, BoundingBox::new(0, rows, 0, cols));
    assert_minimal(&mask, rows, cols, &bbox);
}

#[test]
fn test_l_shape() {
    // 8x8, vertical bar at col 2 rows 1..=6, horizontal bar at row 6 cols 2..=5
    let mut mask = vec![false; 64];
    for row in 1..=6 {
        mask[row * 8 + 2] = true;
    }
    for col in 2..=5 {
        mask[6 * 8 + col] = true;
    }
    let bbox = BoundingBox::from_mask(&mask, 8).unwrap();
    assert_eq!(bbox, BoundingBox::new(1, 7, 2, 6));
}

#[test]
fn test_every_3x3_mask_is_minimal() {
    for bits in 1u32..(1 << 9) {
        let mask: Vec<bool> = (0..9).map(|i| bits & (1 << i) != 0).collect();
        let bbox = BoundingBox::from_mask(&mask, 3).unwrap();
        assert_minimal(&mask, 3, 3, &bbox);
    }
}

#[test]
fn test_sparse_corners() {
    let (rows, cols) = (20, 30);
    let mut mask = vec![false; rows * cols];
    mask[3 * cols + 25] = true;
    mask[17 * cols + 4] = true;
    let bbox = BoundingBox::from_mask(&mask, cols).unwrap();
    assert_eq!(bbox, BoundingBox::new(3, 18, 4, 26));
    assert_minimal(&mask, rows, cols, &bbox);
}

// ============================================================================
// Cropping tests
// ============================================================================

#[test]
fn test_crop_keeps_all_members() {
    let (rows, cols) = (10, 10);
    let mask: Vec<bool> = (0..rows * cols)
        .map(|i| {
            let (r, c) = (i / cols, i % cols);
            (2..=6).contains(&r) && (3..=4).contains(&c) && (r + c) % 3 != 0
        })
        .collect();
    let bbox = BoundingBox::from_mask(&mask, cols).unwrap();
    let cropped = CroppedMask::crop(&mask, cols, &bbox);

    assert_eq!(cropped.rows(), bbox.height());
    assert_eq!(cropped.cols(), bbox.width());
    assert_eq!(
        cropped.member_count(),
        mask.iter().filter(|&&m| m).count()
    );
    for row in 0..cropped.rows() {
        for col in 0..cropped.cols() {
            assert_eq!(
                cropped.is_member(row, col),
                mask[(row + bbox.row_min) * cols + col + bbox.col_min]
            );
        }
    }
}

#[test]
fn test_at_origin() {
    let bbox = BoundingBox::new(120, 130, 400, 415);
    let origin = bbox.at_origin();
    assert_eq!(origin, BoundingBox::new(0, 10, 0, 15));
    assert_eq!(origin.cell_count(), bbox.cell_count());
    assert!(bbox.fits_within(130, 415));
    assert!(!bbox.fits_within(129, 415));
}
