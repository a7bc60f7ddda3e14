//! Shared test utilities for the lake extraction workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic mask and daily datasets for the in-memory raster backend
//! - A temporary archive directory laid out like the real data root
//! - Common fixtures (region tables, abbreviation tables, scenario grids)
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, mask_dataset, TestArchive};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that every cell of a plane is either `fill` (outside the region) or
/// matches `expected` (inside it).
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_masked_plane;
///
/// assert_masked_plane!(&values, &membership, -999.0, |idx| source[idx]);
/// ```
#[macro_export]
macro_rules! assert_masked_plane {
    ($values:expr, $membership:expr, $fill:expr, $expected:expr) => {{
        let values: &[f64] = $values;
        let membership: &[bool] = $membership;
        assert_eq!(values.len(), membership.len(), "plane size mismatch");
        let expected = $expected;
        for (idx, (&value, &member)) in values.iter().zip(membership).enumerate() {
            if member {
                $crate::assert_approx_eq!(value, expected(idx), 1e-6);
            } else {
                assert_eq!(value, $fill, "cell {} outside the region is not fill", idx);
            }
        }
    }};
}
