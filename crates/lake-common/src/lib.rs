//! Common types shared across the lake extraction workspace.

pub mod bbox;
pub mod error;
pub mod mask;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{CommonError, CommonResult};
pub use mask::CroppedMask;
pub use time::DateRange;
