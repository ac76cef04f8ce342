//! Safe bounding box types and functions.

mod common;

pub use rect::*;
pub mod rect;

pub use tlbr::*;
pub mod tlbr;

pub use size::*;
pub mod size;

pub use transform::*;
mod transform;

pub use format::*;
pub mod format;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
