//! Dataset loading and batching.

pub mod coco;
mod dataset;
mod loader;

pub use dataset::*;
pub use loader::*;
