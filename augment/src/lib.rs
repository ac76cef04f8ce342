//! Bounding-box aware data augmentation for object detection.
//!
//! A [Pipeline](pipeline::Pipeline) runs in two stages. The geometric stage
//! works on `u8` RGB images jointly with boxes and labels. The tensor stage
//! converts the image to a `[C, H, W]` float tensor and applies tensor-domain
//! transforms, recording normalization statistics in [ImageMeta](meta::ImageMeta).

mod common;
pub mod config;
pub mod error;
pub mod geometric;
pub mod meta;
pub mod pipeline;
pub mod registry;
pub mod tensor;

pub use bbox::BoxFormat;
pub use config::*;
pub use error::*;
pub use meta::*;
pub use pipeline::*;
