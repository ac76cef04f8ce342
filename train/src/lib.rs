//! The training driver of the detection augmentation pipeline.
//!
//! A [Trainer] feeds COCO-format datasets through the configured
//! [augment::Pipeline]s into any [model::DetectionModel], keeps the best
//! checkpoint, logs per-epoch scalars and periodically evaluates detections.

pub mod common;
pub mod config;
pub mod data;
pub mod evaluation;
pub mod logging;
pub mod model;
pub mod trainer;
pub mod utils;

pub use trainer::*;
