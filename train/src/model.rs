//! The model interface driven by the trainer.

use crate::{
    common::*,
    config::{ModelConfig, PredictorConfig},
};

/// The key of the total loss that is back-propagated.
pub const TOTAL_LOSS_KEY: &str = "loss";

/// Named scalar losses of one batch.
///
/// The map must contain [TOTAL_LOSS_KEY]. Other entries are logged only.
pub type Losses = IndexMap<String, Tensor>;

/// A predicted box in the pixel space of the network input.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the image within the batch.
    pub batch_index: usize,
    /// The contiguous class index.
    pub class: i64,
    /// `[x, y, w, h]` of the box.
    pub bbox: [f64; 4],
    pub score: f64,
}

/// A trainable detector.
///
/// Boxes handed to [loss](DetectionModel::loss) are in the run's box format
/// and in pixels of the augmented image.
pub trait DetectionModel
where
    Self: Sized,
{
    type Output;

    /// Create the model with its variables under `path`.
    fn build<'a>(path: impl Borrow<nn::Path<'a>>, config: &ModelConfig) -> Result<Self>;

    fn forward_t(&self, images: &Tensor, train: bool) -> Result<Self::Output>;

    fn loss(
        &self,
        output: &Self::Output,
        boxes: &[Vec<[f64; 4]>],
        labels: &[Vec<i64>],
    ) -> Result<Losses>;

    /// Decode the output into scored boxes above the confidence threshold
    /// after non-maximum suppression.
    fn detect(
        &self,
        output: &Self::Output,
        metas: &[ImageMeta],
        predictor: &PredictorConfig,
    ) -> Result<Vec<Prediction>>;
}

/// Read the scalar values of named losses.
pub fn loss_values(losses: &Losses) -> Result<IndexMap<String, f64>> {
    ensure!(
        losses.contains_key(TOTAL_LOSS_KEY),
        "the model must report a '{}' entry",
        TOTAL_LOSS_KEY
    );

    losses
        .iter()
        .map(|(kind, loss)| -> Result<_> {
            ensure!(
                loss.numel() == 1,
                "loss '{}' must be a scalar, but get shape {:?}",
                kind,
                loss.size()
            );
            Ok((kind.clone(), f64::from(loss)))
        })
        .try_collect()
}
