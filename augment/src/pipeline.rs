//! The two-stage augmentation pipeline.

use crate::{
    common::*,
    config::PipelineConfig,
    error::ConfigError,
    geometric::GeometricCompose,
    meta::ImageMeta,
    registry,
    tensor::TensorCompose,
};

/// A sample entering the pipeline.
///
/// `boxes` are in the pipeline's [BoxFormat] and absolute pixel units, with
/// one entry in `labels` per box.
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: RgbImage,
    pub meta: ImageMeta,
    pub boxes: Vec<[f64; 4]>,
    pub labels: Vec<i64>,
}

/// A sample leaving the pipeline with its image as a `[C, H, W]` float tensor.
#[derive(Debug)]
pub struct TensorSample {
    pub image: Tensor,
    pub meta: ImageMeta,
    pub boxes: Vec<[f64; 4]>,
    pub labels: Vec<i64>,
}

/// An immutable chain of geometric steps followed by tensor steps.
///
/// The pipeline holds no per-call state. Randomness comes from the generator
/// passed to [forward](Pipeline::forward), so a seeded generator gives
/// reproducible output.
#[derive(Debug)]
pub struct Pipeline {
    geometric: GeometricCompose,
    tensor: TensorCompose,
}

impl Pipeline {
    /// Resolve and build every configured step.
    ///
    /// `rng` is used by steps that fix random parameters at construction.
    pub fn new(
        config: &PipelineConfig,
        format: BoxFormat,
        rng: &mut dyn RngCore,
    ) -> Result<Self, ConfigError> {
        let geometric: Vec<_> = config
            .albu
            .iter()
            .map(|step| -> Result<_, ConfigError> {
                Ok((step.name.clone(), registry::build_geometric(step)?))
            })
            .try_collect()?;
        let tensor: Vec<_> = config
            .torch
            .iter()
            .map(|step| -> Result<_, ConfigError> {
                Ok((step.name.clone(), registry::build_tensor(step, rng)?))
            })
            .try_collect()?;

        let pipeline = Self {
            geometric: GeometricCompose::new(format, geometric),
            tensor: TensorCompose::new(tensor)?,
        };
        debug!(
            "built pipeline with geometric steps [{}] and tensor steps [{}]",
            pipeline.geometric_steps().join(", "),
            pipeline.tensor_steps().join(", ")
        );

        Ok(pipeline)
    }

    pub fn box_format(&self) -> BoxFormat {
        self.geometric.format()
    }

    pub fn geometric_steps(&self) -> Vec<&str> {
        self.geometric.step_names().collect()
    }

    pub fn tensor_steps(&self) -> Vec<&str> {
        self.tensor.step_names().collect()
    }

    /// Apply the geometric stage and then the tensor stage to a sample.
    pub fn forward(&self, rng: &mut dyn RngCore, sample: Sample) -> Result<TensorSample> {
        let Sample {
            image,
            meta,
            boxes,
            labels,
        } = sample;
        ensure!(
            boxes.len() == labels.len(),
            "the number of boxes ({}) and labels ({}) must be equal",
            boxes.len(),
            labels.len()
        );

        let (image, boxes, labels) = self.geometric.forward(rng, image, &boxes, &labels)?;
        let (image, meta) = self.tensor.forward(rng, &image, meta)?;

        Ok(TensorSample {
            image,
            meta,
            boxes,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepConfig;

    #[test]
    fn pipeline_is_send_and_sync() {
        fn check<T: Send + Sync>() {}
        check::<Pipeline>();
    }

    #[test]
    fn empty_torch_stage_is_rejected() {
        let config = PipelineConfig {
            albu: vec![StepConfig::new("HorizontalFlip")],
            torch: vec![],
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            Pipeline::new(&config, BoxFormat::XYWH, &mut rng),
            Err(ConfigError::MisplacedToTensor)
        ));
    }

    #[test]
    fn mismatched_sample_is_rejected() -> Result<()> {
        let config = PipelineConfig {
            albu: vec![],
            torch: vec![StepConfig::new("ToTensor")],
        };
        let mut rng = StdRng::seed_from_u64(0);
        let pipeline = Pipeline::new(&config, BoxFormat::XYWH, &mut rng)?;

        let sample = Sample {
            image: RgbImage::new(8, 8),
            meta: ImageMeta::new(),
            boxes: vec![[0.0, 0.0, 4.0, 4.0]],
            labels: vec![],
        };
        assert!(pipeline.forward(&mut rng, sample).is_err());
        Ok(())
    }
}
