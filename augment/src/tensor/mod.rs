//! Tensor-domain transforms.
//!
//! The stage starts with [ToTensor], which turns the final `u8` image into a
//! `[C, H, W]` float tensor scaled to `[0, 1]`. [Normalize] records the
//! statistics it applies in the sample's [ImageMeta].

mod dropout;
mod grid_erasing;
mod normalize;
mod to_tensor;

pub use dropout::*;
pub use grid_erasing::*;
pub use normalize::*;
pub use to_tensor::*;

use crate::{
    common::*,
    error::ConfigError,
    meta::{ImageMeta, NORM_MEAN_KEY, NORM_STD_KEY},
};

/// A transform on a `[C, H, W]` float tensor.
///
/// The input tensor is owned by the transform and may be modified in place.
pub trait TensorTransform: Debug + Send + Sync {
    fn forward(&self, rng: &mut dyn RngCore, image: Tensor) -> Result<Tensor>;
}

/// A resolved step of the tensor stage.
#[derive(Debug)]
pub enum TensorStep {
    ToTensor(ToTensor),
    Normalize(Normalize),
    Transform(Box<dyn TensorTransform>),
}

/// The steps following the conversion.
#[derive(Debug)]
enum ConvertedStep {
    Normalize(Normalize),
    Transform(Box<dyn TensorTransform>),
}

/// The tensor stage of a pipeline.
#[derive(Debug)]
pub struct TensorCompose {
    to_tensor: ToTensor,
    steps: Vec<(String, ConvertedStep)>,
}

impl TensorCompose {
    /// Check the step layout and assemble the stage.
    ///
    /// The first step must be the only `ToTensor` and `Normalize` may appear once at most.
    pub fn new(steps: Vec<(String, TensorStep)>) -> Result<Self, ConfigError> {
        let mut steps = steps.into_iter();
        let to_tensor = match steps.next() {
            Some((_, TensorStep::ToTensor(to_tensor))) => to_tensor,
            _ => return Err(ConfigError::MisplacedToTensor),
        };

        let mut has_normalize = false;
        let steps: Vec<_> = steps
            .map(|(name, step)| {
                let step = match step {
                    TensorStep::ToTensor(_) => return Err(ConfigError::MisplacedToTensor),
                    TensorStep::Normalize(normalize) => {
                        if mem::replace(&mut has_normalize, true) {
                            return Err(ConfigError::DuplicateStep { name });
                        }
                        ConvertedStep::Normalize(normalize)
                    }
                    TensorStep::Transform(transform) => ConvertedStep::Transform(transform),
                };
                Ok((name, step))
            })
            .try_collect()?;

        Ok(Self { to_tensor, steps })
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        iter::once("ToTensor").chain(self.steps.iter().map(|(name, _)| name.as_str()))
    }

    /// Convert a geometrically final image and run the remaining steps.
    pub fn forward(
        &self,
        rng: &mut dyn RngCore,
        image: &RgbImage,
        mut meta: ImageMeta,
    ) -> Result<(Tensor, ImageMeta)> {
        // the conversion keeps the 0-255 range
        let mut tensor = self.to_tensor.convert(image)? / 255.0;

        for (name, step) in &self.steps {
            tensor = match step {
                ConvertedStep::Normalize(normalize) => {
                    let output = normalize.forward(&tensor)?;
                    meta.insert(NORM_MEAN_KEY, normalize.mean().to_vec())?;
                    meta.insert(NORM_STD_KEY, normalize.std().to_vec())?;
                    output
                }
                ConvertedStep::Transform(transform) => transform
                    .forward(rng, tensor)
                    .with_context(|| format!("the tensor step '{}' failed", name))?,
            };
        }

        Ok((tensor, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_tensor() -> (String, TensorStep) {
        ("ToTensor".into(), TensorStep::ToTensor(ToTensor))
    }

    fn normalize() -> (String, TensorStep) {
        let normalize = NormalizeInit {
            mean: vec![r64(0.5); 3],
            std: vec![r64(0.5); 3],
        }
        .build()
        .unwrap();
        ("Normalize".into(), TensorStep::Normalize(normalize))
    }

    #[test]
    fn layout_is_checked() {
        assert!(matches!(
            TensorCompose::new(vec![]),
            Err(ConfigError::MisplacedToTensor)
        ));
        assert!(matches!(
            TensorCompose::new(vec![normalize(), to_tensor()]),
            Err(ConfigError::MisplacedToTensor)
        ));
        assert!(matches!(
            TensorCompose::new(vec![to_tensor(), to_tensor()]),
            Err(ConfigError::MisplacedToTensor)
        ));
        assert!(matches!(
            TensorCompose::new(vec![to_tensor(), normalize(), normalize()]),
            Err(ConfigError::DuplicateStep { .. })
        ));
        assert!(TensorCompose::new(vec![to_tensor(), normalize()]).is_ok());
    }

    #[test]
    fn conversion_rescales_to_unit_range() -> Result<()> {
        let compose = TensorCompose::new(vec![to_tensor()])?;
        let image = RgbImage::from_fn(16, 8, |col, row| {
            Rgb([(col * 17) as u8, (row * 32) as u8, 255])
        });
        let mut rng = StdRng::seed_from_u64(0);
        let (tensor, meta) = compose.forward(&mut rng, &image, ImageMeta::new())?;

        assert_eq!(tensor.size(), vec![3, 8, 16]);
        assert_eq!(tensor.kind(), Kind::Float);
        assert!(f64::from(tensor.min()) >= 0.0);
        assert!(f64::from(tensor.max()) <= 1.0);
        assert!(meta.is_empty());
        Ok(())
    }

    #[test]
    fn normalize_is_recorded() -> Result<()> {
        let compose = TensorCompose::new(vec![to_tensor(), normalize()])?;
        let image = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let mut rng = StdRng::seed_from_u64(0);
        let (tensor, meta) = compose.forward(&mut rng, &image, ImageMeta::new())?;

        assert_eq!(meta.norm_mean(), Some(&[0.5, 0.5, 0.5][..]));
        assert_eq!(meta.norm_std(), Some(&[0.5, 0.5, 0.5][..]));
        assert!(Vec::<f32>::from(&tensor.view([-1]))
            .into_iter()
            .all(|value| value == 1.0));
        Ok(())
    }
}
