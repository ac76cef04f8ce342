use super::{check_prob, default_p_half, should_apply, ArraySample, GeometricTransform};
use crate::common::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HorizontalFlipInit {
    #[serde(default = "default_p_half")]
    pub p: R64,
}

impl HorizontalFlipInit {
    pub fn build(self) -> Result<HorizontalFlip> {
        Ok(HorizontalFlip {
            p: check_prob(self.p)?,
        })
    }
}

impl Default for HorizontalFlipInit {
    fn default() -> Self {
        Self {
            p: default_p_half(),
        }
    }
}

/// Mirror the image left to right.
#[derive(Debug, Clone)]
pub struct HorizontalFlip {
    p: f64,
}

impl GeometricTransform for HorizontalFlip {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }

        let width = sample.size().w();
        let ArraySample { image, labels } = sample;
        let image = imageops::flip_horizontal(&image);
        let labels = labels
            .into_iter()
            .map(|label| Label {
                rect: label.rect.flip_horizontal(width),
                class: label.class,
            })
            .collect();

        Ok(ArraySample { image, labels })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerticalFlipInit {
    #[serde(default = "default_p_half")]
    pub p: R64,
}

impl VerticalFlipInit {
    pub fn build(self) -> Result<VerticalFlip> {
        Ok(VerticalFlip {
            p: check_prob(self.p)?,
        })
    }
}

impl Default for VerticalFlipInit {
    fn default() -> Self {
        Self {
            p: default_p_half(),
        }
    }
}

/// Mirror the image top to bottom.
#[derive(Debug, Clone)]
pub struct VerticalFlip {
    p: f64,
}

impl GeometricTransform for VerticalFlip {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }

        let height = sample.size().h();
        let ArraySample { image, labels } = sample;
        let image = imageops::flip_vertical(&image);
        let labels = labels
            .into_iter()
            .map(|label| Label {
                rect: label.rect.flip_vertical(height),
                class: label.class,
            })
            .collect();

        Ok(ArraySample { image, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArraySample {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        ArraySample {
            image,
            labels: vec![Label {
                rect: TLBR::from_tlbr([0.0, 0.0, 1.0, 1.0]),
                class: 5,
            }],
        }
    }

    #[test]
    fn horizontal_flip_moves_pixels_and_boxes() -> Result<()> {
        let flip = HorizontalFlipInit { p: r64(1.0) }.build()?;
        let mut rng = StdRng::seed_from_u64(0);
        let output = flip.apply(&mut rng, sample())?;

        assert_eq!(output.image.get_pixel(3, 0), &Rgb([255, 0, 0]));
        assert_eq!(output.labels[0].rect.tlbr(), [0.0, 3.0, 1.0, 4.0]);
        assert_eq!(output.labels[0].class, 5);
        Ok(())
    }

    #[test]
    fn vertical_flip_moves_pixels_and_boxes() -> Result<()> {
        let flip = VerticalFlipInit { p: r64(1.0) }.build()?;
        let mut rng = StdRng::seed_from_u64(0);
        let output = flip.apply(&mut rng, sample())?;

        assert_eq!(output.image.get_pixel(0, 1), &Rgb([255, 0, 0]));
        assert_eq!(output.labels[0].rect.tlbr(), [1.0, 0.0, 2.0, 1.0]);
        Ok(())
    }

    #[test]
    fn flip_never_applied_with_zero_probability() -> Result<()> {
        let flip = HorizontalFlipInit { p: r64(0.0) }.build()?;
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let output = flip.apply(&mut rng, sample())?;
            assert_eq!(output.labels[0].rect.tlbr(), [0.0, 0.0, 1.0, 1.0]);
        }
        Ok(())
    }
}
