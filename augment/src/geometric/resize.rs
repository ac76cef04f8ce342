use super::{check_prob, clip_labels, default_p_one, image_size, should_apply};
use super::{ArraySample, GeometricTransform};
use crate::common::*;

/// Stretch the image to a fixed size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResizeInit {
    pub height: usize,
    pub width: usize,
    #[serde(default = "default_p_one")]
    pub p: R64,
}

impl ResizeInit {
    pub fn build(self) -> Result<Resize> {
        let Self { height, width, p } = self;
        ensure!(
            height > 0 && width > 0,
            "the target size must be positive, but get {}x{}",
            height,
            width
        );

        Ok(Resize {
            height: height as u32,
            width: width as u32,
            p: check_prob(p)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Resize {
    height: u32,
    width: u32,
    p: f64,
}

impl GeometricTransform for Resize {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }
        Ok(resize_sample(&sample, self.height, self.width))
    }
}

/// Resize an image and scale its boxes accordingly.
pub(crate) fn resize_sample(sample: &ArraySample, height: u32, width: u32) -> ArraySample {
    let src_size = sample.size();
    let image = imageops::resize(&sample.image, width, height, FilterType::Triangle);
    let tgt_size = image_size(&image);

    let transform = Transform::from_sizes_exact(&src_size, &tgt_size);
    let labels = clip_labels(
        sample.labels.iter().map(|label| &transform * label),
        &tgt_size,
    );

    ArraySample { image, labels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn resize_scales_boxes() -> Result<()> {
        let resize: ResizeInit = serde_json::from_str(r#"{"height": 320, "width": 320}"#)?;
        let resize = resize.build()?;

        let sample = ArraySample {
            image: RgbImage::new(800, 600),
            labels: vec![Label {
                rect: TLBR::from_tlbr([75.0, 75.0, 125.0, 125.0]),
                class: 3,
            }],
        };
        let mut rng = StdRng::seed_from_u64(1);
        let output = resize.apply(&mut rng, sample)?;

        assert_eq!(output.image.dimensions(), (320, 320));
        let [cx, cy, w, h] = output.labels[0].rect.cxcywh();
        assert_abs_diff_eq!(cx, 40.0, epsilon = 1e-6);
        assert_abs_diff_eq!(cy, 53.333333, epsilon = 1e-4);
        assert_abs_diff_eq!(w, 20.0, epsilon = 1e-6);
        assert_abs_diff_eq!(h, 26.666667, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn resize_rejects_empty_size() {
        let init = ResizeInit {
            height: 0,
            width: 10,
            p: r64(1.0),
        };
        assert!(init.build().is_err());
    }
}
