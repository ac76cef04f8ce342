//! Random crop that keeps every box, followed by a resize.

use super::resize::resize_sample;
use super::{check_prob, clip_labels, default_p_one, should_apply};
use super::{ArraySample, GeometricTransform};
use crate::common::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomSizedBBoxSafeCropInit {
    pub height: usize,
    pub width: usize,
    /// The fraction of each box allowed to be cut off at the crop border.
    #[serde(default = "default_erosion_rate")]
    pub erosion_rate: R64,
    #[serde(default = "default_p_one")]
    pub p: R64,
}

fn default_erosion_rate() -> R64 {
    r64(0.0)
}

impl RandomSizedBBoxSafeCropInit {
    pub fn build(self) -> Result<RandomSizedBBoxSafeCrop> {
        let Self {
            height,
            width,
            erosion_rate,
            p,
        } = self;

        ensure!(
            height > 0 && width > 0,
            "the target size must be positive, but get {}x{}",
            height,
            width
        );
        ensure!(
            (0.0..1.0).contains(&erosion_rate.raw()),
            "erosion_rate must be within [0, 1)"
        );

        Ok(RandomSizedBBoxSafeCrop {
            height: height as u32,
            width: width as u32,
            erosion_rate: erosion_rate.raw(),
            p: check_prob(p)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomSizedBBoxSafeCrop {
    height: u32,
    width: u32,
    erosion_rate: f64,
    p: f64,
}

impl GeometricTransform for RandomSizedBBoxSafeCrop {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }

        let crop = self.sample_crop(rng, &sample);
        let [top, left, bottom, right] = crop;
        let ArraySample { image, labels } = sample;

        let image = imageops::crop_imm(&image, left, top, right - left, bottom - top).to_image();
        let crop_size = super::image_size(&image);
        let shift = Transform::translation(-(top as f64), -(left as f64));
        let labels = clip_labels(labels.iter().map(|label| &shift * label), &crop_size);

        Ok(resize_sample(
            &ArraySample { image, labels },
            self.height,
            self.width,
        ))
    }
}

impl RandomSizedBBoxSafeCrop {
    /// Pick the crop window `[top, left, bottom, right]` in pixels.
    fn sample_crop(&self, rng: &mut dyn RngCore, sample: &ArraySample) -> [u32; 4] {
        let (img_w, img_h) = sample.image.dimensions();
        let (img_hf, img_wf) = (img_h as f64, img_w as f64);

        let (crop_h, crop_w, h_start, w_start) = if sample.labels.is_empty() {
            let erosive_h = (img_hf * (1.0 - self.erosion_rate)) as u32;
            let crop_h = if erosive_h >= img_h {
                img_h
            } else {
                rng.gen_range(erosive_h..=img_h)
            };
            let crop_w = (crop_h as f64 * img_wf / img_hf) as u32;
            (crop_h, crop_w, rng.gen::<f64>(), rng.gen::<f64>())
        } else {
            // union of the eroded boxes in normalized coordinates
            let [y1, x1, y2, x2] = sample.labels.iter().fold(
                [1.0f64, 1.0, 0.0, 0.0],
                |[y1, x1, y2, x2], label| {
                    let rect = &label.rect;
                    let dh = rect.h() * self.erosion_rate;
                    let dw = rect.w() * self.erosion_rate;
                    [
                        y1.min((rect.t() + dh) / img_hf),
                        x1.min((rect.l() + dw) / img_wf),
                        y2.max((rect.b() - dh) / img_hf),
                        x2.max((rect.r() - dw) / img_wf),
                    ]
                },
            );

            let by = y1 * rng.gen::<f64>();
            let bx = x1 * rng.gen::<f64>();
            let by2 = y2 + (1.0 - y2) * rng.gen::<f64>();
            let bx2 = x2 + (1.0 - x2) * rng.gen::<f64>();
            let bh = by2 - by;
            let bw = bx2 - bx;

            let (crop_h, h_start) = if bh >= 1.0 {
                (img_h, 0.0)
            } else {
                ((img_hf * bh) as u32, (by / (1.0 - bh)).clamp(0.0, 1.0))
            };
            let (crop_w, w_start) = if bw >= 1.0 {
                (img_w, 0.0)
            } else {
                ((img_wf * bw) as u32, (bx / (1.0 - bw)).clamp(0.0, 1.0))
            };
            (crop_h, crop_w, h_start, w_start)
        };

        let crop_h = crop_h.clamp(1, img_h.max(1));
        let crop_w = crop_w.clamp(1, img_w.max(1));
        let top = ((img_h - crop_h) as f64 * h_start) as u32;
        let left = ((img_w - crop_w) as f64 * w_start) as u32;

        [top, left, top + crop_h, left + crop_w]
    }
}
