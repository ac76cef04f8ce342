//! The random color distortion algorithm.

use super::{check_prob, default_p_half, should_apply, uniform};
use super::{ArraySample, GeometricTransform, Limit};
use crate::common::*;

/// Randomly change brightness, contrast, saturation and hue, in random order.
///
/// `brightness`, `contrast` and `saturation` given as a number `x` sample a
/// factor from `[max(0, 1 - x), 1 + x]`; given as a pair the factor range is
/// taken as is. `hue` is a shift in fractions of a full turn, within `[-0.5, 0.5]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorJitterInit {
    #[serde(default = "default_jitter")]
    pub brightness: Limit,
    #[serde(default = "default_jitter")]
    pub contrast: Limit,
    #[serde(default = "default_jitter")]
    pub saturation: Limit,
    #[serde(default = "default_jitter")]
    pub hue: Limit,
    #[serde(default = "default_p_half")]
    pub p: R64,
}

fn default_jitter() -> Limit {
    Limit::Symmetric(r64(0.2))
}

impl Default for ColorJitterInit {
    fn default() -> Self {
        Self {
            brightness: default_jitter(),
            contrast: default_jitter(),
            saturation: default_jitter(),
            hue: default_jitter(),
            p: default_p_half(),
        }
    }
}

impl ColorJitterInit {
    pub fn build(self) -> Result<ColorJitter> {
        let Self {
            brightness,
            contrast,
            saturation,
            hue,
            p,
        } = self;

        let factor_range = |limit: Limit, name: &str| -> Result<(f64, f64)> {
            let range = match limit {
                Limit::Symmetric(factor) => {
                    ensure!(factor >= 0.0, "{} must be non-negative", name);
                    ((1.0 - factor.raw()).max(0.0), 1.0 + factor.raw())
                }
                Limit::Range(..) => {
                    let (lo, hi) = limit.to_range()?;
                    ensure!(lo >= 0.0, "the {} range must be non-negative", name);
                    (lo, hi)
                }
            };
            Ok(range)
        };

        let hue = hue.to_range()?;
        ensure!(
            hue.0 >= -0.5 && hue.1 <= 0.5,
            "hue must be within [-0.5, 0.5]"
        );

        Ok(ColorJitter {
            brightness: factor_range(brightness, "brightness")?,
            contrast: factor_range(contrast, "contrast")?,
            saturation: factor_range(saturation, "saturation")?,
            hue,
            p: check_prob(p)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ColorJitter {
    brightness: (f64, f64),
    contrast: (f64, f64),
    saturation: (f64, f64),
    hue: (f64, f64),
    p: f64,
}

#[derive(Debug, Clone, Copy)]
enum JitterOp {
    Brightness(f32),
    Contrast(f32),
    Saturation(f32),
    Hue(f32),
}

impl GeometricTransform for ColorJitter {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }

        let mut ops = [
            JitterOp::Brightness(uniform(rng, self.brightness) as f32),
            JitterOp::Contrast(uniform(rng, self.contrast) as f32),
            JitterOp::Saturation(uniform(rng, self.saturation) as f32),
            JitterOp::Hue(uniform(rng, self.hue) as f32),
        ];
        ops.shuffle(rng);

        let ArraySample { image, labels } = sample;
        let mut pixels: Vec<[f32; 3]> = image
            .pixels()
            .map(|pixel| pixel.0.map(|value| value as f32))
            .collect();

        for op in ops {
            match op {
                JitterOp::Brightness(factor) => pixels.iter_mut().for_each(|pixel| {
                    *pixel = pixel.map(|value| (value * factor).clamp(0.0, 255.0));
                }),
                JitterOp::Contrast(factor) => {
                    let mean = pixels.iter().map(|&pixel| grayscale(pixel)).sum::<f32>()
                        / pixels.len().max(1) as f32;
                    pixels.iter_mut().for_each(|pixel| {
                        *pixel = pixel.map(|value| blend(value, mean, factor));
                    });
                }
                JitterOp::Saturation(factor) => pixels.iter_mut().for_each(|pixel| {
                    let gray = grayscale(*pixel);
                    *pixel = pixel.map(|value| blend(value, gray, factor));
                }),
                JitterOp::Hue(shift) => pixels.iter_mut().for_each(|pixel| {
                    let [h, s, v] = rgb_to_hsv(*pixel);
                    *pixel = hsv_to_rgb([(h + shift).rem_euclid(1.0), s, v]);
                }),
            }
        }

        let (width, height) = image.dimensions();
        let raw: Vec<u8> = pixels
            .into_iter()
            .flat_map(|pixel| pixel.map(|value| value.round().clamp(0.0, 255.0) as u8))
            .collect();
        let image = RgbImage::from_raw(width, height, raw)
            .ok_or_else(|| format_err!("pixel buffer does not match the image size"))?;

        Ok(ArraySample { image, labels })
    }
}

fn grayscale([r, g, b]: [f32; 3]) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

fn blend(value: f32, base: f32, factor: f32) -> f32 {
    (value * factor + base * (1.0 - factor)).clamp(0.0, 255.0)
}

/// Convert `[0, 255]` RGB to HSV with all components in `[0, 1]`.
fn rgb_to_hsv(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(|value| value / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    let saturation = if max <= 0.0 { 0.0 } else { delta / max };

    [hue, saturation, max]
}

/// Inverse of [rgb_to_hsv].
fn hsv_to_rgb([h, s, v]: [f32; 3]) -> [f32; 3] {
    let sector = h * 6.0;
    let index = sector.floor();
    let frac = sector - index;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * frac);
    let t = v * (1.0 - s * (1.0 - frac));

    let rgb = match index as i64 % 6 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    };
    rgb.map(|value| value * 255.0)
}
