//! Random affine warp composed of a shift, a scaling and a rotation.

use super::{check_prob, clip_labels, default_p_half, sample_bilinear, should_apply, uniform};
use super::{ArraySample, BorderMode, FillValue, GeometricTransform, Limit};
use crate::common::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiftScaleRotateInit {
    /// Shift as a fraction of the image size.
    #[serde(default = "default_shift_limit")]
    pub shift_limit: Limit,
    /// Scaling factor offset from 1.
    #[serde(default = "default_scale_limit")]
    pub scale_limit: Limit,
    /// Rotation in degrees, counter-clockwise.
    #[serde(default = "default_rotate_limit")]
    pub rotate_limit: Limit,
    #[serde(default)]
    pub border_mode: BorderMode,
    #[serde(default)]
    pub value: FillValue,
    #[serde(default = "default_p_half")]
    pub p: R64,
}

fn default_shift_limit() -> Limit {
    Limit::Symmetric(r64(0.0625))
}

fn default_scale_limit() -> Limit {
    Limit::Symmetric(r64(0.1))
}

fn default_rotate_limit() -> Limit {
    Limit::Symmetric(r64(45.0))
}

impl Default for ShiftScaleRotateInit {
    fn default() -> Self {
        Self {
            shift_limit: default_shift_limit(),
            scale_limit: default_scale_limit(),
            rotate_limit: default_rotate_limit(),
            border_mode: BorderMode::default(),
            value: FillValue::default(),
            p: default_p_half(),
        }
    }
}

impl ShiftScaleRotateInit {
    pub fn build(self) -> Result<ShiftScaleRotate> {
        let Self {
            shift_limit,
            scale_limit,
            rotate_limit,
            border_mode,
            value,
            p,
        } = self;

        let shift = shift_limit.to_range()?;
        let (scale_lo, scale_hi) = scale_limit.to_range()?;
        ensure!(scale_lo > -1.0, "scale_limit must stay above -1");
        let rotate = rotate_limit.to_range()?;

        Ok(ShiftScaleRotate {
            shift,
            scale: (1.0 + scale_lo, 1.0 + scale_hi),
            rotate,
            border_mode,
            fill: value.to_rgb(),
            p: check_prob(p)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ShiftScaleRotate {
    shift: (f64, f64),
    scale: (f64, f64),
    rotate: (f64, f64),
    border_mode: BorderMode,
    fill: [u8; 3],
    p: f64,
}

impl GeometricTransform for ShiftScaleRotate {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }

        let angle = uniform(rng, self.rotate);
        let scale = uniform(rng, self.scale);
        let dx = uniform(rng, self.shift);
        let dy = uniform(rng, self.shift);

        let size = sample.size();
        let affine = Affine::rotation_around(
            size.h() / 2.0,
            size.w() / 2.0,
            angle.to_radians(),
            scale,
        )
        .then_translate(dy * size.h(), dx * size.w());
        Ok(self.warp(&affine, sample))
    }
}

impl ShiftScaleRotate {
    fn warp(&self, affine: &Affine, sample: ArraySample) -> ArraySample {
        let ArraySample { image, labels } = sample;
        let size = super::image_size(&image);
        let (width, height) = image.dimensions();
        let inverse = affine.inverse();

        let output = RgbImage::from_fn(width, height, |col, row| {
            let [y, x] = inverse.apply([row as f64, col as f64]);
            sample_bilinear(&image, y, x, self.border_mode, self.fill)
        });

        // enclose the warped corners of each box
        let labels = labels.into_iter().filter_map(|label| {
            let corners = label.rect.corners().map(|point| affine.apply(point));
            let rect = TLBR::enclosing_points(corners)?;
            Some(Label {
                rect,
                class: label.class,
            })
        });
        let labels = clip_labels(labels, &size);

        ArraySample {
            image: output,
            labels,
        }
    }
}

/// A 2x3 affine matrix acting on `[y, x]` points.
#[derive(Debug, Clone, PartialEq)]
struct Affine {
    /// row-major `[[m00, m01, m02], [m10, m11, m12]]` in `(x, y)` order
    matrix: [[f64; 3]; 2],
}

impl Affine {
    /// Rotation by `angle` radians counter-clockwise and uniform scaling,
    /// both around the point `(cy, cx)`.
    fn rotation_around(cy: f64, cx: f64, angle: f64, scale: f64) -> Self {
        let alpha = scale * angle.cos();
        let beta = scale * angle.sin();
        Self {
            matrix: [
                [alpha, beta, (1.0 - alpha) * cx - beta * cy],
                [-beta, alpha, beta * cx + (1.0 - alpha) * cy],
            ],
        }
    }

    fn then_translate(mut self, ty: f64, tx: f64) -> Self {
        self.matrix[0][2] += tx;
        self.matrix[1][2] += ty;
        self
    }

    fn apply(&self, [y, x]: [f64; 2]) -> [f64; 2] {
        let [[m00, m01, m02], [m10, m11, m12]] = self.matrix;
        [m10 * x + m11 * y + m12, m00 * x + m01 * y + m02]
    }

    fn inverse(&self) -> Self {
        let [[m00, m01, m02], [m10, m11, m12]] = self.matrix;
        let det = m00 * m11 - m01 * m10;
        let i00 = m11 / det;
        let i01 = -m01 / det;
        let i10 = -m10 / det;
        let i11 = m00 / det;
        Self {
            matrix: [
                [i00, i01, -(i00 * m02 + i01 * m12)],
                [i10, i11, -(i10 * m02 + i11 * m12)],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn affine_inverse() {
        let affine = Affine::rotation_around(10.0, 20.0, 0.3, 1.2).then_translate(3.0, -4.0);
        let point = [7.0, 11.0];
        let [y, x] = affine.inverse().apply(affine.apply(point));
        assert_abs_diff_eq!(y, 7.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x, 11.0, epsilon = 1e-9);
    }

    #[test]
    fn identity_warp_keeps_sample() -> Result<()> {
        let transform = ShiftScaleRotateInit {
            shift_limit: Limit::Symmetric(r64(0.0)),
            scale_limit: Limit::Symmetric(r64(0.0)),
            rotate_limit: Limit::Symmetric(r64(0.0)),
            p: r64(1.0),
            ..Default::default()
        }
        .build()?;

        let image = RgbImage::from_fn(8, 6, |col, row| Rgb([col as u8, row as u8, 7]));
        let rect = TLBR::from_tlbr([1.0, 2.0, 4.0, 5.0]);
        let sample = ArraySample {
            image: image.clone(),
            labels: vec![Label { rect, class: 1 }],
        };
        let mut rng = StdRng::seed_from_u64(3);
        let output = transform.apply(&mut rng, sample)?;

        assert_eq!(output.image, image);
        assert_eq!(output.labels.len(), 1);
        let [t, l, b, r] = output.labels[0].rect.tlbr();
        assert_abs_diff_eq!(t, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(l, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(b, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r, 5.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn large_shift_drops_boxes() -> Result<()> {
        let transform = ShiftScaleRotateInit {
            shift_limit: Limit::Range(r64(1.0), r64(1.0)),
            scale_limit: Limit::Symmetric(r64(0.0)),
            rotate_limit: Limit::Symmetric(r64(0.0)),
            border_mode: BorderMode::Constant,
            p: r64(1.0),
            ..Default::default()
        }
        .build()?;

        let sample = ArraySample {
            image: RgbImage::new(10, 10),
            labels: vec![Label {
                rect: TLBR::from_tlbr([0.0, 0.0, 5.0, 5.0]),
                class: 1,
            }],
        };
        let mut rng = StdRng::seed_from_u64(3);
        let output = transform.apply(&mut rng, sample)?;
        assert!(output.labels.is_empty());
        Ok(())
    }

    #[test]
    fn rotated_boxes_stay_in_frame() -> Result<()> {
        let transform = ShiftScaleRotateInit {
            p: r64(1.0),
            ..Default::default()
        }
        .build()?;
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..50 {
            let sample = ArraySample {
                image: RgbImage::new(16, 12),
                labels: vec![
                    Label {
                        rect: TLBR::from_tlbr([0.0, 0.0, 12.0, 16.0]),
                        class: 0,
                    },
                    Label {
                        rect: TLBR::from_tlbr([2.0, 3.0, 6.0, 9.0]),
                        class: 1,
                    },
                ],
            };
            let output = transform.apply(&mut rng, sample)?;
            for label in &output.labels {
                let [t, l, b, r] = label.rect.tlbr();
                assert!(t >= 0.0 && l >= 0.0 && b <= 12.0 && r <= 16.0);
            }
        }
        Ok(())
    }
}
