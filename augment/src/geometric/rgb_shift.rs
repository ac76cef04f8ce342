use super::{check_prob, default_p_half, should_apply, uniform};
use super::{ArraySample, GeometricTransform, Limit};
use crate::common::*;

/// Add a random offset to each color channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RgbShiftInit {
    #[serde(default = "default_shift")]
    pub r_shift_limit: Limit,
    #[serde(default = "default_shift")]
    pub g_shift_limit: Limit,
    #[serde(default = "default_shift")]
    pub b_shift_limit: Limit,
    #[serde(default = "default_p_half")]
    pub p: R64,
}

fn default_shift() -> Limit {
    Limit::Symmetric(r64(20.0))
}

impl Default for RgbShiftInit {
    fn default() -> Self {
        Self {
            r_shift_limit: default_shift(),
            g_shift_limit: default_shift(),
            b_shift_limit: default_shift(),
            p: default_p_half(),
        }
    }
}

impl RgbShiftInit {
    pub fn build(self) -> Result<RgbShift> {
        let Self {
            r_shift_limit,
            g_shift_limit,
            b_shift_limit,
            p,
        } = self;

        Ok(RgbShift {
            limits: [
                r_shift_limit.to_range()?,
                g_shift_limit.to_range()?,
                b_shift_limit.to_range()?,
            ],
            p: check_prob(p)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RgbShift {
    limits: [(f64, f64); 3],
    p: f64,
}

impl GeometricTransform for RgbShift {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }

        let shifts = self.limits.map(|limit| uniform(rng, limit));
        let ArraySample { mut image, labels } = sample;
        image.pixels_mut().for_each(|pixel| {
            izip!(pixel.0.iter_mut(), shifts).for_each(|(value, shift)| {
                *value = (*value as f64 + shift).round().clamp(0.0, 255.0) as u8;
            });
        });

        Ok(ArraySample { image, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_saturates() -> Result<()> {
        let shift = RgbShiftInit {
            r_shift_limit: Limit::Range(r64(100.0), r64(100.0)),
            g_shift_limit: Limit::Range(r64(-100.0), r64(-100.0)),
            b_shift_limit: Limit::Symmetric(r64(0.0)),
            p: r64(1.0),
        }
        .build()?;

        let image = RgbImage::from_pixel(3, 3, Rgb([200, 50, 77]));
        let mut rng = StdRng::seed_from_u64(0);
        let output = shift.apply(
            &mut rng,
            ArraySample {
                image,
                labels: vec![],
            },
        )?;
        assert!(output.image.pixels().all(|pixel| pixel.0 == [255, 0, 77]));
        Ok(())
    }
}
