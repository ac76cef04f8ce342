//! Zero out random pixels across all channels.

use super::TensorTransform;
use crate::common::*;

/// The drop probability, either fixed or drawn from a range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DropProb {
    Fixed(R64),
    Range(R64, R64),
}

impl Default for DropProb {
    fn default() -> Self {
        Self::Range(r64(0.0), r64(0.05))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DropoutInit {
    #[serde(default)]
    pub p: DropProb,
}

impl DropoutInit {
    /// Build the transform, drawing its probability from `rng` if a range is given.
    ///
    /// The probability is fixed for the lifetime of the instance and shared
    /// by all calls, unlike grid erasing which draws anew on every call.
    pub fn build(self, rng: &mut dyn RngCore) -> Result<Dropout> {
        let in_unit = |p: R64| (0.0..=1.0).contains(&p.raw());

        let p = match self.p {
            DropProb::Fixed(p) => {
                ensure!(in_unit(p), "p must be within [0, 1]");
                p.raw()
            }
            DropProb::Range(low, high) => {
                ensure!(
                    in_unit(low) && in_unit(high) && low <= high,
                    "the p range must satisfy 0 <= low <= high <= 1"
                );
                if low < high {
                    rng.gen_range(low.raw()..high.raw())
                } else {
                    low.raw()
                }
            }
        };

        Ok(Dropout { p })
    }
}

#[derive(Debug, Clone)]
pub struct Dropout {
    p: f64,
}

impl Dropout {
    /// The drop probability of this instance.
    pub fn p(&self) -> f64 {
        self.p
    }
}

impl TensorTransform for Dropout {
    fn forward(&self, rng: &mut dyn RngCore, image: Tensor) -> Result<Tensor> {
        tch::no_grad(|| -> Result<_> {
            let (_channels, height, width) = image.size3()?;

            // one draw per pixel, shared by all channels
            let draws: Vec<f32> = (0..height * width).map(|_| rng.gen::<f32>()).collect();
            let mask = Tensor::of_slice(&draws)
                .view([1, height, width])
                .to_device(image.device())
                .lt(self.p);

            Ok(image.masked_fill(&mask, 0.0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Tensor {
        Tensor::rand(&[3, 16, 24], (Kind::Float, Device::Cpu)) + 0.5
    }

    #[test]
    fn full_probability_zeroes_all() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let dropout = DropoutInit {
            p: DropProb::Fixed(r64(1.0)),
        }
        .build(&mut rng)?;

        let output = dropout.forward(&mut rng, image())?;
        assert!(output.equal(&Tensor::zeros(&[3, 16, 24], (Kind::Float, Device::Cpu))));
        Ok(())
    }

    #[test]
    fn zero_probability_keeps_image() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let dropout = DropoutInit {
            p: DropProb::Fixed(r64(0.0)),
        }
        .build(&mut rng)?;

        let input = image();
        let expect = input.copy();
        let output = dropout.forward(&mut rng, input)?;
        assert!(output.equal(&expect));
        Ok(())
    }

    #[test]
    fn dropped_pixels_span_all_channels() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(1);
        let dropout = DropoutInit {
            p: DropProb::Fixed(r64(0.5)),
        }
        .build(&mut rng)?;

        let output = dropout.forward(&mut rng, image())?;
        let zeros = output.eq(0.0);
        let per_pixel = zeros.any_dim(0, false);
        let all_channels = zeros.all_dim(0, false);
        assert!(per_pixel.equal(&all_channels));
        assert!(f64::from(per_pixel.sum(Kind::Float)) > 0.0);
        Ok(())
    }

    #[test]
    fn range_is_sampled_once() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(2);
        let dropout = DropoutInit::default().build(&mut rng)?;
        assert!((0.0..0.05).contains(&dropout.p()));

        let p = DropProb::Range(r64(0.2), r64(0.1));
        assert!(DropoutInit { p }.build(&mut rng).is_err());
        Ok(())
    }

    #[test]
    fn instances_draw_their_own_prob() -> Result<()> {
        let init = DropoutInit::default();
        let lhs = init.clone().build(&mut StdRng::seed_from_u64(10))?;
        let rhs = init.build(&mut StdRng::seed_from_u64(11))?;
        assert!((0.0..0.05).contains(&lhs.p()));
        assert!((0.0..0.05).contains(&rhs.p()));
        assert_ne!(lhs.p(), rhs.p());

        // calls never redraw the probability
        let p = lhs.p();
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..10 {
            lhs.forward(&mut rng, image())?;
        }
        assert_eq!(lhs.p(), p);
        Ok(())
    }

    #[test]
    fn drop_rate_follows_fixed_prob() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(3);
        let dropout = DropoutInit {
            p: DropProb::Fixed(r64(0.5)),
        }
        .build(&mut rng)?;

        let num_calls = 50;
        let num_pixels = 16 * 24;
        let dropped: f64 = (0..num_calls)
            .map(|_| -> Result<f64> {
                let output = dropout.forward(&mut rng, image())?;
                let zeros = output.eq(0.0).all_dim(0, false);
                Ok(f64::from(zeros.sum(Kind::Float)))
            })
            .sum::<Result<f64>>()?;

        let rate = dropped / (num_calls * num_pixels) as f64;
        assert!((rate - 0.5).abs() < 0.03, "drop rate {} is far from 0.5", rate);
        Ok(())
    }

    #[test]
    fn prob_deserializes_from_number_or_pair() -> Result<()> {
        let init: DropoutInit = serde_json::from_str(r#"{"p": 0.1}"#)?;
        assert_eq!(init.p, DropProb::Fixed(r64(0.1)));
        let init: DropoutInit = serde_json::from_str(r#"{"p": [0.0, 0.1]}"#)?;
        assert_eq!(init.p, DropProb::Range(r64(0.0), r64(0.1)));
        Ok(())
    }
}
