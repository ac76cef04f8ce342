use super::{check_prob, default_p_half, should_apply, ArraySample, GeometricTransform};
use crate::common::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelShuffleInit {
    #[serde(default = "default_p_half")]
    pub p: R64,
}

impl ChannelShuffleInit {
    pub fn build(self) -> Result<ChannelShuffle> {
        Ok(ChannelShuffle {
            p: check_prob(self.p)?,
        })
    }
}

/// Randomly permute the color channels.
#[derive(Debug, Clone)]
pub struct ChannelShuffle {
    p: f64,
}

impl GeometricTransform for ChannelShuffle {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }

        let mut order = [0, 1, 2];
        order.shuffle(rng);

        let ArraySample { mut image, labels } = sample;
        image.pixels_mut().for_each(|pixel| {
            let orig = pixel.0;
            pixel.0 = order.map(|channel| orig[channel]);
        });

        Ok(ArraySample { image, labels })
    }
}
