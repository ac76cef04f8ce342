use crate::common::*;

/// Per-channel `(x - mean) / std`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizeInit {
    pub mean: Vec<R64>,
    pub std: Vec<R64>,
}

impl NormalizeInit {
    pub fn build(self) -> Result<Normalize> {
        let Self { mean, std } = self;
        ensure!(!mean.is_empty(), "normalization mean cannot be empty");
        ensure!(
            mean.len() == std.len(),
            "mean and std must have the same length, but get {} and {}",
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|&value| value > 0.0),
            "std values must be positive"
        );

        Ok(Normalize {
            mean: mean.into_iter().map(R64::raw).collect(),
            std: std.into_iter().map(R64::raw).collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Normalize {
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    pub fn forward(&self, image: &Tensor) -> Result<Tensor> {
        let (channels, _height, _width) = image.size3()?;
        ensure!(
            channels as usize == self.mean.len(),
            "expect {} channels, but get {}",
            self.mean.len(),
            channels
        );

        let to_tensor = |values: &[f64]| {
            let values: Vec<f32> = values.iter().map(|&value| value as f32).collect();
            Tensor::of_slice(&values)
                .view([channels, 1, 1])
                .to_device(image.device())
        };
        let mean = to_tensor(&self.mean);
        let std = to_tensor(&self.std);

        Ok((image - mean) / std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn normalize_per_channel() -> Result<()> {
        let normalize = NormalizeInit {
            mean: vec![r64(0.5), r64(0.0)],
            std: vec![r64(0.25), r64(2.0)],
        }
        .build()?;

        let image = Tensor::ones(&[2, 2, 2], (Kind::Float, Device::Cpu));
        let output = normalize.forward(&image)?;
        let values = Vec::<f32>::from(&output.view([-1]));
        for (index, value) in values.into_iter().enumerate() {
            let expect = if index < 4 { 2.0 } else { 0.5 };
            assert_abs_diff_eq!(value, expect, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn normalize_checks_channels() -> Result<()> {
        let normalize = NormalizeInit {
            mean: vec![r64(0.5); 3],
            std: vec![r64(0.5); 3],
        }
        .build()?;
        let image = Tensor::ones(&[1, 2, 2], (Kind::Float, Device::Cpu));
        assert!(normalize.forward(&image).is_err());
        Ok(())
    }

    #[test]
    fn normalize_rejects_bad_params() {
        let init = NormalizeInit {
            mean: vec![r64(0.5); 3],
            std: vec![r64(0.5); 2],
        };
        assert!(init.build().is_err());

        let init = NormalizeInit {
            mean: vec![r64(0.5)],
            std: vec![r64(0.0)],
        };
        assert!(init.build().is_err());
    }
}
