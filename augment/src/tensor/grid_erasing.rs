//! Erase square patches on a randomly placed grid.

use super::TensorTransform;
use crate::common::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridErasingInit {
    /// The probability to erase each grid cell.
    #[serde(default = "default_p")]
    pub p: R64,
    /// The minimum grid stride as a fraction of the image width.
    #[serde(default = "default_min_stride_ratio")]
    pub min_stride_ratio: R64,
    /// The maximum grid stride as a fraction of the image width.
    #[serde(default = "default_max_stride_ratio")]
    pub max_stride_ratio: R64,
}

fn default_p() -> R64 {
    r64(0.5)
}

fn default_min_stride_ratio() -> R64 {
    r64(0.1)
}

fn default_max_stride_ratio() -> R64 {
    r64(0.2)
}

impl Default for GridErasingInit {
    fn default() -> Self {
        Self {
            p: default_p(),
            min_stride_ratio: default_min_stride_ratio(),
            max_stride_ratio: default_max_stride_ratio(),
        }
    }
}

impl GridErasingInit {
    pub fn build(self) -> Result<GridErasing> {
        let Self {
            p,
            min_stride_ratio,
            max_stride_ratio,
        } = self;

        ensure!((0.0..=1.0).contains(&p.raw()), "p must be within [0, 1]");
        ensure!(
            min_stride_ratio > 0.0,
            "min_stride_ratio must be positive"
        );
        ensure!(
            min_stride_ratio <= max_stride_ratio && max_stride_ratio <= 1.0,
            "expect min_stride_ratio <= max_stride_ratio <= 1, but get {} and {}",
            min_stride_ratio,
            max_stride_ratio
        );

        Ok(GridErasing {
            p: p.raw(),
            min_stride_ratio: min_stride_ratio.raw(),
            max_stride_ratio: max_stride_ratio.raw(),
        })
    }
}

/// Fills randomly chosen cells of a random grid with standard normal noise.
///
/// The grid geometry is sampled anew on every call.
#[derive(Debug, Clone)]
pub struct GridErasing {
    p: f64,
    min_stride_ratio: f64,
    max_stride_ratio: f64,
}

/// The grid drawn for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub stride: i64,
    pub cell_size: i64,
    pub row_offset: i64,
    pub col_offset: i64,
}

impl Grid {
    /// The top-left corners `(row, col)` of all cells within an image.
    pub fn anchors(&self, height: i64, width: i64) -> impl Iterator<Item = (i64, i64)> {
        let stride = self.stride as usize;
        let rows = (self.row_offset..height).step_by(stride);
        let cols = (self.col_offset..width).step_by(stride);
        iproduct!(rows, cols)
    }
}

impl GridErasing {
    /// Draw the grid geometry for an image of the given size.
    pub fn sample_grid(&self, rng: &mut dyn RngCore, width: i64) -> Grid {
        let ratio = if self.max_stride_ratio > self.min_stride_ratio {
            rng.gen_range(self.min_stride_ratio..self.max_stride_ratio)
        } else {
            self.min_stride_ratio
        };
        let stride = ((width as f64 * ratio) as i64).max(1);
        let min_size = (stride as f64 * 0.3) as i64;
        let max_size = (stride as f64 * 0.7) as i64;
        let cell_size = rng.gen_range(min_size..=max_size);
        let row_offset = rng.gen_range(0..stride);
        let col_offset = rng.gen_range(0..stride);

        Grid {
            stride,
            cell_size,
            row_offset,
            col_offset,
        }
    }
}

impl TensorTransform for GridErasing {
    fn forward(&self, rng: &mut dyn RngCore, image: Tensor) -> Result<Tensor> {
        tch::no_grad(|| -> Result<_> {
            let (channels, height, width) = image.size3()?;
            let grid = self.sample_grid(rng, width);
            if grid.cell_size == 0 {
                return Ok(image);
            }

            for (top, left) in grid.anchors(height, width) {
                if rng.gen::<f64>() >= self.p {
                    continue;
                }

                let bottom = (top + grid.cell_size).min(height);
                let right = (left + grid.cell_size).min(width);
                let numel = (channels * (bottom - top) * (right - left)) as usize;
                let noise: Vec<f32> = (0..numel)
                    .map(|_| rng.sample::<f32, _>(StandardNormal))
                    .collect();
                let noise = Tensor::of_slice(&noise)
                    .view([channels, bottom - top, right - left])
                    .to_kind(image.kind())
                    .to_device(image.device());

                image.i((.., top..bottom, left..right)).copy_(&noise);
            }

            Ok(image)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_image(value: f64) -> Tensor {
        Tensor::full(&[3, 40, 60], value, (Kind::Float, Device::Cpu))
    }

    #[test]
    fn zero_probability_keeps_image() -> Result<()> {
        let erasing = GridErasingInit {
            p: r64(0.0),
            ..Default::default()
        }
        .build()?;
        let mut rng = StdRng::seed_from_u64(11);

        let input = Tensor::rand(&[3, 40, 60], (Kind::Float, Device::Cpu));
        let expect = input.copy();
        let output = erasing.forward(&mut rng, input)?;
        assert!(output.equal(&expect));
        Ok(())
    }

    #[test]
    fn full_probability_erases_every_cell() -> Result<()> {
        let erasing = GridErasingInit {
            p: r64(1.0),
            ..Default::default()
        }
        .build()?;

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let grid = erasing.sample_grid(&mut rng.clone(), 60);
            let output = erasing.forward(&mut rng, constant_image(5.0))?;

            // pixels inside any cell are noise, the rest is untouched
            let mut erased = vec![vec![false; 60]; 40];
            for (top, left) in grid.anchors(40, 60) {
                for row in top..(top + grid.cell_size).min(40) {
                    for col in left..(left + grid.cell_size).min(60) {
                        erased[row as usize][col as usize] = true;
                    }
                }
            }

            let values = Vec::<f32>::from(&output.view([-1]));
            for (index, value) in values.into_iter().enumerate() {
                let row = (index / 60) % 40;
                let col = index % 60;
                if erased[row][col] {
                    assert_ne!(value, 5.0);
                } else {
                    assert_eq!(value, 5.0);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn grid_geometry_bounds() {
        let erasing = GridErasingInit::default().build().unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let grid = erasing.sample_grid(&mut rng, 100);
            assert!((10..=20).contains(&grid.stride));
            assert!(grid.cell_size >= (grid.stride as f64 * 0.3) as i64);
            assert!(grid.cell_size <= (grid.stride as f64 * 0.7) as i64);
            assert!((0..grid.stride).contains(&grid.row_offset));
            assert!((0..grid.stride).contains(&grid.col_offset));
        }
    }

    #[test]
    fn invalid_ratios_are_rejected() {
        let init = GridErasingInit {
            min_stride_ratio: r64(0.3),
            max_stride_ratio: r64(0.2),
            ..Default::default()
        };
        assert!(init.build().is_err());
    }
}
