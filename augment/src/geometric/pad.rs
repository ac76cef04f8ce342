use super::{check_prob, default_p_one, should_apply};
use super::{ArraySample, BorderMode, FillValue, GeometricTransform};
use crate::common::*;

/// Pad the image on all sides so it is at least `min_height`×`min_width`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PadIfNeededInit {
    pub min_height: usize,
    pub min_width: usize,
    #[serde(default)]
    pub border_mode: BorderMode,
    #[serde(default)]
    pub value: FillValue,
    #[serde(default = "default_p_one")]
    pub p: R64,
}

impl PadIfNeededInit {
    pub fn build(self) -> Result<PadIfNeeded> {
        let Self {
            min_height,
            min_width,
            border_mode,
            value,
            p,
        } = self;

        Ok(PadIfNeeded {
            min_height: min_height as u32,
            min_width: min_width as u32,
            border_mode,
            fill: value.to_rgb(),
            p: check_prob(p)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PadIfNeeded {
    min_height: u32,
    min_width: u32,
    border_mode: BorderMode,
    fill: [u8; 3],
    p: f64,
}

impl GeometricTransform for PadIfNeeded {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample> {
        if !should_apply(rng, self.p) {
            return Ok(sample);
        }

        let ArraySample { image, labels } = sample;
        let (width, height) = image.dimensions();
        if height >= self.min_height && width >= self.min_width {
            return Ok(ArraySample { image, labels });
        }

        // the odd pixel goes to the bottom and right sides
        let pad_h = self.min_height.saturating_sub(height);
        let pad_w = self.min_width.saturating_sub(width);
        let top = pad_h / 2;
        let left = pad_w / 2;
        let new_height = height + pad_h;
        let new_width = width + pad_w;

        let output = RgbImage::from_fn(new_width, new_height, |col, row| {
            let src_row = self
                .border_mode
                .map_index(row as i64 - top as i64, height as i64);
            let src_col = self
                .border_mode
                .map_index(col as i64 - left as i64, width as i64);

            match (src_row, src_col) {
                (Some(row), Some(col)) => *image.get_pixel(col as u32, row as u32),
                _ => Rgb(self.fill),
            }
        });

        let shift = Transform::translation(top as f64, left as f64);
        let labels = labels.iter().map(|label| &shift * label).collect();

        Ok(ArraySample {
            image: output,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_centers_image() -> Result<()> {
        let pad: PadIfNeededInit = serde_json::from_str(
            r#"{"min_height": 5, "min_width": 4, "border_mode": 0, "value": 9}"#,
        )?;
        let pad = pad.build()?;

        let sample = ArraySample {
            image: RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])),
            labels: vec![Label {
                rect: TLBR::from_tlbr([0.0, 0.0, 2.0, 2.0]),
                class: 0,
            }],
        };
        let mut rng = StdRng::seed_from_u64(0);
        let output = pad.apply(&mut rng, sample)?;

        assert_eq!(output.image.dimensions(), (4, 5));
        assert_eq!(output.image.get_pixel(0, 0), &Rgb([9, 9, 9]));
        assert_eq!(output.image.get_pixel(1, 1), &Rgb([1, 2, 3]));
        assert_eq!(output.image.get_pixel(2, 2), &Rgb([1, 2, 3]));
        assert_eq!(output.image.get_pixel(3, 4), &Rgb([9, 9, 9]));
        assert_eq!(output.labels[0].rect.tlbr(), [1.0, 1.0, 3.0, 3.0]);
        Ok(())
    }

    #[test]
    fn pad_reflects_by_default() -> Result<()> {
        let pad: PadIfNeededInit = serde_json::from_str(r#"{"min_height": 1, "min_width": 5}"#)?;
        let pad = pad.build()?;

        let image = RgbImage::from_fn(3, 1, |col, _| Rgb([col as u8; 3]));
        let mut rng = StdRng::seed_from_u64(0);
        let output = pad.apply(
            &mut rng,
            ArraySample {
                image,
                labels: vec![],
            },
        )?;

        let row: Vec<u8> = (0..5).map(|col| output.image.get_pixel(col, 0)[0]).collect();
        assert_eq!(row, vec![1, 0, 1, 2, 1]);
        Ok(())
    }

    #[test]
    fn pad_keeps_large_images() -> Result<()> {
        let pad = PadIfNeededInit {
            min_height: 2,
            min_width: 2,
            border_mode: BorderMode::Constant,
            value: FillValue::default(),
            p: r64(1.0),
        }
        .build()?;
        let mut rng = StdRng::seed_from_u64(0);
        let output = pad.apply(
            &mut rng,
            ArraySample {
                image: RgbImage::new(3, 3),
                labels: vec![],
            },
        )?;
        assert_eq!(output.image.dimensions(), (3, 3));
        Ok(())
    }

    #[test]
    fn pad_fills_empty_image() -> Result<()> {
        let pad: PadIfNeededInit = serde_json::from_str(
            r#"{"min_height": 3, "min_width": 4, "border_mode": 4, "value": 7}"#,
        )?;
        let pad = pad.build()?;

        let mut rng = StdRng::seed_from_u64(0);
        let output = pad.apply(
            &mut rng,
            ArraySample {
                image: RgbImage::new(0, 2),
                labels: vec![],
            },
        )?;

        assert_eq!(output.image.dimensions(), (4, 3));
        assert!(output.image.pixels().all(|pixel| pixel == &Rgb([7, 7, 7])));
        Ok(())
    }
}
