use crate::common::*;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToTensorInit {}

impl ToTensorInit {
    pub fn build(self) -> Result<ToTensor> {
        Ok(ToTensor)
    }
}

/// Converts an `H×W×3` image to a `[3, H, W]` float tensor.
///
/// Pixel values are kept in `[0, 255]`; rescaling is left to the caller.
#[derive(Debug, Clone)]
pub struct ToTensor;

impl ToTensor {
    pub fn convert(&self, image: &RgbImage) -> Result<Tensor> {
        let (width, height) = image.dimensions();
        ensure!(
            width > 0 && height > 0,
            "image dimensions must be positive, but get {}x{}",
            width,
            height
        );

        let tensor = Tensor::of_slice(image.as_raw())
            .view([height as i64, width as i64, 3])
            .permute(&[2, 0, 1])
            .to_kind(Kind::Float)
            .contiguous();
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_is_channel_first() -> Result<()> {
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(2, 1, Rgb([10, 20, 255]));
        let tensor = ToTensor.convert(&image)?;

        assert_eq!(tensor.size(), vec![3, 2, 3]);
        assert_eq!(tensor.kind(), Kind::Float);
        assert_eq!(f64::from(tensor.i((0, 1, 2))), 10.0);
        assert_eq!(f64::from(tensor.i((1, 1, 2))), 20.0);
        assert_eq!(f64::from(tensor.i((2, 1, 2))), 255.0);
        assert_eq!(f64::from(tensor.i((2, 0, 0))), 0.0);
        Ok(())
    }

    #[test]
    fn convert_rejects_empty_image() {
        assert!(ToTensor.convert(&RgbImage::new(0, 4)).is_err());
    }
}
