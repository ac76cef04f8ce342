use anyhow::{ensure, format_err, Result};
use bbox::{prelude::*, TLBR};
use image::{Rgb, RgbImage};
use tch::{Kind, Tensor};

pub const BOX_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Convert a `[3, H, W]` float tensor in `[0, 1]` into an RGB image.
pub fn tensor_to_image(tensor: &Tensor) -> Result<RgbImage> {
    let (channels, height, width) = tensor.size3()?;
    ensure!(
        channels == 3,
        "expect 3 channels, but get {} channels",
        channels
    );

    let pixels = tch::no_grad(|| {
        tensor
            .to_device(tch::Device::Cpu)
            .to_kind(Kind::Float)
            .clamp(0.0, 1.0)
            .g_mul_scalar(255.0)
            .round()
            .to_kind(Kind::Uint8)
            .permute(&[1, 2, 0])
            .contiguous()
    });
    let pixels = Vec::<u8>::from(&pixels);

    RgbImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| format_err!("the pixel buffer does not match the image size"))
}

/// Draw a one pixel outline of the rectangle, clipped to the image.
pub fn draw_rect(canvas: &mut RgbImage, rect: &TLBR<f64>, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let max_x = width as f64 - 1.0;
    let max_y = height as f64 - 1.0;

    if rect.r() < 0.0 || rect.b() < 0.0 || rect.l() > max_x || rect.t() > max_y {
        return;
    }

    let l = rect.l().max(0.0).round() as u32;
    let t = rect.t().max(0.0).round() as u32;
    let r = rect.r().min(max_x).round() as u32;
    let b = rect.b().min(max_y).round() as u32;

    for x in l..=r {
        canvas.put_pixel(x, t, color);
        canvas.put_pixel(x, b, color);
    }
    for y in t..=b {
        canvas.put_pixel(l, y, color);
        canvas.put_pixel(r, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_converts_to_pixels() -> Result<()> {
        let tensor = Tensor::ones(&[3, 2, 4], (Kind::Float, tch::Device::Cpu));
        let _ = tensor.get(0).fill_(0.0);
        let image = tensor_to_image(&tensor)?;
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(3, 1), &Rgb([0, 255, 255]));
        Ok(())
    }

    #[test]
    fn rect_outline_is_clipped() {
        let mut canvas = RgbImage::new(8, 6);
        let rect = TLBR::from_tlbr([2.0, 3.0, 10.0, 20.0]);
        draw_rect(&mut canvas, &rect, BOX_COLOR);

        assert_eq!(canvas.get_pixel(3, 2), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(7, 5), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(3, 5), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(5, 4), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(1, 2), &Rgb([0, 0, 0]));

        // entirely outside
        let mut canvas = RgbImage::new(8, 6);
        draw_rect(&mut canvas, &TLBR::from_tlbr([-5.0, -5.0, -1.0, -1.0]), BOX_COLOR);
        assert!(canvas.pixels().all(|pixel| pixel == &Rgb([0, 0, 0])));
    }
}
