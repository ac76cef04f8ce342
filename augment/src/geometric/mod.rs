//! Array-domain transforms applied jointly to an image and its boxes.
//!
//! Every transform receives the image together with its labeled boxes, so a
//! box that leaves the image is dropped along with its class. After each
//! transform the boxes lie within the image frame.

mod bbox_safe_crop;
mod channel_shuffle;
mod color_jitter;
mod flip;
mod pad;
mod resize;
mod rgb_shift;
mod shift_scale_rotate;

pub use bbox_safe_crop::*;
pub use channel_shuffle::*;
pub use color_jitter::*;
pub use flip::*;
pub use pad::*;
pub use resize::*;
pub use rgb_shift::*;
pub use shift_scale_rotate::*;

use crate::common::*;

/// An array-domain image together with its labeled boxes in pixel units.
#[derive(Debug, Clone)]
pub struct ArraySample {
    pub image: RgbImage,
    pub labels: Vec<LabeledBox>,
}

impl ArraySample {
    pub fn size(&self) -> Size<f64> {
        image_size(&self.image)
    }
}

/// A transform of the geometric stage.
///
/// Random parameters are drawn from `rng` on every call. Implementations
/// must return boxes that lie within the returned image.
pub trait GeometricTransform: Debug + Send + Sync {
    fn apply(&self, rng: &mut dyn RngCore, sample: ArraySample) -> Result<ArraySample>;
}

/// All geometric steps of a pipeline, applied as one group.
#[derive(Debug)]
pub struct GeometricCompose {
    format: BoxFormat,
    transforms: Vec<(String, Box<dyn GeometricTransform>)>,
}

impl GeometricCompose {
    pub fn new(format: BoxFormat, transforms: Vec<(String, Box<dyn GeometricTransform>)>) -> Self {
        Self { format, transforms }
    }

    pub fn format(&self) -> BoxFormat {
        self.format
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.transforms.iter().map(|(name, _)| name.as_str())
    }

    /// Run all steps on an image with plain boxes in the declared format.
    ///
    /// Boxes are clipped to the input image first; boxes with nothing left
    /// inside the image are dropped together with their labels.
    pub fn forward(
        &self,
        rng: &mut dyn RngCore,
        image: RgbImage,
        boxes: &[[f64; 4]],
        labels: &[i64],
    ) -> Result<(RgbImage, Vec<[f64; 4]>, Vec<i64>)> {
        let rects: Vec<_> = boxes
            .iter()
            .map(|&values| self.format.decode(values))
            .try_collect()?;
        let labels = label::zip_labels(rects, labels.iter().cloned())?;
        let size = image_size(&image);
        let labels = clip_labels(labels, &size);

        let mut sample = ArraySample { image, labels };
        for (name, transform) in &self.transforms {
            sample = transform
                .apply(rng, sample)
                .with_context(|| format!("the geometric step '{}' failed", name))?;
        }

        let ArraySample { image, labels } = sample;
        let (rects, labels) = label::unzip_labels(labels);
        let boxes = rects.iter().map(|rect| self.format.encode(rect)).collect();

        Ok((image, boxes, labels))
    }
}

/// A random range given either as a single magnitude `x`, meaning `(-x, x)`,
/// or as an explicit `(low, high)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Limit {
    Symmetric(R64),
    Range(R64, R64),
}

impl Limit {
    pub fn to_range(&self) -> Result<(f64, f64)> {
        let (low, high) = match *self {
            Self::Symmetric(limit) => {
                ensure!(limit >= 0.0, "the limit must be non-negative");
                (-limit.raw(), limit.raw())
            }
            Self::Range(low, high) => {
                ensure!(low <= high, "the lower limit must not exceed the upper limit");
                (low.raw(), high.raw())
            }
        };
        Ok((low, high))
    }
}

/// Pixel extrapolation at the image border, numbered as in OpenCV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BorderMode {
    /// `iiiiii|abcdefgh|iiiiiii` with a fill value `i`
    Constant,
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
    /// `fedcba|abcdefgh|hgfedcb`
    Reflect,
    /// `cdefgh|abcdefgh|abcdefg`
    Wrap,
    /// `gfedcb|abcdefgh|gfedcba`
    Reflect101,
}

impl BorderMode {
    /// Map an index outside `0..len` back into the image, or `None` for the fill value.
    ///
    /// An empty axis has nothing to map to and always yields `None`.
    pub fn map_index(&self, index: i64, len: i64) -> Option<i64> {
        if len <= 0 {
            return None;
        }
        if (0..len).contains(&index) {
            return Some(index);
        }

        let mapped = match self {
            Self::Constant => return None,
            Self::Replicate => index.clamp(0, len - 1),
            Self::Reflect => {
                let period = 2 * len;
                let index = index.rem_euclid(period);
                if index >= len {
                    period - 1 - index
                } else {
                    index
                }
            }
            Self::Wrap => index.rem_euclid(len),
            Self::Reflect101 => {
                if len == 1 {
                    return Some(0);
                }
                let period = 2 * len - 2;
                let index = index.rem_euclid(period);
                if index >= len {
                    period - index
                } else {
                    index
                }
            }
        };
        Some(mapped)
    }
}

impl Default for BorderMode {
    fn default() -> Self {
        Self::Reflect101
    }
}

impl TryFrom<u8> for BorderMode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        let mode = match code {
            0 => Self::Constant,
            1 => Self::Replicate,
            2 => Self::Reflect,
            3 => Self::Wrap,
            4 => Self::Reflect101,
            _ => return Err(format!("unsupported border mode {}", code)),
        };
        Ok(mode)
    }
}

impl From<BorderMode> for u8 {
    fn from(mode: BorderMode) -> Self {
        match mode {
            BorderMode::Constant => 0,
            BorderMode::Replicate => 1,
            BorderMode::Reflect => 2,
            BorderMode::Wrap => 3,
            BorderMode::Reflect101 => 4,
        }
    }
}

/// The fill color of constant borders, as one gray level or per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Gray(u8),
    Rgb([u8; 3]),
}

impl FillValue {
    pub fn to_rgb(&self) -> [u8; 3] {
        match *self {
            Self::Gray(value) => [value; 3],
            Self::Rgb(rgb) => rgb,
        }
    }
}

impl Default for FillValue {
    fn default() -> Self {
        Self::Gray(0)
    }
}

pub(crate) fn image_size(image: &RgbImage) -> Size<f64> {
    let (width, height) = image.dimensions();
    Size::from_hw([height as f64, width as f64])
}

/// Clip boxes to the frame and drop those that vanish.
pub(crate) fn clip_labels<I>(labels: I, size: &Size<f64>) -> Vec<LabeledBox>
where
    I: IntoIterator<Item = LabeledBox>,
{
    labels
        .into_iter()
        .filter_map(|label| label.clip_to(size))
        .filter(|label| {
            !(abs_diff_eq!(label.rect.h(), 0.0) || abs_diff_eq!(label.rect.w(), 0.0))
        })
        .collect()
}

/// Roll the dice for a transform applied with probability `p`.
pub(crate) fn should_apply(rng: &mut dyn RngCore, p: f64) -> bool {
    rng.gen::<f64>() < p
}

/// Sample uniformly from `[low, high)`, or return `low` for an empty range.
pub(crate) fn uniform(rng: &mut dyn RngCore, (low, high): (f64, f64)) -> f64 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

pub(crate) fn default_p_one() -> R64 {
    r64(1.0)
}

pub(crate) fn default_p_half() -> R64 {
    r64(0.5)
}

pub(crate) fn check_prob(p: R64) -> Result<f64> {
    ensure!((0.0..=1.0).contains(&p.raw()), "p must be within [0, 1]");
    Ok(p.raw())
}

/// Bilinear interpolation of the pixel at fractional position `(y, x)`.
pub(crate) fn sample_bilinear(
    image: &RgbImage,
    y: f64,
    x: f64,
    border: BorderMode,
    fill: [u8; 3],
) -> Rgb<u8> {
    let (width, height) = image.dimensions();
    let (height, width) = (height as i64, width as i64);

    let y0 = y.floor();
    let x0 = x.floor();
    let fy = y - y0;
    let fx = x - x0;
    let (y0, x0) = (y0 as i64, x0 as i64);

    let fetch = |row: i64, col: i64| -> [f64; 3] {
        let pixel = match (
            border.map_index(row, height),
            border.map_index(col, width),
        ) {
            (Some(row), Some(col)) => image.get_pixel(col as u32, row as u32).0,
            _ => fill,
        };
        pixel.map(|value| value as f64)
    };

    let tl = fetch(y0, x0);
    let tr = fetch(y0, x0 + 1);
    let bl = fetch(y0 + 1, x0);
    let br = fetch(y0 + 1, x0 + 1);

    let mut output = [0u8; 3];
    izip!(&mut output, tl, tr, bl, br).for_each(|(out, tl, tr, bl, br)| {
        let top = tl * (1.0 - fx) + tr * fx;
        let bottom = bl * (1.0 - fx) + br * fx;
        let value = top * (1.0 - fy) + bottom * fy;
        *out = value.round().clamp(0.0, 255.0) as u8;
    });

    Rgb(output)
}
