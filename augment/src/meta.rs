//! Per-sample metadata carried alongside the image.

use crate::common::*;

/// The key under which the applied normalization mean is recorded.
pub const NORM_MEAN_KEY: &str = "norm_mean";
/// The key under which the applied normalization standard deviation is recorded.
pub const NORM_STD_KEY: &str = "norm_std";

/// A metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Floats(Vec<f64>),
    Text(String),
}

impl MetaValue {
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Self::Floats(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<f64>> for MetaValue {
    fn from(values: Vec<f64>) -> Self {
        Self::Floats(values)
    }
}

impl From<String> for MetaValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MetaValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// Append-only metadata of one sample.
///
/// Stages may add entries but never remove or change them, so whatever a
/// consumer reads after the pipeline is what every stage agreed on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageMeta {
    entries: IndexMap<String, MetaValue>,
}

impl ImageMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    ///
    /// Inserting an existing key is accepted only if the value is identical.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Result<()>
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        let key = key.into();
        let value = value.into();

        match self.entries.get(&key) {
            Some(prev) => {
                ensure!(
                    *prev == value,
                    "metadata entry '{}' is already set to {:?}",
                    key,
                    prev
                );
            }
            None => {
                self.entries.insert(key, value);
            }
        }

        Ok(())
    }

    /// Builder-style [insert](Self::insert).
    pub fn with<K, V>(mut self, key: K, value: V) -> Result<Self>
    where
        K: Into<String>,
        V: Into<MetaValue>,
    {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// The per-channel mean applied by the normalization step, if any.
    pub fn norm_mean(&self) -> Option<&[f64]> {
        self.get(NORM_MEAN_KEY)?.as_floats()
    }

    /// The per-channel standard deviation applied by the normalization step, if any.
    pub fn norm_std(&self) -> Option<&[f64]> {
        self.get(NORM_STD_KEY)?.as_floats()
    }

    /// Undo the recorded normalization on a `[C, H, W]` or `[B, C, H, W]` tensor.
    ///
    /// The tensor is returned unchanged if no normalization was recorded.
    pub fn denormalize(&self, image: &Tensor) -> Result<Tensor> {
        let (mean, std) = match (self.norm_mean(), self.norm_std()) {
            (Some(mean), Some(std)) => (mean, std),
            (None, None) => return Ok(image.shallow_clone()),
            _ => bail!("only one of '{}' and '{}' is recorded", NORM_MEAN_KEY, NORM_STD_KEY),
        };
        ensure!(
            mean.len() == std.len(),
            "normalization mean and std lengths differ"
        );

        let size = image.size();
        ensure!(
            size.len() == 3 || size.len() == 4,
            "expect a [C, H, W] or [B, C, H, W] tensor, but get shape {:?}",
            size
        );
        let channels = size[size.len() - 3];
        ensure!(
            channels as usize == mean.len(),
            "the image has {} channels, but {} normalization values are recorded",
            channels,
            mean.len()
        );

        let to_tensor = |values: &[f64]| {
            let values: Vec<f32> = values.iter().map(|&value| value as f32).collect();
            Tensor::of_slice(&values)
                .view([channels, 1, 1])
                .to_device(image.device())
        };
        let mean = to_tensor(mean);
        let std = to_tensor(std);

        Ok(image * std + mean)
    }
}
