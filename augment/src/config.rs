//! Declarative pipeline configuration.

use crate::common::*;
use serde_json::{Map, Value};

/// The two ordered step lists of a pipeline.
///
/// ```json5
/// {
///     albu: [{ name: "Resize", height: 320, width: 320 }],
///     torch: [{ name: "ToTensor" }, { name: "Normalize", mean: [0.485, 0.456, 0.406], std: [0.229, 0.224, 0.225] }],
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Geometric steps applied jointly to the image, boxes and labels.
    #[serde(default)]
    pub albu: Vec<StepConfig>,
    /// Tensor steps applied to the converted image.
    #[serde(default)]
    pub torch: Vec<StepConfig>,
}

/// One step: the name of a transform plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(alias = "type")]
    pub name: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl StepConfig {
    pub fn new<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter.
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Deserialize the parameters into the typed options of a transform.
    pub fn parse_params<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let params = serde_json::from_value(Value::Object(self.params.clone()))?;
        Ok(params)
    }
}
