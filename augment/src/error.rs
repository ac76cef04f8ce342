//! Pipeline construction errors.

use crate::common::*;
use thiserror::Error;

/// The two stages of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Array-domain transforms applied jointly to the image and its boxes.
    Geometric,
    /// Transforms applied to the converted float tensor.
    Tensor,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Geometric => "albu",
            Self::Tensor => "torch",
        };
        f.write_str(text)
    }
}

/// The error raised when a pipeline cannot be built from its configuration.
///
/// It is always raised by [Pipeline::new](crate::Pipeline::new), before any
/// sample is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown {stage} step '{name}'")]
    UnknownStep { stage: Stage, name: String },
    #[error("invalid parameters for {stage} step '{name}'")]
    InvalidStep {
        stage: Stage,
        name: String,
        #[source]
        source: Error,
    },
    #[error("the torch stage must start with exactly one 'ToTensor' step")]
    MisplacedToTensor,
    #[error("the torch step '{name}' is declared more than once")]
    DuplicateStep { name: String },
}

impl ConfigError {
    /// The stage whose configuration is at fault.
    pub fn stage(&self) -> Stage {
        match *self {
            Self::UnknownStep { stage, .. } | Self::InvalidStep { stage, .. } => stage,
            Self::MisplacedToTensor | Self::DuplicateStep { .. } => Stage::Tensor,
        }
    }
}
