//! Name-based dispatch of configured steps.
//!
//! Each stage has two catalogs. A step name is looked up in the built-in
//! catalog first and in the extension catalog on a miss.

use crate::{
    common::*,
    config::StepConfig,
    error::{ConfigError, Stage},
    geometric::*,
    tensor::*,
};

pub type GeometricFactory = fn(&StepConfig) -> Result<Box<dyn GeometricTransform>>;
pub type TensorFactory = fn(&StepConfig, &mut dyn RngCore) -> Result<TensorStep>;

/// The catalog a step name was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Builtin,
    Extension,
}

static GEOMETRIC_BUILTINS: Lazy<IndexMap<&'static str, GeometricFactory>> = Lazy::new(|| {
    let mut catalog: IndexMap<&'static str, GeometricFactory> = IndexMap::new();
    catalog.insert("Resize", |step| {
        Ok(Box::new(step.parse_params::<ResizeInit>()?.build()?))
    });
    catalog.insert("PadIfNeeded", |step| {
        Ok(Box::new(step.parse_params::<PadIfNeededInit>()?.build()?))
    });
    catalog.insert("HorizontalFlip", |step| {
        Ok(Box::new(step.parse_params::<HorizontalFlipInit>()?.build()?))
    });
    catalog.insert("VerticalFlip", |step| {
        Ok(Box::new(step.parse_params::<VerticalFlipInit>()?.build()?))
    });
    catalog.insert("ShiftScaleRotate", |step| {
        Ok(Box::new(step.parse_params::<ShiftScaleRotateInit>()?.build()?))
    });
    catalog.insert("ColorJitter", |step| {
        Ok(Box::new(step.parse_params::<ColorJitterInit>()?.build()?))
    });
    catalog.insert("RGBShift", |step| {
        Ok(Box::new(step.parse_params::<RgbShiftInit>()?.build()?))
    });
    catalog
});

static GEOMETRIC_EXTENSIONS: Lazy<IndexMap<&'static str, GeometricFactory>> = Lazy::new(|| {
    let mut catalog: IndexMap<&'static str, GeometricFactory> = IndexMap::new();
    catalog.insert("ChannelShuffle", |step| {
        Ok(Box::new(step.parse_params::<ChannelShuffleInit>()?.build()?))
    });
    catalog.insert("RandomSizedBBoxSafeCrop", |step| {
        Ok(Box::new(
            step.parse_params::<RandomSizedBBoxSafeCropInit>()?.build()?,
        ))
    });
    catalog
});

static TENSOR_BUILTINS: Lazy<IndexMap<&'static str, TensorFactory>> = Lazy::new(|| {
    let mut catalog: IndexMap<&'static str, TensorFactory> = IndexMap::new();
    catalog.insert("ToTensor", |step, _rng| {
        Ok(TensorStep::ToTensor(
            step.parse_params::<ToTensorInit>()?.build()?,
        ))
    });
    catalog.insert("Normalize", |step, _rng| {
        Ok(TensorStep::Normalize(
            step.parse_params::<NormalizeInit>()?.build()?,
        ))
    });
    catalog
});

static TENSOR_EXTENSIONS: Lazy<IndexMap<&'static str, TensorFactory>> = Lazy::new(|| {
    let mut catalog: IndexMap<&'static str, TensorFactory> = IndexMap::new();
    catalog.insert("GridErasing", |step, _rng| {
        Ok(TensorStep::Transform(Box::new(
            step.parse_params::<GridErasingInit>()?.build()?,
        )))
    });
    catalog.insert("Dropout", |step, rng| {
        Ok(TensorStep::Transform(Box::new(
            step.parse_params::<DropoutInit>()?.build(rng)?,
        )))
    });
    catalog
});

/// Find the catalog that provides a step name.
pub fn lookup(stage: Stage, name: &str) -> Option<Tier> {
    let (builtins, extensions) = match stage {
        Stage::Geometric => (
            GEOMETRIC_BUILTINS.contains_key(name),
            GEOMETRIC_EXTENSIONS.contains_key(name),
        ),
        Stage::Tensor => (
            TENSOR_BUILTINS.contains_key(name),
            TENSOR_EXTENSIONS.contains_key(name),
        ),
    };

    if builtins {
        Some(Tier::Builtin)
    } else if extensions {
        Some(Tier::Extension)
    } else {
        None
    }
}

/// All step names known to a stage, built-ins first.
pub fn step_names(stage: Stage) -> Vec<&'static str> {
    let (builtins, extensions): (Vec<_>, Vec<_>) = match stage {
        Stage::Geometric => (
            GEOMETRIC_BUILTINS.keys().copied().collect(),
            GEOMETRIC_EXTENSIONS.keys().copied().collect(),
        ),
        Stage::Tensor => (
            TENSOR_BUILTINS.keys().copied().collect(),
            TENSOR_EXTENSIONS.keys().copied().collect(),
        ),
    };
    builtins.into_iter().chain(extensions).collect()
}

/// Build a geometric step from its configuration.
pub fn build_geometric(step: &StepConfig) -> Result<Box<dyn GeometricTransform>, ConfigError> {
    let name = step.name.as_str();
    let factory = GEOMETRIC_BUILTINS
        .get(name)
        .or_else(|| GEOMETRIC_EXTENSIONS.get(name))
        .ok_or_else(|| ConfigError::UnknownStep {
            stage: Stage::Geometric,
            name: name.to_owned(),
        })?;

    factory(step).map_err(|source| ConfigError::InvalidStep {
        stage: Stage::Geometric,
        name: name.to_owned(),
        source,
    })
}

/// Build a tensor step from its configuration.
///
/// `rng` is only consumed by steps that draw parameters at construction.
pub fn build_tensor(step: &StepConfig, rng: &mut dyn RngCore) -> Result<TensorStep, ConfigError> {
    let name = step.name.as_str();
    let factory = TENSOR_BUILTINS
        .get(name)
        .or_else(|| TENSOR_EXTENSIONS.get(name))
        .ok_or_else(|| ConfigError::UnknownStep {
            stage: Stage::Tensor,
            name: name.to_owned(),
        })?;

    factory(step, rng).map_err(|source| ConfigError::InvalidStep {
        stage: Stage::Tensor,
        name: name.to_owned(),
        source,
    })
}
