pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use approx::abs_diff_eq;
pub use bbox::{prelude::*, BoxFormat, Size, Transform, TLBR};
pub use image::{imageops, imageops::FilterType, Rgb, RgbImage};
pub use indexmap::IndexMap;
pub use itertools::{iproduct, izip, Itertools as _};
pub use label::Label;
pub use log::{debug, info, warn};
pub use noisy_float::prelude::*;
pub use once_cell::sync::Lazy;
pub use rand::{prelude::*, RngCore};
pub use rand_distr::StandardNormal;
pub use serde::{de::DeserializeOwned, Deserialize, Serialize};
pub use std::{
    borrow::Cow,
    fmt::{self, Debug, Display},
    iter,
    mem,
};
pub use tch::{Device, IndexOp, Kind, Tensor};

/// A pixel-space box with its class id.
pub type LabeledBox = Label<TLBR<f64>, i64>;
