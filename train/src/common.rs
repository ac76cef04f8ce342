//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use augment::{BoxFormat, ImageMeta, MetaValue, Pipeline, PipelineConfig, Sample, TensorSample};
pub use bbox::{prelude::*, Size, TLBR};
pub use chrono::{DateTime, Local};
pub use image::RgbImage;
pub use indexmap::IndexMap;
pub use itertools::{izip, Itertools};
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng, seq::SliceRandom};
pub use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    borrow::Borrow,
    collections::{HashMap, HashSet},
    fmt::{self, Debug, Display},
    fs,
    io::{BufReader, BufWriter},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
pub use tch::{
    nn::{self, OptimizerConfig as _},
    Device, Kind, Tensor,
};
pub use tfrecord::{EventWriter, EventWriterInit};
pub use tracing::{debug, info, info_span, warn};
