pub use anyhow::{ensure, format_err, Result};
pub use num_traits::{Float, Num, Zero};
pub use serde::{Deserialize, Serialize};
pub use std::{
    fmt,
    ops::Mul,
    str::FromStr,
};
