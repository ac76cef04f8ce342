//! Plain four-number box encodings.

use crate::{common::*, Rect, RectNum, TLBR};

/// The layout of a plain `[f64; 4]` bounding box.
///
/// A run declares exactly one format and every consumer of plain boxes
/// (pipeline input/output, loss, detection decode) agrees on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoxFormat {
    /// `[center_x, center_y, width, height]`
    #[serde(rename = "cxcywh")]
    CxCyWH,
    /// `[top_left_x, top_left_y, width, height]`
    #[serde(rename = "xywh")]
    XYWH,
}

impl BoxFormat {
    pub fn decode<T>(&self, values: [T; 4]) -> Result<TLBR<T>>
    where
        T: Copy + Num + PartialOrd,
    {
        match self {
            Self::CxCyWH => TLBR::try_from_cxcywh(values),
            Self::XYWH => TLBR::try_from_xywh(values),
        }
    }

    pub fn encode<R>(&self, rect: &R) -> [R::Type; 4]
    where
        R: Rect,
        R::Type: Num + PartialOrd,
    {
        match self {
            Self::CxCyWH => rect.cxcywh(),
            Self::XYWH => rect.xywh(),
        }
    }
}

impl FromStr for BoxFormat {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let format = match text {
            "cxcywh" => Self::CxCyWH,
            "xywh" => Self::XYWH,
            _ => return Err(format_err!("unknown box format '{}'", text)),
        };
        Ok(format)
    }
}

impl fmt::Display for BoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CxCyWH => "cxcywh",
            Self::XYWH => "xywh",
        };
        f.write_str(text)
    }
}
