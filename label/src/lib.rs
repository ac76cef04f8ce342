//! Bounding boxes paired with their class labels.

use anyhow::{ensure, Result};
use bbox::{Rect, RectFloat, Size, Transform, TLBR};
use num_traits::{Float, Num};
use std::ops::Mul;

/// A rectangle together with its class.
///
/// Geometric transforms move labels as a whole so a box can never be dropped
/// without its class, or the other way around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<R, C>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
}

impl<T, C> Label<TLBR<T>, C>
where
    T: Float,
    C: Copy,
{
    /// Clip the box to the image frame, or `None` if it falls outside.
    pub fn clip_to(&self, size: &Size<T>) -> Option<Self> {
        let rect = self.rect.clip_to(size)?;
        Some(Label {
            rect,
            class: self.class,
        })
    }
}

impl<'a, T, C> Mul<&'a Label<TLBR<T>, C>> for &'a Transform<T>
where
    T: Copy + Num + PartialOrd,
    C: Copy,
{
    type Output = Label<TLBR<T>, C>;

    fn mul(self, rhs: &'a Label<TLBR<T>, C>) -> Self::Output {
        Label {
            rect: self * &rhs.rect,
            class: rhs.class,
        }
    }
}

/// Pair up parallel sequences of boxes and classes.
pub fn zip_labels<R, C, IR, IC>(rects: IR, classes: IC) -> Result<Vec<Label<R, C>>>
where
    R: Rect,
    IR: IntoIterator<Item = R>,
    IC: IntoIterator<Item = C>,
{
    let rects: Vec<_> = rects.into_iter().collect();
    let classes: Vec<_> = classes.into_iter().collect();
    ensure!(
        rects.len() == classes.len(),
        "the number of boxes ({}) and labels ({}) must be equal",
        rects.len(),
        classes.len()
    );

    let labels = rects
        .into_iter()
        .zip(classes)
        .map(|(rect, class)| Label { rect, class })
        .collect();
    Ok(labels)
}

/// Split labels back into parallel sequences of boxes and classes.
pub fn unzip_labels<R, C, I>(labels: I) -> (Vec<R>, Vec<C>)
where
    R: Rect,
    I: IntoIterator<Item = Label<R, C>>,
{
    labels
        .into_iter()
        .map(|Label { rect, class }| (rect, class))
        .unzip()
}
