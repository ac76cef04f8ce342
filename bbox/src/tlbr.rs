use super::Rect;
use crate::{common::*, Transform};

/// Bounding box in TLBR format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TLBR<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) b: T,
    pub(crate) r: T,
}

impl<T> TLBR<T>
where
    T: Copy + Num,
{
    pub fn transform(&self, transform: &Transform<T>) -> Self {
        TLBR {
            t: self.t * transform.sy + transform.ty,
            l: self.l * transform.sx + transform.tx,
            b: self.b * transform.sy + transform.ty,
            r: self.r * transform.sx + transform.tx,
        }
    }
}

impl<T> TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    /// Mirror the box around the vertical center line of an image of width `width`.
    pub fn flip_horizontal(&self, width: T) -> Self {
        TLBR {
            t: self.t,
            l: width - self.r,
            b: self.b,
            r: width - self.l,
        }
    }

    /// Mirror the box around the horizontal center line of an image of height `height`.
    pub fn flip_vertical(&self, height: T) -> Self {
        TLBR {
            t: height - self.b,
            l: self.l,
            b: height - self.t,
            r: self.r,
        }
    }
}

impl<T> TLBR<T>
where
    T: Float,
{
    /// The smallest box enclosing all points.
    ///
    /// Returns `None` if `points` is empty.
    pub fn enclosing_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [T; 2]>,
    {
        points.into_iter().fold(None, |acc, [y, x]| {
            let rect = match acc {
                Some(TLBR { t, l, b, r }) => TLBR {
                    t: t.min(y),
                    l: l.min(x),
                    b: b.max(y),
                    r: r.max(x),
                },
                None => TLBR {
                    t: y,
                    l: x,
                    b: y,
                    r: x,
                },
            };
            Some(rect)
        })
    }

    /// The corners in `[y, x]` order: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [[T; 2]; 4] {
        [
            [self.t, self.l],
            [self.t, self.r],
            [self.b, self.l],
            [self.b, self.r],
        ]
    }
}

impl<T> Rect for TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        self.t
    }

    fn l(&self) -> Self::Type {
        self.l
    }

    fn b(&self) -> Self::Type {
        self.b
    }

    fn r(&self) -> Self::Type {
        self.r
    }

    fn cy(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.t + (self.b - self.t) / two
    }

    fn cx(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.l + (self.r - self.l) / two
    }

    fn h(&self) -> Self::Type {
        self.b - self.t
    }

    fn w(&self) -> Self::Type {
        self.r - self.l
    }

    fn try_from_tlbr(tlbr: [T; 4]) -> Result<Self> {
        let [t, l, b, r] = tlbr;
        ensure!(b >= t && r >= l, "b >= t and r >= l must hold");
        Ok(Self { t, l, b, r })
    }

    fn try_from_xywh(xywh: [T; 4]) -> Result<Self> {
        let [x, y, w, h] = xywh;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "box height and width must be non-negative"
        );
        Ok(Self {
            t: y,
            l: x,
            b: y + h,
            r: x + w,
        })
    }

    fn try_from_cxcywh(cxcywh: [T; 4]) -> Result<Self> {
        let [cx, cy, w, h] = cxcywh;
        let zero = T::zero();
        let two = T::one() + T::one();
        ensure!(
            h >= zero && w >= zero,
            "box height and width must be non-negative"
        );
        Ok(Self {
            t: cy - h / two,
            l: cx - w / two,
            b: cy + h / two,
            r: cx + w / two,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;

    #[test]
    fn tlbr_flip() {
        let rect = TLBR::from_tlbr([10.0, 20.0, 30.0, 60.0]);
        assert_eq!(rect.flip_horizontal(100.0).tlbr(), [10.0, 40.0, 30.0, 80.0]);
        assert_eq!(rect.flip_vertical(50.0).tlbr(), [20.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn tlbr_enclosing_points() {
        let rect = TLBR::from_tlbr([10.0, 20.0, 30.0, 60.0]);
        let enclosing = TLBR::enclosing_points(rect.corners()).unwrap();
        assert_eq!(enclosing, rect);
        assert!(TLBR::<f64>::enclosing_points([]).is_none());
    }

    #[test]
    fn tlbr_reject_inverted() {
        assert!(TLBR::try_from_tlbr([10.0, 0.0, 5.0, 1.0]).is_err());
        assert!(TLBR::try_from_xywh([0.0, 0.0, -1.0, 1.0]).is_err());
    }
}
