use super::{Size, TLBR};
use crate::common::*;

/// The generic axis-aligned rectangle in pixel space.
///
/// The y axis points down, so `t <= b` and `l <= r` for every valid rectangle.
pub trait Rect {
    type Type;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn b(&self) -> Self::Type;
    fn r(&self) -> Self::Type;
    fn cy(&self) -> Self::Type;
    fn cx(&self) -> Self::Type;
    fn h(&self) -> Self::Type;
    fn w(&self) -> Self::Type;

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    /// Build from `[x, y, w, h]` where `(x, y)` is the top-left corner.
    fn try_from_xywh(xywh: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    /// Build from `[cx, cy, w, h]`.
    fn try_from_cxcywh(cxcywh: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd,
{
    fn from_tlbr(tlbr: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlbr(tlbr).unwrap()
    }

    fn from_xywh(xywh: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xywh(xywh).unwrap()
    }

    fn from_cxcywh(cxcywh: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_cxcywh(cxcywh).unwrap()
    }

    fn tlbr(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.b(), self.r()]
    }

    fn xywh(&self) -> [Self::Type; 4] {
        [self.l(), self.t(), self.w(), self.h()]
    }

    fn cxcywh(&self) -> [Self::Type; 4] {
        [self.cx(), self.cy(), self.w(), self.h()]
    }

    fn to_tlbr(&self) -> TLBR<Self::Type> {
        TLBR {
            t: self.t(),
            l: self.l(),
            b: self.b(),
            r: self.r(),
        }
    }

    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.h() * self.w()
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    fn intersect_with<R>(&self, other: &R) -> Option<TLBR<Self::Type>>
    where
        R: Rect<Type = Self::Type>,
    {
        let t = self.t().max(other.t());
        let l = self.l().max(other.l());
        let b = self.b().min(other.b());
        let r = self.r().min(other.r());
        (b > t && r > l).then(|| TLBR { t, l, b, r })
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        self.intersect_with(other)
            .map(|rect| rect.area())
            .unwrap_or_else(Self::Type::zero)
    }

    fn iou_with<R>(&self, other: &R, epsilon: Self::Type) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.area() - inter_area + epsilon;
        inter_area / union_area
    }

    /// Clip the rectangle to an image of the given size.
    ///
    /// Returns `None` if nothing with positive area is left.
    fn clip_to(&self, size: &Size<Self::Type>) -> Option<TLBR<Self::Type>> {
        let zero = Self::Type::zero();
        let frame = TLBR {
            t: zero,
            l: zero,
            b: size.h(),
            r: size.w(),
        };
        self.intersect_with(&frame)
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rect_iou() {
        let lhs = TLBR::from_tlbr([0.0, 0.0, 10.0, 10.0]);
        let rhs = TLBR::from_tlbr([5.0, 5.0, 15.0, 15.0]);
        assert_abs_diff_eq!(lhs.iou_with(&rhs, 0.0), 25.0 / 175.0);
        assert_abs_diff_eq!(lhs.iou_with(&lhs, 0.0), 1.0);
    }

    #[test]
    fn rect_clip() {
        let size = Size::from_hw([100.0, 50.0]);

        let partial = TLBR::from_tlbr([-10.0, 40.0, 20.0, 70.0]);
        let clipped = partial.clip_to(&size).unwrap();
        assert_eq!(clipped.tlbr(), [0.0, 40.0, 20.0, 50.0]);

        let outside = TLBR::from_tlbr([0.0, 60.0, 10.0, 80.0]);
        assert!(outside.clip_to(&size).is_none());

        let degenerate = TLBR::from_tlbr([10.0, 10.0, 10.0, 20.0]);
        assert!(degenerate.clip_to(&size).is_none());
    }
}
