use super::{Rect, TLBR};
use crate::{common::*, RectNum, Size};

/// Axis-aligned scale followed by translation.
///
/// A point `(y, x)` maps to `(y * sy + ty, x * sx + tx)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transform<T> {
    pub sy: T,
    pub sx: T,
    pub ty: T,
    pub tx: T,
}

impl<T> Transform<T>
where
    T: Copy + Num + PartialOrd,
{
    pub fn from_rects<R>(src: &R, tgt: &R) -> Self
    where
        R: Rect<Type = T>,
    {
        let sy = tgt.h() / src.h();
        let sx = tgt.w() / src.w();
        let ty = tgt.t() - src.t() * sy;
        let tx = tgt.l() - src.l() * sx;

        Self { sy, sx, ty, tx }
    }

    /// The transform that stretches an image of `src_size` onto `tgt_size`.
    pub fn from_sizes_exact(src_size: &Size<T>, tgt_size: &Size<T>) -> Self {
        let src = TLBR::from_xywh([T::zero(), T::zero(), src_size.w(), src_size.h()]);
        let tgt = TLBR::from_xywh([T::zero(), T::zero(), tgt_size.w(), tgt_size.h()]);
        Self::from_rects(&src, &tgt)
    }

    pub fn translation(ty: T, tx: T) -> Self {
        Self {
            sy: T::one(),
            sx: T::one(),
            ty,
            tx,
        }
    }
}

impl<T> Mul<&TLBR<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = TLBR<T>;

    fn mul(self, rhs: &TLBR<T>) -> Self::Output {
        rhs.transform(self)
    }
}

impl<T> Mul<&Transform<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = Transform<T>;

    fn mul(self, rhs: &Transform<T>) -> Self::Output {
        Transform {
            sx: self.sx * rhs.sx,
            sy: self.sy * rhs.sy,
            tx: rhs.tx * self.sx + self.tx,
            ty: rhs.ty * self.sy + self.ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_resize_exact() {
        let transform =
            Transform::from_sizes_exact(&Size::from_hw([80.0, 80.0]), &Size::from_hw([20.0, 40.0]));
        let expect = Transform {
            sx: 0.5,
            sy: 0.25,
            tx: 0.0,
            ty: 0.0,
        };
        assert_eq!(transform, expect);
    }

    #[test]
    fn transform_compose_with_translation() {
        let scale =
            Transform::from_sizes_exact(&Size::from_hw([10.0, 10.0]), &Size::from_hw([20.0, 20.0]));
        let shift = Transform::translation(3.0, 5.0);
        let rect = TLBR::from_tlbr([1.0, 1.0, 2.0, 2.0]);

        let composed = &shift * &scale;
        assert_eq!(&composed * &rect, &shift * &(&scale * &rect));
        assert_eq!((&composed * &rect).tlbr(), [5.0, 7.0, 7.0, 9.0]);
    }
}
