use crate::common::*;

/// Image or box extent in pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Size<T> {
    h: T,
    w: T,
}

impl<T> Size<T>
where
    T: Num + PartialOrd + Copy,
{
    pub fn try_from_hw(hw: [T; 2]) -> Result<Self> {
        let [h, w] = hw;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "height and width parameters must be non-negative"
        );
        Ok(Self { h, w })
    }

    pub fn from_hw(hw: [T; 2]) -> Self {
        Self::try_from_hw(hw).unwrap()
    }

    pub fn area(&self) -> T {
        self.w * self.h
    }

    pub fn w(&self) -> T {
        self.w
    }

    pub fn h(&self) -> T {
        self.h
    }

    pub fn hw(&self) -> [T; 2] {
        [self.h, self.w]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn size_area() {
        let size = Size::from_hw([3.0, 2.0]);
        let area: f64 = size.area();
        assert_abs_diff_eq!(area, 6.0);
        assert!(Size::try_from_hw([-1.0, 2.0]).is_err());
    }
}
