#![forbid(unsafe_code)]

//! Pointer positions and pan offsets in CSS pixels.
//!
//! Both types hold `f64` coordinates because browsers report fractional
//! pointer positions on high-DPR displays. [`Pan`] is the only one that is
//! stored in [`ViewerState`](crate::viewer::ViewerState), and every constructor
//! path keeps its components finite.

use serde::{Deserialize, Serialize};

/// A pointer position relative to the board element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both coordinates are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Component-wise displacement `self - origin`.
    #[must_use]
    pub fn delta_from(self, origin: Self) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }
}

impl From<(f64, f64)> for PointerPosition {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Image translation applied while zoom-pan mode is active.
///
/// # Invariants
///
/// `x` and `y` are always finite. [`Pan::offset_clamped`] saturates to the
/// configured bound and replaces non-finite results with the bound itself.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pan {
    pub x: f64,
    pub y: f64,
}

impl Pan {
    /// The identity translation.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a pan, clamping each axis into `[-limit, limit]`.
    #[must_use]
    pub fn clamped(x: f64, y: f64, limit: f64) -> Self {
        Self {
            x: clamp_axis(x, limit),
            y: clamp_axis(y, limit),
        }
    }

    /// `self + (dx, dy)`, clamped per axis into `[-limit, limit]`.
    #[must_use]
    pub fn offset_clamped(self, dx: f64, dy: f64, limit: f64) -> Self {
        Self::clamped(self.x + dx, self.y + dy, limit)
    }

    /// Whether both components are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

fn clamp_axis(value: f64, limit: f64) -> f64 {
    let limit = if limit.is_finite() {
        limit.abs()
    } else {
        f64::MAX
    };
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-limit, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = PointerPosition::new(0.0, 0.0);
        let b = PointerPosition::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(b.distance(a), 5.0);
    }

    #[test]
    fn delta_is_signed() {
        let origin = PointerPosition::new(10.0, 10.0);
        assert_eq!(PointerPosition::new(4.0, 15.0).delta_from(origin), (-6.0, 5.0));
    }

    #[test]
    fn clamp_saturates_large_offsets() {
        let pan = Pan::ZERO.offset_clamped(1e300, -1e300, 10_000.0);
        assert_eq!(pan, Pan { x: 10_000.0, y: -10_000.0 });
    }

    #[test]
    fn clamp_handles_infinite_and_nan() {
        let pan = Pan::clamped(f64::INFINITY, f64::NAN, 500.0);
        assert_eq!(pan, Pan { x: 500.0, y: 0.0 });

        // An unbounded limit still yields finite values.
        let pan = Pan::clamped(f64::NEG_INFINITY, 3.0, f64::INFINITY);
        assert!(pan.is_finite());
        assert_eq!(pan.x, -f64::MAX);
    }
}
