//! Dimensions with partial knowledge.
//!
//! A `Dimension` is an interval of possible lengths. A static dimension is a
//! degenerate interval. Bounds are i64, the upper bound may be missing
//! (unbounded). Arithmetic saturates: a finite bound that would overflow
//! becomes unbounded instead of wrapping.
use crate::GraftResult;
use std::fmt;
use std::ops;

mod interval;

pub use self::interval::Interval;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension(Interval);

impl Default for Dimension {
    fn default() -> Dimension {
        Dimension::dynamic()
    }
}

impl Dimension {
    /// A static dimension.
    ///
    /// # Panics
    ///
    /// If `len` is negative. Use `try_new` for lengths coming from user
    /// input.
    pub fn new(len: i64) -> Dimension {
        assert!(len >= 0, "Negative dimension length {len}");
        Dimension(Interval::exactly(len))
    }

    pub fn try_new(len: i64) -> GraftResult<Dimension> {
        anyhow::ensure!(len >= 0, "Negative dimension length {len}");
        Ok(Dimension(Interval::exactly(len)))
    }

    /// A dynamic dimension with known bounds. Negative bounds are clamped
    /// to zero.
    ///
    /// # Panics
    ///
    /// If `min > max`. Use `try_interval` for bounds coming from user input.
    pub fn interval(min: i64, max: i64) -> Dimension {
        Dimension(Interval::new(min.max(0), max.max(0)))
    }

    pub fn try_interval(min: i64, max: i64) -> GraftResult<Dimension> {
        Ok(Dimension(Interval::try_new(min.max(0), max.max(0))?))
    }

    /// A dynamic dimension with a lower bound only.
    pub fn at_least(min: i64) -> Dimension {
        Dimension(Interval::at_least(min.max(0)))
    }

    /// A dimension about which nothing is known.
    pub fn dynamic() -> Dimension {
        Dimension(Interval::at_least(0))
    }

    pub fn from_interval(interval: Interval) -> Dimension {
        Dimension(interval.clamp_min(0))
    }

    pub fn as_interval(&self) -> &Interval {
        &self.0
    }

    pub fn is_static(&self) -> bool {
        self.0.is_static()
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// Length of a static dimension.
    pub fn get_length(&self) -> Option<i64> {
        if self.is_static() { Some(self.0.min()) } else { None }
    }

    pub fn to_usize(&self) -> GraftResult<usize> {
        self.get_length()
            .map(|l| l as usize)
            .ok_or_else(|| anyhow::anyhow!("Dimension {} is not static", self))
    }

    pub fn min_length(&self) -> i64 {
        self.0.min()
    }

    /// Upper bound, None if unbounded.
    pub fn max_length(&self) -> Option<i64> {
        self.0.max()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.0.has_upper_bound()
    }

    pub fn is_one(&self) -> bool {
        self.get_length() == Some(1)
    }

    pub fn compatible(&self, other: &Dimension) -> bool {
        self.0.intersect(&other.0).is_some()
    }

    /// Most specific dimension compatible with both, None if they can not
    /// both hold.
    pub fn merge(a: &Dimension, b: &Dimension) -> Option<Dimension> {
        a.0.intersect(&b.0).map(Dimension)
    }

    /// Numpy-style: a static 1 broadcasts against anything, otherwise the
    /// dimensions must merge.
    pub fn broadcast_merge(a: &Dimension, b: &Dimension) -> Option<Dimension> {
        if a.is_one() {
            Some(*b)
        } else if b.is_one() {
            Some(*a)
        } else {
            Dimension::merge(a, b)
        }
    }

    /// Smallest dimension containing both.
    pub fn hull(a: &Dimension, b: &Dimension) -> Dimension {
        Dimension(a.0.hull(&b.0))
    }

    /// True if every value allowed by self is allowed by other.
    pub fn refines(&self, other: &Dimension) -> bool {
        other.0.contains_interval(&self.0)
    }

    /// True if every value allowed by other is allowed by self.
    pub fn relaxes(&self, other: &Dimension) -> bool {
        self.0.contains_interval(&other.0)
    }
}

impl From<usize> for Dimension {
    fn from(it: usize) -> Dimension {
        Dimension::new(it as i64)
    }
}

impl From<i64> for Dimension {
    fn from(it: i64) -> Dimension {
        Dimension::new(it)
    }
}

impl From<i32> for Dimension {
    fn from(it: i32) -> Dimension {
        Dimension::new(it as i64)
    }
}

impl ops::Add for Dimension {
    type Output = Dimension;
    fn add(self, rhs: Dimension) -> Dimension {
        Dimension(self.0 + rhs.0)
    }
}

impl ops::Sub for Dimension {
    type Output = Dimension;
    fn sub(self, rhs: Dimension) -> Dimension {
        Dimension((self.0 - rhs.0).clamp_min(0))
    }
}

impl ops::Mul for Dimension {
    type Output = Dimension;
    fn mul(self, rhs: Dimension) -> Dimension {
        Dimension(self.0 * rhs.0)
    }
}

impl ops::Div for Dimension {
    type Output = Dimension;
    fn div(self, rhs: Dimension) -> Dimension {
        Dimension(self.0 / rhs.0)
    }
}

impl std::iter::Product for Dimension {
    fn product<I: Iterator<Item = Dimension>>(iter: I) -> Dimension {
        iter.fold(Dimension::new(1), |acc, d| acc * d)
    }
}

impl std::iter::Sum for Dimension {
    fn sum<I: Iterator<Item = Dimension>>(iter: I) -> Dimension {
        iter.fold(Dimension::new(0), |acc, d| acc + d)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match (self.0.min(), self.0.max()) {
            (min, Some(max)) if min == max => write!(fmt, "{min}"),
            (0, None) => write!(fmt, "?"),
            (min, None) => write!(fmt, "{min}.."),
            (min, Some(max)) => write!(fmt, "{min}..{max}"),
        }
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{self}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn arb_dim() -> impl Strategy<Value = Dimension> {
        prop_oneof![
            (0i64..8).prop_map(Dimension::new),
            (0i64..8, 0i64..8).prop_map(|(a, b)| Dimension::interval(a.min(b), a.max(b))),
            (0i64..8).prop_map(Dimension::at_least),
        ]
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in arb_dim(), b in arb_dim()) {
            prop_assert_eq!(Dimension::merge(&a, &b), Dimension::merge(&b, &a));
        }

        #[test]
        fn merge_is_idempotent(a in arb_dim()) {
            prop_assert_eq!(Dimension::merge(&a, &a), Some(a));
        }

        #[test]
        fn merge_refines_both(a in arb_dim(), b in arb_dim()) {
            if let Some(m) = Dimension::merge(&a, &b) {
                prop_assert!(m.refines(&a));
                prop_assert!(m.refines(&b));
            } else {
                prop_assert!(!a.compatible(&b));
            }
        }

        #[test]
        fn hull_relaxes_both(a in arb_dim(), b in arb_dim()) {
            let h = Dimension::hull(&a, &b);
            prop_assert!(h.relaxes(&a));
            prop_assert!(h.relaxes(&b));
        }
    }

    #[test]
    fn static_mismatch_does_not_merge() {
        assert_eq!(Dimension::merge(&3.into(), &4.into()), None);
    }

    #[test]
    fn merge_narrows_interval() {
        let m = Dimension::merge(&Dimension::interval(2, 10), &Dimension::at_least(5)).unwrap();
        assert_eq!(m, Dimension::interval(5, 10));
        let m = Dimension::merge(&Dimension::interval(2, 10), &7.into()).unwrap();
        assert_eq!(m, Dimension::new(7));
    }

    #[test]
    fn broadcast_one() {
        assert_eq!(Dimension::broadcast_merge(&1.into(), &Dimension::dynamic()), Some(Dimension::dynamic()));
        assert_eq!(Dimension::broadcast_merge(&5.into(), &1.into()), Some(5.into()));
        assert_eq!(Dimension::broadcast_merge(&5.into(), &3.into()), None);
    }

    #[test]
    fn arithmetic_saturates() {
        let big = Dimension::interval(1, i64::MAX - 1);
        let sum = big + Dimension::new(10);
        assert_eq!(sum.min_length(), 11);
        assert_eq!(sum.max_length(), None);
        let prod = big * Dimension::new(3);
        assert_eq!(prod.max_length(), None);
    }

    #[test]
    fn sub_clamps_at_zero() {
        let d = Dimension::interval(2, 6) - Dimension::interval(1, 4);
        assert_eq!(d, Dimension::interval(0, 5));
    }

    #[test]
    fn display() {
        assert_eq!(Dimension::new(5).to_string(), "5");
        assert_eq!(Dimension::dynamic().to_string(), "?");
        assert_eq!(Dimension::at_least(3).to_string(), "3..");
        assert_eq!(Dimension::interval(2, 8).to_string(), "2..8");
    }

    #[test]
    fn div_keeps_bounds() {
        assert_eq!(Dimension::interval(12, 24) / Dimension::new(3), Dimension::interval(4, 8));
        assert_eq!(Dimension::dynamic() / Dimension::new(3), Dimension::dynamic());
    }

    #[test]
    fn checked_construction() {
        assert!(Dimension::try_new(-1).is_err());
        assert_eq!(Dimension::try_new(3).unwrap(), Dimension::new(3));
        assert!(Dimension::try_interval(5, 2).is_err());
        assert_eq!(Dimension::try_interval(-3, 2).unwrap(), Dimension::interval(0, 2));
    }
}
