use crate::GraftResult;
use std::fmt;
use std::ops;

/// Closed interval of i64 values, `[min, max]`. A missing `max` means the
/// interval has no upper bound.
///
/// Bounds saturate on overflow: an upper bound that would leave the i64
/// range is turned into "unbounded", a lower bound is clamped.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    min: i64,
    max: Option<i64>,
}

impl Interval {
    /// # Panics
    ///
    /// If `min > max`. Use `try_new` for bounds coming from user input.
    pub fn new(min: i64, max: i64) -> Interval {
        assert!(min <= max, "Invalid interval [{min}, {max}]");
        Interval { min, max: Some(max) }
    }

    pub fn try_new(min: i64, max: i64) -> GraftResult<Interval> {
        anyhow::ensure!(min <= max, "Invalid interval [{min}, {max}]");
        Ok(Interval { min, max: Some(max) })
    }

    pub fn exactly(v: i64) -> Interval {
        Interval { min: v, max: Some(v) }
    }

    pub fn at_least(min: i64) -> Interval {
        Interval { min, max: None }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    pub fn is_static(&self) -> bool {
        self.max == Some(self.min)
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max.is_some()
    }

    pub fn contains(&self, v: i64) -> bool {
        v >= self.min && self.max.is_none_or(|max| v <= max)
    }

    pub fn contains_interval(&self, other: &Interval) -> bool {
        other.min >= self.min
            && match (self.max, other.max) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(a), Some(b)) => b <= a,
            }
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let min = self.min.max(other.min);
        let max = match (self.max, other.max) {
            (None, x) | (x, None) => x,
            (Some(a), Some(b)) => Some(a.min(b)),
        };
        match max {
            Some(max) if max < min => None,
            _ => Some(Interval { min, max }),
        }
    }

    pub fn hull(&self, other: &Interval) -> Interval {
        let min = self.min.min(other.min);
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        Interval { min, max }
    }

    pub fn clamp_min(self, floor: i64) -> Interval {
        let min = self.min.max(floor);
        let max = self.max.map(|m| m.max(min));
        Interval { min, max }
    }
}

fn saturate_max(v: Option<i64>) -> Option<i64> {
    v.filter(|v| *v != i64::MAX)
}

impl ops::Add for Interval {
    type Output = Interval;
    fn add(self, rhs: Interval) -> Interval {
        let max = match (self.max, rhs.max) {
            (Some(a), Some(b)) => saturate_max(Some(a.saturating_add(b))),
            _ => None,
        };
        Interval { min: self.min.saturating_add(rhs.min), max }
    }
}

impl ops::Sub for Interval {
    type Output = Interval;
    fn sub(self, rhs: Interval) -> Interval {
        let min = match rhs.max {
            Some(b) => self.min.saturating_sub(b),
            None => i64::MIN,
        };
        let max = self.max.and_then(|a| saturate_max(Some(a.saturating_sub(rhs.min))));
        Interval { min, max }
    }
}

/// Product of intervals of non-negative values.
impl ops::Mul for Interval {
    type Output = Interval;
    fn mul(self, rhs: Interval) -> Interval {
        let min = self.min.saturating_mul(rhs.min);
        let max = match (self.max, rhs.max) {
            (Some(0), _) | (_, Some(0)) => Some(0),
            (Some(a), Some(b)) => saturate_max(Some(a.saturating_mul(b))),
            _ => None,
        };
        Interval { min, max }
    }
}

/// Quotient of intervals of non-negative values: every integer `a / b`
/// with `a` and `b` in the operands. A divisor that may be zero gives an
/// unbounded result.
impl ops::Div for Interval {
    type Output = Interval;
    fn div(self, rhs: Interval) -> Interval {
        let min = match rhs.max {
            Some(0) | None => 0,
            Some(b) => self.min.max(0).saturating_add(b - 1) / b,
        };
        let max = match (self.max, rhs.min) {
            (_, b) if b <= 0 => None,
            (Some(a), b) => Some(a / b),
            (None, _) => None,
        };
        Interval { min, max: max.map(|m| m.max(min)) }
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) => write!(fmt, "[{}, {}]", self.min, max),
            None => write!(fmt, "[{}, inf)", self.min),
        }
    }
}
