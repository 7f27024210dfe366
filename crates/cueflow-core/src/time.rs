//! Time primitives for Cueflow
//!
//! All timeline times are integer milliseconds on a single shared axis.
//! Open-ended intervals are expressed as `Option<Time>` with `None`
//! standing for "forever".

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A point on the timeline axis, in milliseconds.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Time(pub i64);

impl Time {
    pub const ZERO: Time = Time(0);
    pub const MAX: Time = Time(i64::MAX);
    pub const MIN: Time = Time(i64::MIN);

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        Time(millis)
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn saturating_add(self, millis: i64) -> Self {
        Time(self.0.saturating_add(millis))
    }

    #[inline]
    pub fn saturating_sub(self, millis: i64) -> Self {
        Time(self.0.saturating_sub(millis))
    }

    /// Millisecond distance from `earlier` to `self`.
    #[inline]
    pub fn since(self, earlier: Time) -> i64 {
        self.0 - earlier.0
    }
}

impl Add<i64> for Time {
    type Output = Time;

    #[inline]
    fn add(self, rhs: i64) -> Self::Output {
        Time(self.0 + rhs)
    }
}

impl Sub<i64> for Time {
    type Output = Time;

    #[inline]
    fn sub(self, rhs: i64) -> Self::Output {
        Time(self.0 - rhs)
    }
}

impl Sub<Time> for Time {
    type Output = i64;

    #[inline]
    fn sub(self, rhs: Time) -> Self::Output {
        self.0 - rhs.0
    }
}

impl Mul<i64> for Time {
    type Output = Time;

    #[inline]
    fn mul(self, rhs: i64) -> Self::Output {
        Time(self.0 * rhs)
    }
}

impl Neg for Time {
    type Output = Time;

    #[inline]
    fn neg(self) -> Self::Output {
        Time(-self.0)
    }
}

impl From<i64> for Time {
    #[inline]
    fn from(millis: i64) -> Self {
        Time(millis)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t({}ms)", self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_arithmetic() {
        let t = Time::from_millis(100);

        assert_eq!(t + 50, Time(150));
        assert_eq!(t - 30, Time(70));
        assert_eq!(t - Time(40), 60);
        assert_eq!(t * 3, Time(300));
        assert_eq!(-t, Time(-100));
    }

    #[test]
    fn test_time_saturation() {
        assert_eq!(Time::MAX.saturating_add(1), Time::MAX);
        assert_eq!(Time::MIN.saturating_sub(1), Time::MIN);
    }

    #[test]
    fn test_time_serde_is_a_plain_number() {
        let t = Time::from_millis(1500);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "1500");

        let back: Time = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
