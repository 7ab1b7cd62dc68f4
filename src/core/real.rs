//! The numeric contract every formula is written against.
//!
//! Formulas in the catalog never name a concrete floating point type. They are
//! written in terms of [`Real`], which is implemented for native [`f64`],
//! [`Dual`](super::Dual) numbers (forward-mode automatic differentiation) and
//! [`DoubleDouble`](super::DoubleDouble) values (extended precision used for
//! refinement). A formula must only use the operations of this trait so that
//! the same expression is valid under all representations.

use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

/// Real number representation usable inside formulas.
///
/// Comparisons (`PartialEq`, `PartialOrd`) only consider the value of the
/// number, never derivative information carried along by it.
pub trait Real:
    Copy
    + Debug
    + Display
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Zero
    + One
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// Converts a double precision constant into the representation.
    fn from_f64(value: f64) -> Self;

    /// Rounds the value to double precision.
    fn to_f64(self) -> f64;

    /// Machine epsilon of the representation.
    fn epsilon() -> Self;

    /// Not-a-number, the "undefined" signal of formulas outside their domain.
    fn nan() -> Self;

    /// Archimedes' constant.
    fn pi() -> Self;

    /// Euler's number.
    fn e() -> Self;

    /// Absolute value.
    fn abs(self) -> Self;
    /// Sign of the value, `1` or `-1` (NaN for NaN).
    fn signum(self) -> Self;
    /// Square root, NaN for negative values.
    fn sqrt(self) -> Self;
    /// Exponential function.
    fn exp(self) -> Self;
    /// Natural logarithm, NaN for negative values.
    fn ln(self) -> Self;
    /// Sine (radians).
    fn sin(self) -> Self;
    /// Cosine (radians).
    fn cos(self) -> Self;
    /// Integer power.
    fn powi(self, n: i32) -> Self;
    /// Real power, NaN for negative bases.
    fn powf(self, exponent: Self) -> Self;
    /// Whether the value is NaN.
    fn is_nan(self) -> bool;
    /// Whether the value is neither infinite nor NaN.
    fn is_finite(self) -> bool;

    /// Larger of the two values. NaN in `self` is propagated.
    fn max(self, other: Self) -> Self {
        if self.is_nan() || self >= other {
            self
        } else {
            other
        }
    }

    /// Smaller of the two values. NaN in `self` is propagated.
    fn min(self, other: Self) -> Self {
        if self.is_nan() || self <= other {
            self
        } else {
            other
        }
    }
}

/// Converts a double precision literal into any representation.
///
/// This is the counterpart of `nalgebra::convert` for [`Real`] and is the
/// preferred way to write constants in formulas.
#[inline]
pub fn convert<T: Real>(value: f64) -> T {
    T::from_f64(value)
}

impl Real for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn epsilon() -> Self {
        f64::EPSILON
    }

    #[inline]
    fn nan() -> Self {
        f64::NAN
    }

    #[inline]
    fn pi() -> Self {
        std::f64::consts::PI
    }

    #[inline]
    fn e() -> Self {
        std::f64::consts::E
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }

    #[inline]
    fn signum(self) -> Self {
        f64::signum(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }

    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }

    #[inline]
    fn powf(self, exponent: Self) -> Self {
        f64::powf(self, exponent)
    }

    #[inline]
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }

    #[inline]
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypot<T: Real>(a: T, b: T) -> T {
        (a * a + b * b).sqrt()
    }

    #[test]
    fn generic_code_over_f64() {
        assert_eq!(hypot(3.0, 4.0), 5.0);
        assert_eq!(convert::<f64>(0.5), 0.5);
    }

    #[test]
    fn max_min_propagate_nan_from_self() {
        assert!(Real::max(f64::NAN, 1.0).is_nan());
        assert_eq!(Real::max(1.0, 2.0), 2.0);
        assert_eq!(Real::min(1.0, 2.0), 1.0);
    }
}
