//! Dual numbers for forward-mode automatic differentiation.
//!
//! A dual number `a + bε` with `ε² = 0` carries a value `a` and a derivative
//! `b` along one direction. Evaluating a formula on dual numbers seeded with
//! a unit tangent in coordinate `i` yields the partial derivative with respect
//! to `x_i`, which is used to cross-check the analytic gradients of the
//! catalog.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

use super::real::Real;

/// Scalar dual number.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dual {
    re: f64,
    eps: f64,
}

impl Dual {
    /// Creates a dual number from its value and tangent.
    #[inline]
    pub fn new(re: f64, eps: f64) -> Self {
        Self { re, eps }
    }

    /// A constant (zero tangent).
    #[inline]
    pub fn constant(re: f64) -> Self {
        Self::new(re, 0.0)
    }

    /// An independent variable (unit tangent).
    #[inline]
    pub fn variable(re: f64) -> Self {
        Self::new(re, 1.0)
    }

    /// The value part.
    #[inline]
    pub fn re(&self) -> f64 {
        self.re
    }

    /// The derivative part.
    #[inline]
    pub fn eps(&self) -> f64 {
        self.eps
    }

    #[inline]
    fn chain(self, value: f64, derivative: f64) -> Self {
        Self::new(value, self.eps * derivative)
    }
}

impl PartialEq for Dual {
    fn eq(&self, other: &Self) -> bool {
        self.re == other.re
    }
}

impl PartialOrd for Dual {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.re.partial_cmp(&other.re)
    }
}

impl fmt::Display for Dual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl Neg for Dual {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.re, -self.eps)
    }
}

impl Add for Dual {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.re * rhs.re, self.re * rhs.eps + self.eps * rhs.re)
    }
}

impl Div for Dual {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        let re = self.re / rhs.re;
        let eps = (self.eps * rhs.re - self.re * rhs.eps) / (rhs.re * rhs.re);
        Self::new(re, eps)
    }
}

impl AddAssign for Dual {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Dual {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Dual {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Dual {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Real for Dual {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    fn to_f64(self) -> f64 {
        self.re
    }

    fn epsilon() -> Self {
        Self::constant(f64::EPSILON)
    }

    fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    fn pi() -> Self {
        Self::constant(std::f64::consts::PI)
    }

    fn e() -> Self {
        Self::constant(std::f64::consts::E)
    }

    fn abs(self) -> Self {
        if self.re < 0.0 {
            -self
        } else if self.re > 0.0 {
            self
        } else {
            // Subgradient zero at the kink.
            Self::new(self.re.abs(), 0.0)
        }
    }

    fn signum(self) -> Self {
        Self::constant(self.re.signum())
    }

    fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, 0.5 / s)
    }

    fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e)
    }

    fn ln(self) -> Self {
        self.chain(self.re.ln(), 1.0 / self.re)
    }

    fn sin(self) -> Self {
        self.chain(self.re.sin(), self.re.cos())
    }

    fn cos(self) -> Self {
        self.chain(self.re.cos(), -self.re.sin())
    }

    fn powi(self, n: i32) -> Self {
        match n {
            0 => Self::one(),
            1 => self,
            _ => self.chain(self.re.powi(n), f64::from(n) * self.re.powi(n - 1)),
        }
    }

    fn powf(self, exponent: Self) -> Self {
        let value = self.re.powf(exponent.re);

        if exponent.eps == 0.0 {
            self.chain(value, exponent.re * self.re.powf(exponent.re - 1.0))
        } else {
            let eps = value * (exponent.eps * self.re.ln() + exponent.re * self.eps / self.re);
            Self::new(value, eps)
        }
    }

    fn is_nan(self) -> bool {
        self.re.is_nan()
    }

    fn is_finite(self) -> bool {
        self.re.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn product_rule() {
        let x = Dual::variable(2.0);
        let y = x * x;
        assert_eq!(y.re(), 4.0);
        assert_eq!(y.eps(), 4.0);
    }

    #[test]
    fn quotient_rule() {
        let x = Dual::variable(2.0);
        let y = Dual::one() / x;
        assert_abs_diff_eq!(y.eps(), -0.25);
    }

    #[test]
    fn elementary_functions() {
        let x = Dual::variable(0.7);

        assert_abs_diff_eq!(x.sin().eps(), 0.7f64.cos(), epsilon = 1e-15);
        assert_abs_diff_eq!(x.cos().eps(), -0.7f64.sin(), epsilon = 1e-15);
        assert_abs_diff_eq!(x.exp().eps(), 0.7f64.exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(x.ln().eps(), 1.0 / 0.7, epsilon = 1e-15);
        assert_abs_diff_eq!(x.sqrt().eps(), 0.5 / 0.7f64.sqrt(), epsilon = 1e-15);
        assert_abs_diff_eq!(x.powi(3).eps(), 3.0 * 0.49, epsilon = 1e-15);
        assert_abs_diff_eq!(
            x.powf(Dual::constant(2.5)).eps(),
            2.5 * 0.7f64.powf(1.5),
            epsilon = 1e-15
        );
    }

    #[test]
    fn abs_kink_has_zero_subgradient() {
        let x = Dual::variable(0.0);
        assert_eq!(x.abs().eps(), 0.0);
        assert_eq!(Dual::variable(-3.0).abs().eps(), -1.0);
    }

    #[test]
    fn comparisons_ignore_tangent() {
        assert_eq!(Dual::new(1.0, 5.0), Dual::new(1.0, -5.0));
        assert!(Dual::new(1.0, 5.0) < Dual::new(2.0, -5.0));
    }
}
