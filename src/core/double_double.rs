//! Extended precision arithmetic on unevaluated sums of two doubles.
//!
//! A [`DoubleDouble`] represents the real number `hi + lo` where `|lo| <=
//! ulp(hi) / 2`. This gives roughly 106 bits (about 32 significant decimal
//! digits) of precision while keeping every operation in native floating point
//! hardware. The precision is well below the tolerances used when refining
//! recorded minima, which is all this crate needs.
//!
//! Elementary functions use argument reduction followed by Taylor series and
//! Newton corrections.
//!
//! # References
//!
//! \[1\] [Library for Double-Double and Quad-Double
//! Arithmetic](https://www.davidhbailey.com/dhbpapers/qd.pdf)
//!
//! \[2\] [Handbook of Floating-Point
//! Arithmetic](https://link.springer.com/book/10.1007/978-3-319-76526-6)

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

use super::real::Real;

/// Double-double extended precision number.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct DoubleDouble {
    hi: f64,
    lo: f64,
}

#[inline]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    let err = (a - (s - bb)) + (b - bb);
    (s, err)
}

#[inline]
fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let err = b - (s - a);
    (s, err)
}

#[inline]
fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    let err = a.mul_add(b, -p);
    (p, err)
}

impl DoubleDouble {
    /// π.
    pub const PI: Self = Self::from_parts(3.141592653589793, 1.2246467991473532e-16);
    /// 2π.
    pub const TWO_PI: Self = Self::from_parts(6.283185307179586, 2.4492935982947064e-16);
    /// π/2.
    pub const FRAC_PI_2: Self = Self::from_parts(1.5707963267948966, 6.123233995736766e-17);
    /// Euler's number.
    pub const E: Self = Self::from_parts(2.718281828459045, 1.4456468917292502e-16);
    /// Natural logarithm of 2.
    pub const LN_2: Self = Self::from_parts(0.6931471805599453, 2.3190468138462996e-17);
    /// 2^-104.
    pub const EPSILON: Self = Self::from_parts(4.930380657631324e-32, 0.0);

    const fn from_parts(hi: f64, lo: f64) -> Self {
        Self { hi, lo }
    }

    /// Creates a number from its components, renormalizing them.
    pub fn new(hi: f64, lo: f64) -> Self {
        Self::renormalized(hi, lo)
    }

    #[inline]
    fn renormalized(hi: f64, lo: f64) -> Self {
        if hi.is_finite() {
            let (hi, lo) = quick_two_sum(hi, lo);
            Self { hi, lo }
        } else {
            Self { hi, lo: 0.0 }
        }
    }

    /// The leading component.
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// The trailing component.
    pub fn lo(&self) -> f64 {
        self.lo
    }

    #[inline]
    fn mul_f64(self, b: f64) -> Self {
        let (p, e) = two_prod(self.hi, b);
        Self::renormalized(p, e + self.lo * b)
    }

    #[inline]
    fn scale_pow2(self, k: i32) -> Self {
        // Two halves so that neither factor overflows on its own.
        let k1 = k / 2;
        let k2 = k - k1;
        let f1 = 2f64.powi(k1);
        let f2 = 2f64.powi(k2);
        Self {
            hi: self.hi * f1 * f2,
            lo: self.lo * f1 * f2,
        }
    }

    fn square(self) -> Self {
        self * self
    }

    /// Returns `(sin(self), cos(self))`.
    pub fn sin_cos(self) -> (Self, Self) {
        if !self.hi.is_finite() {
            return (Self::nan(), Self::nan());
        }

        let k = (self / Self::TWO_PI).hi.round();
        let r = self - Self::TWO_PI.mul_f64(k);

        let j = (r / Self::FRAC_PI_2).hi.round();
        let t = r - Self::FRAC_PI_2.mul_f64(j);

        let (s, c) = Self::taylor_sin_cos(t);

        match (j as i64).rem_euclid(4) {
            0 => (s, c),
            1 => (c, -s),
            2 => (-s, -c),
            _ => (-c, s),
        }
    }

    // Valid for |t| <= π/4.
    fn taylor_sin_cos(t: Self) -> (Self, Self) {
        let threshold = Self::EPSILON.hi * 0.5;
        let t2 = t.square();

        let mut sin = t;
        let mut term = t;
        let mut k = 1.0;
        for _ in 0..30 {
            term = -(term * t2) / Self::from((k + 1.0) * (k + 2.0));
            k += 2.0;
            sin += term;
            if term.hi.abs() <= threshold * sin.hi.abs().max(threshold) {
                break;
            }
        }

        let mut cos = Self::one();
        let mut term = Self::one();
        let mut k = 0.0;
        for _ in 0..30 {
            term = -(term * t2) / Self::from((k + 1.0) * (k + 2.0));
            k += 2.0;
            cos += term;
            if term.hi.abs() <= threshold {
                break;
            }
        }

        (sin, cos)
    }

    /// Formats the number in scientific notation with given number of
    /// significant digits, e.g. `3.1415926535897932384626433832795e0`.
    pub fn to_scientific(&self, digits: usize) -> String {
        let digits = digits.max(1);

        if self.hi.is_nan() {
            return "NaN".to_string();
        }
        if self.hi.is_infinite() {
            return if self.hi > 0.0 { "inf" } else { "-inf" }.to_string();
        }
        if self.hi == 0.0 {
            return format!("{}e0", Self::mantissa(&vec![0; digits]));
        }

        let negative = self.hi < 0.0;
        let mut x = self.abs();
        let mut exponent = self.hi.abs().log10().floor() as i32;

        let ten = Self::from(10.0);
        x = if exponent >= 0 {
            x / ten.powi(exponent)
        } else {
            x * ten.powi(-exponent)
        };

        if x.hi >= 10.0 {
            x /= ten;
            exponent += 1;
        } else if x.hi < 1.0 {
            x *= ten;
            exponent -= 1;
        }

        let mut raw = Vec::with_capacity(digits + 1);
        for _ in 0..=digits {
            let mut d = x.hi.floor();
            if (x - Self::from(d)).hi < 0.0 {
                d -= 1.0;
            }
            let d = d.clamp(0.0, 9.0);
            raw.push(d as u8);
            x = (x - Self::from(d)) * ten;
        }

        let round_up = raw.pop().map_or(false, |last| last >= 5);
        if round_up {
            let mut i = raw.len();
            loop {
                if i == 0 {
                    raw.insert(0, 1);
                    raw.pop();
                    exponent += 1;
                    break;
                }
                i -= 1;
                if raw[i] == 9 {
                    raw[i] = 0;
                } else {
                    raw[i] += 1;
                    break;
                }
            }
        }

        let sign = if negative { "-" } else { "" };
        format!("{}{}e{}", sign, Self::mantissa(&raw), exponent)
    }

    fn mantissa(digits: &[u8]) -> String {
        let mut out = String::with_capacity(digits.len() + 1);
        for (i, d) in digits.iter().enumerate() {
            if i == 1 {
                out.push('.');
            }
            out.push(char::from(b'0' + d));
        }
        out
    }
}

impl From<f64> for DoubleDouble {
    fn from(value: f64) -> Self {
        Self::from_parts(value, 0.0)
    }
}

impl fmt::Display for DoubleDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = f.precision().map_or(32, |p| p + 1);
        f.write_str(&self.to_scientific(digits))
    }
}

impl Neg for DoubleDouble {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::from_parts(-self.hi, -self.lo)
    }
}

impl Add for DoubleDouble {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let (s1, s2) = two_sum(self.hi, rhs.hi);
        if !s1.is_finite() {
            return Self::from(s1);
        }
        let (t1, t2) = two_sum(self.lo, rhs.lo);
        let (s1, s2) = quick_two_sum(s1, s2 + t1);
        Self::renormalized(s1, s2 + t2)
    }
}

impl Sub for DoubleDouble {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for DoubleDouble {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let (p, e) = two_prod(self.hi, rhs.hi);
        if !p.is_finite() {
            return Self::from(p);
        }
        Self::renormalized(p, e + (self.hi * rhs.lo + self.lo * rhs.hi))
    }
}

impl Div for DoubleDouble {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let q1 = self.hi / rhs.hi;
        if !q1.is_finite() || rhs.hi.is_infinite() {
            return Self::from(q1);
        }

        let r = self - rhs.mul_f64(q1);
        let q2 = r.hi / rhs.hi;
        let r = r - rhs.mul_f64(q2);
        let q3 = r.hi / rhs.hi;

        let (q1, q2) = quick_two_sum(q1, q2);
        Self::from_parts(q1, q2) + Self::from(q3)
    }
}

impl AddAssign for DoubleDouble {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for DoubleDouble {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for DoubleDouble {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for DoubleDouble {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl Zero for DoubleDouble {
    fn zero() -> Self {
        Self::from(0.0)
    }

    fn is_zero(&self) -> bool {
        self.hi == 0.0
    }
}

impl One for DoubleDouble {
    fn one() -> Self {
        Self::from(1.0)
    }
}

impl Real for DoubleDouble {
    fn from_f64(value: f64) -> Self {
        Self::from(value)
    }

    fn to_f64(self) -> f64 {
        self.hi + self.lo
    }

    fn epsilon() -> Self {
        Self::EPSILON
    }

    fn nan() -> Self {
        Self::from(f64::NAN)
    }

    fn pi() -> Self {
        Self::PI
    }

    fn e() -> Self {
        Self::E
    }

    fn abs(self) -> Self {
        if self.hi < 0.0 {
            -self
        } else {
            self
        }
    }

    fn signum(self) -> Self {
        Self::from(self.hi.signum())
    }

    fn sqrt(self) -> Self {
        if self.hi == 0.0 {
            return Self::zero();
        }
        if self.hi < 0.0 || !self.hi.is_finite() {
            return Self::from(self.hi.sqrt());
        }

        let x = self.hi.sqrt();
        let y = Self::from(x);
        let correction = (self - y.square()).hi * (0.5 / x);
        let (hi, lo) = two_sum(x, correction);
        Self::renormalized(hi, lo)
    }

    fn exp(self) -> Self {
        const SQUARINGS: i32 = 10;

        if self.hi.is_nan() {
            return self;
        }
        if self.hi > 709.7 {
            return Self::from(f64::INFINITY);
        }
        if self.hi < -745.0 {
            return Self::zero();
        }
        if self.is_zero() {
            return Self::one();
        }

        let k = (self.hi / Self::LN_2.hi).round();
        let r = (self - Self::LN_2.mul_f64(k)).scale_pow2(-SQUARINGS);

        // expm1 of the reduced argument.
        let threshold = Self::EPSILON.hi * 0.5;
        let mut s = r;
        let mut term = r;
        for i in 2..30 {
            term = term * r / Self::from(f64::from(i));
            s += term;
            if term.hi.abs() <= threshold * s.hi.abs() {
                break;
            }
        }

        // (1 + s)^2 - 1 = 2s + s^2
        for _ in 0..SQUARINGS {
            s = s.mul_f64(2.0) + s.square();
        }

        (s + Self::one()).scale_pow2(k as i32)
    }

    fn ln(self) -> Self {
        if self.hi.is_nan() || self.hi < 0.0 {
            return Self::nan();
        }
        if self.hi == 0.0 {
            return Self::from(f64::NEG_INFINITY);
        }
        if self.hi.is_infinite() {
            return self;
        }

        // Newton iteration on exp(x) = a.
        let mut x = Self::from(self.hi.ln());
        for _ in 0..2 {
            x = x + self * (-x).exp() - Self::one();
        }
        x
    }

    fn sin(self) -> Self {
        self.sin_cos().0
    }

    fn cos(self) -> Self {
        self.sin_cos().1
    }

    fn powi(self, n: i32) -> Self {
        let mut base = self;
        let mut exp = n.unsigned_abs();
        let mut acc = Self::one();

        while exp > 0 {
            if exp & 1 == 1 {
                acc *= base;
            }
            exp >>= 1;
            if exp > 0 {
                base = base.square();
            }
        }

        if n < 0 {
            Self::one() / acc
        } else {
            acc
        }
    }

    fn powf(self, exponent: Self) -> Self {
        let e = exponent.hi;
        if exponent.lo == 0.0 && e.fract() == 0.0 && e.abs() < f64::from(i32::MAX) {
            return self.powi(e as i32);
        }

        if self.hi == 0.0 {
            return if e > 0.0 { Self::zero() } else { Self::nan() };
        }
        if self.hi < 0.0 {
            return Self::nan();
        }

        (exponent * self.ln()).exp()
    }

    fn is_nan(self) -> bool {
        self.hi.is_nan()
    }

    fn is_finite(self) -> bool {
        self.hi.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn assert_dd_eq(a: DoubleDouble, b: DoubleDouble, eps: f64) {
        let diff = (a - b).abs();
        assert!(
            diff.hi() <= eps,
            "{} != {} (diff {:e})",
            a,
            b,
            diff.to_f64()
        );
    }

    #[test]
    fn arithmetic_beyond_double_precision() {
        let third = DoubleDouble::one() / DoubleDouble::from(3.0);
        let back = third * DoubleDouble::from(3.0);
        assert_dd_eq(back, DoubleDouble::one(), 1e-31);

        // 1 + 1e-20 is lost in f64 but representable here.
        let tiny = DoubleDouble::from(1e-20);
        let sum = DoubleDouble::one() + tiny;
        assert_abs_diff_eq!((sum - DoubleDouble::one()).to_f64(), 1e-20, epsilon = 1e-36);
    }

    #[test]
    fn sqrt_two() {
        let two = DoubleDouble::from(2.0);
        let root = two.sqrt();
        assert_dd_eq(root * root, two, 1e-30);
        assert!(DoubleDouble::from(-1.0).sqrt().is_nan());
    }

    #[test]
    fn exp_and_ln_are_inverse() {
        assert_dd_eq(DoubleDouble::one().exp(), DoubleDouble::E, 1e-30);
        assert_dd_eq(DoubleDouble::E.ln(), DoubleDouble::one(), 1e-30);

        let x = DoubleDouble::from(-3.75);
        assert_dd_eq(x.exp().ln(), x, 1e-29);
        assert_dd_eq(DoubleDouble::from(2.0).ln(), DoubleDouble::LN_2, 1e-31);
    }

    #[test]
    fn exp_limits() {
        assert!(DoubleDouble::from(800.0).exp().hi().is_infinite());
        assert!(DoubleDouble::from(-800.0).exp().is_zero());
        assert!(DoubleDouble::from(-1.0).ln().is_nan());
    }

    #[test]
    fn trigonometry() {
        let six = DoubleDouble::from(6.0);
        let three = DoubleDouble::from(3.0);
        let half = DoubleDouble::from(0.5);

        assert_dd_eq((DoubleDouble::PI / six).sin(), half, 1e-30);
        assert_dd_eq((DoubleDouble::PI / three).cos(), half, 1e-30);
        assert_dd_eq(DoubleDouble::PI.sin(), DoubleDouble::zero(), 1e-30);
        assert_dd_eq(DoubleDouble::PI.cos(), -DoubleDouble::one(), 1e-30);

        for &x in &[-7.3, -2.0, 0.4, 1.9, 3.3, 5.1, 25.0] {
            let (s, c) = DoubleDouble::from(x).sin_cos();
            assert_abs_diff_eq!(s.to_f64(), x.sin(), epsilon = 1e-14);
            assert_abs_diff_eq!(c.to_f64(), x.cos(), epsilon = 1e-14);
            assert_dd_eq(s * s + c * c, DoubleDouble::one(), 1e-30);
        }
    }

    #[test]
    fn powers() {
        let x = DoubleDouble::from(1.5);
        assert_dd_eq(x.powi(3), DoubleDouble::from(3.375), 1e-30);
        assert_dd_eq(x.powi(-2), DoubleDouble::from(4.0) / DoubleDouble::from(9.0), 1e-30);
        assert_dd_eq(
            DoubleDouble::from(4.0).powf(DoubleDouble::from(0.5)),
            DoubleDouble::from(2.0),
            1e-30,
        );
    }

    #[test]
    fn scientific_formatting() {
        assert_eq!(DoubleDouble::from(1.5).to_scientific(5), "1.5000e0");
        assert_eq!(DoubleDouble::from(-0.00125).to_scientific(3), "-1.25e-3");
        assert_eq!(DoubleDouble::zero().to_scientific(2), "0.0e0");
        assert_eq!(DoubleDouble::from(9.99).to_scientific(2), "1.0e1");

        let third = DoubleDouble::one() / DoubleDouble::from(3.0);
        assert!(third
            .to_scientific(32)
            .starts_with("3.33333333333333333333333333"));
        assert!(DoubleDouble::PI
            .to_scientific(32)
            .starts_with("3.14159265358979323846264338327"));
    }
}
