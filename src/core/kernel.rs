//! Formula and gradient evaluation over all numeric representations.
//!
//! A benchmark formula is written once as a [`Formula`], generically over
//! [`Real`]. Generic methods are not object safe, so the catalog stores
//! formulas behind the object-safe [`Kernel`] trait, which is implemented for
//! every formula automatically and has one method per supported
//! representation. [`Representation`] closes the loop and lets generic code
//! call into a `dyn Kernel` for any of the supported representations.

use nalgebra::DVector;
use thiserror::Error;

use super::double_double::DoubleDouble;
use super::dual::Dual;
use super::real::Real;

/// Error when computing the gradient of a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradientError {
    /// The point lies on a known kink of the formula.
    #[error("formula is not differentiable at the point: {reason}")]
    NonDifferentiable {
        /// Human-readable description of the kink.
        reason: &'static str,
    },
    /// The point has wrong number of variables.
    #[error("invalid dimensionality (expected {expected}, got {got})")]
    InvalidDimensionality {
        /// Dimension required by the entry.
        expected: usize,
        /// Dimension of the given point.
        got: usize,
    },
}

/// Error when evaluating a formula.
///
/// Note that a point outside of the formula's domain is *not* an error. Such
/// evaluations return NaN.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The point has wrong number of variables.
    #[error("invalid dimensionality (expected {expected}, got {got})")]
    InvalidDimensionality {
        /// Dimension required by the entry.
        expected: usize,
        /// Dimension of the given point.
        got: usize,
    },
}

/// Objective formula of a benchmark function, together with its analytic
/// gradient.
///
/// Both methods may assume that `x` has a dimension accepted by the owning
/// entry. Points outside of the mathematical domain must evaluate to
/// [`Real::nan`], never panic.
pub trait Formula: Send + Sync + 'static {
    /// Evaluates the formula at `x`.
    fn eval<T: Real>(&self, x: &DVector<T>) -> T;

    /// Evaluates the analytic gradient at `x`.
    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError>;
}

/// Object-safe view of a [`Formula`].
///
/// There is a blanket implementation for every [`Formula`], implementing it
/// manually is not needed.
pub trait Kernel: Send + Sync {
    /// Evaluates the formula in double precision.
    fn eval_f64(&self, x: &DVector<f64>) -> f64;
    /// Evaluates the formula on dual numbers.
    fn eval_dual(&self, x: &DVector<Dual>) -> Dual;
    /// Evaluates the formula in extended precision.
    fn eval_dd(&self, x: &DVector<DoubleDouble>) -> DoubleDouble;
    /// Analytic gradient in double precision.
    fn gradient_f64(&self, x: &DVector<f64>) -> Result<DVector<f64>, GradientError>;
    /// Analytic gradient on dual numbers.
    fn gradient_dual(&self, x: &DVector<Dual>) -> Result<DVector<Dual>, GradientError>;
    /// Analytic gradient in extended precision.
    fn gradient_dd(
        &self,
        x: &DVector<DoubleDouble>,
    ) -> Result<DVector<DoubleDouble>, GradientError>;
}

impl<F: Formula> Kernel for F {
    fn eval_f64(&self, x: &DVector<f64>) -> f64 {
        self.eval(x)
    }

    fn eval_dual(&self, x: &DVector<Dual>) -> Dual {
        self.eval(x)
    }

    fn eval_dd(&self, x: &DVector<DoubleDouble>) -> DoubleDouble {
        self.eval(x)
    }

    fn gradient_f64(&self, x: &DVector<f64>) -> Result<DVector<f64>, GradientError> {
        self.gradient(x)
    }

    fn gradient_dual(&self, x: &DVector<Dual>) -> Result<DVector<Dual>, GradientError> {
        self.gradient(x)
    }

    fn gradient_dd(
        &self,
        x: &DVector<DoubleDouble>,
    ) -> Result<DVector<DoubleDouble>, GradientError> {
        self.gradient(x)
    }
}

/// A [`Real`] that a [`Kernel`] can be evaluated in.
pub trait Representation: Real {
    /// Dispatches evaluation to the kernel.
    fn eval_kernel(kernel: &dyn Kernel, x: &DVector<Self>) -> Self;

    /// Dispatches gradient evaluation to the kernel.
    fn gradient_kernel(
        kernel: &dyn Kernel,
        x: &DVector<Self>,
    ) -> Result<DVector<Self>, GradientError>;
}

impl Representation for f64 {
    fn eval_kernel(kernel: &dyn Kernel, x: &DVector<Self>) -> Self {
        kernel.eval_f64(x)
    }

    fn gradient_kernel(
        kernel: &dyn Kernel,
        x: &DVector<Self>,
    ) -> Result<DVector<Self>, GradientError> {
        kernel.gradient_f64(x)
    }
}

impl Representation for Dual {
    fn eval_kernel(kernel: &dyn Kernel, x: &DVector<Self>) -> Self {
        kernel.eval_dual(x)
    }

    fn gradient_kernel(
        kernel: &dyn Kernel,
        x: &DVector<Self>,
    ) -> Result<DVector<Self>, GradientError> {
        kernel.gradient_dual(x)
    }
}

impl Representation for DoubleDouble {
    fn eval_kernel(kernel: &dyn Kernel, x: &DVector<Self>) -> Self {
        kernel.eval_dd(x)
    }

    fn gradient_kernel(
        kernel: &dyn Kernel,
        x: &DVector<Self>,
    ) -> Result<DVector<Self>, GradientError> {
        kernel.gradient_dd(x)
    }
}

/// Converts a double precision point into another representation.
pub fn lift<T: Real>(x: &DVector<f64>) -> DVector<T> {
    DVector::from_iterator(x.len(), x.iter().map(|&xi| T::from_f64(xi)))
}

/// Rounds a point in any representation to double precision.
pub fn lower<T: Real>(x: &DVector<T>) -> DVector<f64> {
    DVector::from_iterator(x.len(), x.iter().map(|&xi| xi.to_f64()))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    use super::*;
    use crate::core::convert;

    struct Paraboloid;

    impl Formula for Paraboloid {
        fn eval<T: Real>(&self, x: &DVector<T>) -> T {
            x[0] * x[0] + convert::<T>(3.0) * x[1] * x[1]
        }

        fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
            let two: T = convert(2.0);
            let six: T = convert(6.0);
            Ok(DVector::from_vec(vec![two * x[0], six * x[1]]))
        }
    }

    fn eval_generic<T: Representation>(kernel: &dyn Kernel, x: &DVector<f64>) -> f64 {
        T::eval_kernel(kernel, &lift(x)).to_f64()
    }

    #[test]
    fn one_formula_all_representations() {
        let kernel: &dyn Kernel = &Paraboloid;
        let x = dvector![1.0, 2.0];

        assert_eq!(eval_generic::<f64>(kernel, &x), 13.0);
        assert_eq!(eval_generic::<Dual>(kernel, &x), 13.0);
        assert_eq!(eval_generic::<DoubleDouble>(kernel, &x), 13.0);

        let g = DoubleDouble::gradient_kernel(kernel, &lift(&x)).unwrap();
        assert_abs_diff_eq!(lower(&g)[1], 12.0);
    }
}
