//! Tools for derivative-based checks.
//!
//! Analytic gradients of the catalog are cross-checked against gradients
//! computed by forward-mode automatic differentiation (one dual-number
//! evaluation per variable) and, as a last resort, against forward finite
//! differences.

use nalgebra::DVector;

use crate::core::{lift, Dual, FunctionEntry, GradientError, Real, Representation};

/// Square root of double precision machine epsilon. This value is a standard
/// constant for epsilons in approximating first-order derivate-based concepts.
pub const EPSILON_SQRT: f64 = 0.000000014901161193847656;

/// Gradient of the entry's formula computed by automatic differentiation.
///
/// Returns `None` if the entry does not accept the dimension of `x`.
pub fn dual_gradient(entry: &FunctionEntry, x: &DVector<f64>) -> Option<DVector<f64>> {
    let mut xd: DVector<Dual> = lift(x);
    let mut grad = DVector::zeros(x.len());

    for i in 0..x.len() {
        // Seed the tangent in direction i.
        xd[i] = Dual::variable(x[i]);
        grad[i] = entry.evaluate(&xd).ok()?.eps();
        xd[i] = Dual::constant(x[i]);
    }

    Some(grad)
}

/// Gradient of the entry's formula approximated by forward finite differences.
///
/// The parameter `x` is mutable to allow temporary mutations avoiding
/// unnecessary allocations, but after this function ends, the content of the
/// vector is exactly the same as before.
pub fn finite_difference_gradient(
    entry: &FunctionEntry,
    x: &mut DVector<f64>,
) -> Option<DVector<f64>> {
    let fx = entry.evaluate(x).ok()?;
    let mut grad = DVector::zeros(x.len());

    for i in 0..x.len() {
        let xi = x[i];

        // Scale the step by the magnitude of x_i, use plain epsilon near zero.
        let step = EPSILON_SQRT * xi.abs().max(1.0) * 1f64.copysign(xi);

        x[i] = xi + step;
        let fxi = entry.evaluate(x);
        x[i] = xi;

        grad[i] = (fxi.ok()? - fx) / step;
    }

    Some(grad)
}

/// Euclidean norm in any representation.
pub fn norm<T: Real>(x: &DVector<T>) -> T {
    x.iter().fold(T::zero(), |acc, &xi| acc + xi * xi).sqrt()
}

/// Maximum absolute value in any representation.
pub fn norm_inf<T: Real>(x: &DVector<T>) -> T {
    x.iter().fold(T::zero(), |acc, &xi| acc.max(xi.abs()))
}

/// Dot product in any representation.
pub fn dot<T: Real>(a: &DVector<T>, b: &DVector<T>) -> T {
    a.iter()
        .zip(b.iter())
        .fold(T::zero(), |acc, (&ai, &bi)| acc + ai * bi)
}

/// Largest relative difference between two vectors, measured against the
/// larger of the magnitudes and one.
pub fn relative_difference(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(ai, bi)| (ai - bi).abs() / ai.abs().max(bi.abs()).max(1.0))
        .fold(0.0, f64::max)
}

/// Gradient of the entry in representation `T` at a point given in double
/// precision.
pub fn gradient_at<T: Representation>(
    entry: &FunctionEntry,
    x: &DVector<f64>,
) -> Result<DVector<T>, GradientError> {
    entry.gradient(&lift::<T>(x))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    use super::*;
    use crate::testing::*;

    #[test]
    fn dual_gradient_matches_analytic() {
        let entry = build(paraboloid_record("bowl"));
        let x = dvector![0.5, -1.5, 2.0];

        let ad = dual_gradient(&entry, &x).unwrap();
        let analytic: DVector<f64> = entry.gradient(&x).unwrap();

        assert_abs_diff_eq!(ad, analytic, epsilon = 1e-12);
    }

    #[test]
    fn finite_differences_are_close() {
        let entry = build(paraboloid_record("bowl"));
        let mut x = dvector![0.5, -1.5];
        let fd = finite_difference_gradient(&entry, &mut x).unwrap();

        assert_abs_diff_eq!(fd, dvector![1.0, -3.0], epsilon = 1e-6);
        assert_eq!(x, dvector![0.5, -1.5]);
    }

    #[test]
    fn norms() {
        let x = dvector![3.0, -4.0];
        assert_eq!(norm(&x), 5.0);
        assert_eq!(norm_inf(&x), 4.0);
        assert_eq!(dot(&x, &x), 25.0);
    }
}
