//! Projected BFGS quasi-Newton method.
//!
//! [BFGS](https://en.wikipedia.org/wiki/Broyden%E2%80%93Fletcher%E2%80%93Goldfarb%E2%80%93Shanno_algorithm)
//! maintains an approximation of the inverse Hessian matrix that is updated
//! from the change of the gradient between iterations. Bound constraints are
//! handled by projection: the search direction is zeroed for variables that
//! sit on an active bound and every trial point is projected back into the
//! domain. Step length is found by Armijo backtracking along the projected
//! path.
//!
//! The implementation is generic over [`Real`], so the same code runs in
//! double precision and in [`DoubleDouble`](crate::core::DoubleDouble)
//! extended precision.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Projected Newton Methods for Optimization Problems with Simple
//! Constraints](https://epubs.siam.org/doi/10.1137/0320018)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::core::{convert, Domain, FunctionEntry, GradientError, Real, Representation};
use crate::derivatives::{dot, norm_inf};

/// Objective function with gradient.
pub trait Objective<T: Real> {
    /// Value at `x`. Points outside of the domain of definition evaluate to
    /// NaN.
    fn value(&self, x: &DVector<T>) -> T;

    /// Gradient at `x`.
    fn gradient(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError>;
}

impl<T: Representation> Objective<T> for FunctionEntry {
    fn value(&self, x: &DVector<T>) -> T {
        self.evaluate(x).unwrap_or_else(|_| T::nan())
    }

    fn gradient(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        FunctionEntry::gradient(self, x)
    }
}

/// Options for [`Bfgs`] optimizer.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct BfgsOptions {
    /// Projected gradient (infinity norm) tolerance. Default: `1e-15`.
    gtol: f64,
    /// Relative function change tolerance. Default: `1e-28`.
    ftol: f64,
    /// Relative step size tolerance. Default: `1e-24`.
    xtol: f64,
    /// Projected gradient below which a stalled search counts as converged.
    /// Default: `1e-10`.
    stall_gtol: f64,
    /// Maximum number of iterations. Default: `2000`.
    max_iters: usize,
    /// Sufficient decrease coefficient of the Armijo condition. Default:
    /// `1e-4`.
    armijo: f64,
    /// Step shrinking factor in backtracking. Default: `0.5`.
    backtrack: f64,
    /// Maximum number of step shrinkings. Default: `80`.
    max_backtracks: usize,
}

impl Default for BfgsOptions {
    fn default() -> Self {
        Self {
            gtol: 1e-15,
            ftol: 1e-28,
            xtol: 1e-24,
            stall_gtol: 1e-10,
            max_iters: 2000,
            armijo: 1e-4,
            backtrack: 0.5,
            max_backtracks: 80,
        }
    }
}

/// Reason for successful termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Projected gradient below `gtol`.
    Gradient,
    /// Function change and step (or projected gradient) below tolerances.
    Tolerance,
    /// No further decrease possible, but the projected gradient is below
    /// `stall_gtol`.
    Stalled,
}

/// Result of a successful minimization.
#[derive(Debug, Clone)]
pub struct BfgsReport<T: Real> {
    /// Final point.
    pub x: DVector<T>,
    /// Function value at the final point.
    pub fx: T,
    /// Infinity norm of the projected gradient at the final point.
    pub pg_norm: T,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Why the method stopped.
    pub termination: Termination,
}

/// Error returned from [`Bfgs`] optimizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BfgsError {
    /// Iteration budget exhausted.
    #[error("no convergence after {iterations} iterations")]
    NoConvergence {
        /// Number of iterations performed.
        iterations: usize,
    },
    /// Backtracking could not decrease the function value far from a
    /// stationary point.
    #[error("line search failed in iteration {iteration}")]
    LineSearchFailed {
        /// Iteration in which the failure occurred.
        iteration: usize,
    },
    /// Gradient evaluation failed.
    #[error("{0}")]
    NonDifferentiable(#[from] GradientError),
    /// Function value or gradient is not finite at the starting point.
    #[error("invalid starting point")]
    InvalidStart,
    /// Gradient became non-finite during the iterations.
    #[error("non-finite gradient in iteration {iteration}")]
    InvalidValue {
        /// Iteration in which the failure occurred.
        iteration: usize,
    },
}

/// Projected BFGS optimizer.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone, Default)]
pub struct Bfgs {
    options: BfgsOptions,
}

impl Bfgs {
    /// Initializes BFGS optimizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes BFGS optimizer with given options.
    pub fn with_options(options: BfgsOptions) -> Self {
        Self { options }
    }

    /// Options of the optimizer.
    pub fn options(&self) -> &BfgsOptions {
        &self.options
    }

    /// Minimizes the objective starting from `x0`, optionally within a box
    /// domain.
    pub fn minimize<T, F>(
        &self,
        f: &F,
        x0: DVector<T>,
        domain: Option<&Domain<T>>,
    ) -> Result<BfgsReport<T>, BfgsError>
    where
        T: Real,
        F: Objective<T> + ?Sized,
    {
        let BfgsOptions {
            gtol,
            ftol,
            xtol,
            stall_gtol,
            max_iters,
            armijo,
            backtrack,
            max_backtracks,
        } = self.options;

        let gtol: T = convert(gtol);
        let ftol: T = convert(ftol);
        let xtol: T = convert(xtol);
        let stall_gtol: T = convert(stall_gtol);
        let c1: T = convert(armijo);
        let shrink: T = convert(backtrack);

        let n = x0.len();
        let mut x = x0;
        if let Some(domain) = domain {
            domain.project(&mut x);
        }

        let mut fx = f.value(&x);
        if !fx.is_finite() {
            return Err(BfgsError::InvalidStart);
        }

        let mut g = f.gradient(&x)?;
        if g.iter().any(|gi| !gi.is_finite()) {
            return Err(BfgsError::InvalidStart);
        }

        let mut h = DMatrix::<T>::identity(n, n);
        let mut h_is_identity = true;
        let mut pg = projected_gradient(&x, &g, domain);

        for iter in 0..max_iters {
            let pg_norm = norm_inf(&pg);

            debug!(
                "iter = {}\tf = {}\t|| pg || = {:e}",
                iter,
                fx,
                pg_norm.to_f64()
            );

            if pg_norm <= gtol {
                return Ok(BfgsReport {
                    x,
                    fx,
                    pg_norm,
                    iterations: iter,
                    termination: Termination::Gradient,
                });
            }

            // Variables sitting on a bound with gradient pushing outwards do
            // not move.
            let free: Vec<bool> = (0..n)
                .map(|i| pg[i] != T::zero() || g[i] == T::zero())
                .collect();

            let mut d = direction(&h, &g, &free);
            if dot(&d, &g) >= T::zero() {
                h = DMatrix::identity(n, n);
                h_is_identity = true;
                d = pg.map(|v| -v);
            }

            let mut alpha = T::one();
            let mut accepted = None;

            for _ in 0..max_backtracks {
                let mut trial = DVector::from_iterator(
                    n,
                    x.iter().zip(d.iter()).map(|(&xi, &di)| xi + alpha * di),
                );
                if let Some(domain) = domain {
                    domain.project(&mut trial);
                }

                let ft = f.value(&trial);
                let s = DVector::from_iterator(
                    n,
                    trial.iter().zip(x.iter()).map(|(&ti, &xi)| ti - xi),
                );

                if ft.is_finite() && ft <= fx + c1 * dot(&g, &s) {
                    accepted = Some((trial, ft, s));
                    break;
                }

                alpha *= shrink;
            }

            let (trial, ft, s) = match accepted {
                Some(accepted) => accepted,
                None if !h_is_identity => {
                    debug!("line search failed, resetting inverse Hessian approximation");
                    h = DMatrix::identity(n, n);
                    h_is_identity = true;
                    continue;
                }
                None if pg_norm <= stall_gtol => {
                    return Ok(BfgsReport {
                        x,
                        fx,
                        pg_norm,
                        iterations: iter,
                        termination: Termination::Stalled,
                    });
                }
                None => return Err(BfgsError::LineSearchFailed { iteration: iter }),
            };

            let g_new = f.gradient(&trial)?;
            if g_new.iter().any(|gi| !gi.is_finite()) {
                return Err(BfgsError::InvalidValue { iteration: iter });
            }

            let y = DVector::from_iterator(
                n,
                g_new.iter().zip(g.iter()).map(|(&gn, &go)| gn - go),
            );
            let df = (fx - ft).abs();
            let step = norm_inf(&s);

            x = trial;
            fx = ft;
            g = g_new;
            pg = projected_gradient(&x, &g, domain);

            let sy = dot(&s, &y);
            if sy > T::zero() {
                update_inverse_hessian(&mut h, &s, &y, sy);
                h_is_identity = false;
            }

            let one = T::one();
            let pg_norm = norm_inf(&pg);
            if df <= ftol * fx.abs().max(one)
                && (step <= xtol * norm_inf(&x).max(one) || pg_norm <= stall_gtol)
            {
                return Ok(BfgsReport {
                    x,
                    fx,
                    pg_norm,
                    iterations: iter + 1,
                    termination: Termination::Tolerance,
                });
            }
        }

        Err(BfgsError::NoConvergence {
            iterations: max_iters,
        })
    }
}

fn projected_gradient<T: Real>(
    x: &DVector<T>,
    g: &DVector<T>,
    domain: Option<&Domain<T>>,
) -> DVector<T> {
    let mut pg = g.clone();

    if let Some(domain) = domain {
        for i in 0..x.len() {
            let at_lower = x[i] <= domain.lower()[i] && g[i] > T::zero();
            let at_upper = x[i] >= domain.upper()[i] && g[i] < T::zero();
            if at_lower || at_upper {
                pg[i] = T::zero();
            }
        }
    }

    pg
}

// d = -H g restricted to free variables.
fn direction<T: Real>(h: &DMatrix<T>, g: &DVector<T>, free: &[bool]) -> DVector<T> {
    let n = g.len();
    DVector::from_iterator(
        n,
        (0..n).map(|i| {
            if !free[i] {
                return T::zero();
            }
            let mut acc = T::zero();
            for j in (0..n).filter(|&j| free[j]) {
                acc += h[(i, j)] * g[j];
            }
            -acc
        }),
    )
}

// H += -rho (H y s' + s (H y)') + (rho^2 y'H y + rho) s s'
fn update_inverse_hessian<T: Real>(h: &mut DMatrix<T>, s: &DVector<T>, y: &DVector<T>, sy: T) {
    let n = s.len();
    let rho = T::one() / sy;

    let hy = DVector::from_iterator(
        n,
        (0..n).map(|i| (0..n).fold(T::zero(), |acc, j| acc + h[(i, j)] * y[j])),
    );
    let yhy = dot(y, &hy);
    let coeff = rho * rho * yhy + rho;

    for i in 0..n {
        for j in 0..n {
            h[(i, j)] += coeff * s[i] * s[j] - rho * (hy[i] * s[j] + s[i] * hy[j]);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    use super::*;
    use crate::core::{lift, lower, DoubleDouble};

    struct Rosenbrock;

    impl<T: Real> Objective<T> for Rosenbrock {
        fn value(&self, x: &DVector<T>) -> T {
            let a = T::one() - x[0];
            let b = x[1] - x[0] * x[0];
            a * a + convert::<T>(100.0) * b * b
        }

        fn gradient(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
            let b = x[1] - x[0] * x[0];
            let g0 = convert::<T>(-2.0) * (T::one() - x[0]) - convert::<T>(400.0) * x[0] * b;
            let g1 = convert::<T>(200.0) * b;
            Ok(DVector::from_vec(vec![g0, g1]))
        }
    }

    struct Shifted(f64);

    impl<T: Real> Objective<T> for Shifted {
        fn value(&self, x: &DVector<T>) -> T {
            x.iter().fold(T::zero(), |acc, &xi| {
                let d = xi - convert(self.0);
                acc + d * d
            })
        }

        fn gradient(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
            Ok(x.map(|xi| convert::<T>(2.0) * (xi - convert(self.0))))
        }
    }

    #[test]
    fn rosenbrock_double_precision() {
        let mut options = BfgsOptions::default();
        options.set_gtol(1e-8).set_stall_gtol(1e-6);
        let bfgs = Bfgs::with_options(options);

        let report = bfgs
            .minimize(&Rosenbrock, dvector![-1.2, 1.0], None)
            .unwrap();

        assert_abs_diff_eq!(report.x, dvector![1.0, 1.0], epsilon = 1e-6);
        assert!(report.fx < 1e-12);
    }

    #[test]
    fn rosenbrock_extended_precision() {
        let x0: DVector<DoubleDouble> = lift(&dvector![-1.2, 1.0]);
        let report = Bfgs::new().minimize(&Rosenbrock, x0, None).unwrap();

        assert_abs_diff_eq!(lower(&report.x), dvector![1.0, 1.0], epsilon = 1e-14);
        assert!(report.fx.to_f64() < 1e-28);
    }

    #[test]
    fn starting_at_minimum_terminates_immediately() {
        let report = Bfgs::new()
            .minimize(&Rosenbrock, dvector![1.0, 1.0], None)
            .unwrap();

        assert_eq!(report.iterations, 0);
        assert_eq!(report.termination, Termination::Gradient);
    }

    #[test]
    fn active_bounds_are_respected() {
        let domain: Domain<f64> = [(0.0, 1.0), (-1.0, 5.0)].into_iter().collect();
        let mut options = BfgsOptions::default();
        options.set_gtol(1e-10).set_stall_gtol(1e-8);

        let report = Bfgs::with_options(options)
            .minimize(&Shifted(3.0), dvector![0.5, 0.0], Some(&domain))
            .unwrap();

        assert_abs_diff_eq!(report.x, dvector![1.0, 3.0], epsilon = 1e-8);
        assert!(domain.contains(&report.x));
    }

    #[test]
    fn iteration_budget() {
        let mut options = BfgsOptions::default();
        options.set_max_iters(2);

        assert_eq!(
            Bfgs::with_options(options)
                .minimize(&Rosenbrock, dvector![-1.2, 1.0], None)
                .unwrap_err(),
            BfgsError::NoConvergence { iterations: 2 }
        );
    }

    #[test]
    fn invalid_start() {
        assert_eq!(
            Bfgs::new()
                .minimize(&Rosenbrock, dvector![f64::NAN, 1.0], None)
                .unwrap_err(),
            BfgsError::InvalidStart
        );
    }
}
