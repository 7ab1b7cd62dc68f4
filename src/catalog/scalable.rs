//! Functions defined for any number of variables.

use nalgebra::DVector;

use crate::core::{convert, DimensionKind, Formula, GradientError, Layout, Real};
use crate::record::{EntryDef, EntryRecord};

use super::JAMIL_YANG;

fn scalable(name: &str, default_n: Option<usize>) -> EntryRecord {
    EntryRecord::new(name, DimensionKind::Scalable { default_n })
}

fn box_bounds(lower: f64, upper: f64) -> (Layout, Layout) {
    (Layout::Repeat(vec![lower]), Layout::Repeat(vec![upper]))
}

fn sum<T: Real>(x: &DVector<T>, f: impl Fn(usize, T) -> T) -> T {
    x.iter()
        .enumerate()
        .fold(T::zero(), |acc, (i, &xi)| acc + f(i, xi))
}

/// Sphere function, `f(x) = sum x_i^2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sphere;

impl Formula for Sphere {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        sum(x, |_, xi| xi * xi)
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let two: T = convert(2.0);
        Ok(x.map(|xi| two * xi))
    }
}

/// Sum of squares with weights, `f(x) = sum i x_i^2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumSquares;

impl Formula for SumSquares {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        sum(x, |i, xi| convert::<T>((i + 1) as f64) * xi * xi)
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        Ok(DVector::from_iterator(
            x.len(),
            x.iter()
                .enumerate()
                .map(|(i, &xi)| convert::<T>(2.0 * (i + 1) as f64) * xi),
        ))
    }
}

/// Zakharov function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zakharov;

impl Zakharov {
    fn weighted<T: Real>(x: &DVector<T>) -> T {
        sum(x, |i, xi| convert::<T>(0.5 * (i + 1) as f64) * xi)
    }
}

impl Formula for Zakharov {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let s = Self::weighted(x);
        sum(x, |_, xi| xi * xi) + s * s + s.powi(4)
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let s = Self::weighted(x);
        let two: T = convert(2.0);
        let ds = two * s + convert::<T>(4.0) * s.powi(3);

        Ok(DVector::from_iterator(
            x.len(),
            x.iter()
                .enumerate()
                .map(|(i, &xi)| two * xi + ds * convert::<T>(0.5 * (i + 1) as f64)),
        ))
    }
}

/// Extended Rosenbrock function (chained form).
#[derive(Debug, Clone, Copy, Default)]
pub struct Rosenbrock;

impl Formula for Rosenbrock {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let hundred: T = convert(100.0);
        x.as_slice().windows(2).fold(T::zero(), |acc, w| {
            let a = w[1] - w[0] * w[0];
            let b = T::one() - w[0];
            acc + hundred * a * a + b * b
        })
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let n = x.len();
        let mut g = DVector::from_element(n, T::zero());

        for i in 0..n.saturating_sub(1) {
            let a = x[i + 1] - x[i] * x[i];
            g[i] += convert::<T>(-400.0) * x[i] * a - convert::<T>(2.0) * (T::one() - x[i]);
            g[i + 1] += convert::<T>(200.0) * a;
        }

        Ok(g)
    }
}

/// Rastrigin function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rastrigin;

impl Formula for Rastrigin {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let ten: T = convert(10.0);
        let two_pi = convert::<T>(2.0) * T::pi();
        x.iter().fold(ten * convert(x.len() as f64), |acc, &xi| {
            acc + (xi * xi - ten * (two_pi * xi).cos())
        })
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let two: T = convert(2.0);
        let two_pi = two * T::pi();
        let c = convert::<T>(10.0) * two_pi;
        Ok(x.map(|xi| two * xi + c * (two_pi * xi).sin()))
    }
}

/// Ackley function with `a = 20`, `b = 0.2` and `c = 2 pi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ackley;

impl Ackley {
    fn parts<T: Real>(x: &DVector<T>) -> (T, T) {
        let n: T = convert(x.len() as f64);
        let two_pi = convert::<T>(2.0) * T::pi();
        let r = (sum(x, |_, xi| xi * xi) / n).sqrt();
        let s = sum(x, |_, xi| (two_pi * xi).cos()) / n;
        (r, s)
    }
}

impl Formula for Ackley {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let a: T = convert(20.0);
        let b: T = convert(0.2);
        let (r, s) = Self::parts(x);
        a + T::e() - a * (-b * r).exp() - s.exp()
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let (r, s) = Self::parts(x);
        if r == T::zero() {
            return Err(GradientError::NonDifferentiable {
                reason: "norm term at the origin",
            });
        }

        let n: T = convert(x.len() as f64);
        let b: T = convert(0.2);
        let two_pi = convert::<T>(2.0) * T::pi();
        let radial = convert::<T>(20.0) * b * (-b * r).exp() / (n * r);
        let periodic = s.exp() * two_pi / n;

        Ok(x.map(|xi| radial * xi + periodic * (two_pi * xi).sin()))
    }
}

/// Griewank function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Griewank;

impl Formula for Griewank {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let quadratic = sum(x, |_, xi| xi * xi) / convert(4000.0);
        let product = x.iter().enumerate().fold(T::one(), |acc, (i, &xi)| {
            acc * (xi / convert::<T>((i + 1) as f64).sqrt()).cos()
        });
        T::one() + quadratic - product
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let n = x.len();
        let roots: Vec<T> = (0..n).map(|i| convert::<T>((i + 1) as f64).sqrt()).collect();

        Ok(DVector::from_iterator(
            n,
            (0..n).map(|i| {
                // Product over the other variables, no division by a cosine.
                let others = (0..n)
                    .filter(|&j| j != i)
                    .fold(T::one(), |acc, j| acc * (x[j] / roots[j]).cos());
                x[i] / convert(2000.0) + (x[i] / roots[i]).sin() / roots[i] * others
            }),
        ))
    }
}

/// Styblinski-Tang function.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyblinskiTang;

impl Formula for StyblinskiTang {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let half: T = convert(0.5);
        half * sum(x, |_, xi| {
            xi.powi(4) - convert::<T>(16.0) * xi * xi + convert::<T>(5.0) * xi
        })
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        Ok(x.map(|xi| {
            convert::<T>(2.0) * xi.powi(3) - convert::<T>(16.0) * xi + convert::<T>(2.5)
        }))
    }
}

/// Levy function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Levy;

impl Levy {
    fn w<T: Real>(xi: T) -> T {
        T::one() + (xi - T::one()) / convert(4.0)
    }
}

impl Formula for Levy {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let n = x.len();
        let pi = T::pi();
        let ten: T = convert(10.0);

        let first = (pi * Self::w(x[0])).sin();
        let middle = (0..n - 1).fold(T::zero(), |acc, i| {
            let wi = Self::w(x[i]);
            let s = (pi * wi + T::one()).sin();
            acc + (wi - T::one()).powi(2) * (T::one() + ten * s * s)
        });
        let wn = Self::w(x[n - 1]);
        let s = (convert::<T>(2.0) * pi * wn).sin();
        let last = (wn - T::one()).powi(2) * (T::one() + s * s);

        first * first + middle + last
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let n = x.len();
        let pi = T::pi();
        let two: T = convert(2.0);
        let ten: T = convert(10.0);
        let mut g = DVector::from_element(n, T::zero());

        // Derivatives with respect to w_i, scaled by dw/dx = 1/4 at the end.
        let w0 = Self::w(x[0]);
        g[0] += two * (pi * w0).sin() * (pi * w0).cos() * pi;

        for i in 0..n - 1 {
            let wi = Self::w(x[i]);
            let (s, c) = ((pi * wi + T::one()).sin(), (pi * wi + T::one()).cos());
            g[i] += two * (wi - T::one()) * (T::one() + ten * s * s)
                + (wi - T::one()).powi(2) * convert::<T>(20.0) * s * c * pi;
        }

        let wn = Self::w(x[n - 1]);
        let (s, c) = ((two * pi * wn).sin(), (two * pi * wn).cos());
        g[n - 1] += two * (wn - T::one()) * (T::one() + s * s)
            + (wn - T::one()).powi(2) * two * s * c * two * pi;

        let quarter: T = convert(0.25);
        Ok(g.map(|gi| gi * quarter))
    }
}

/// Alpine N.1 function, `f(x) = sum |x_i sin(x_i) + 0.1 x_i|`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlpineN1;

impl Formula for AlpineN1 {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let c: T = convert(0.1);
        sum(x, |_, xi| (xi * xi.sin() + c * xi).abs())
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let c: T = convert(0.1);
        let mut g = DVector::from_element(x.len(), T::zero());

        for (i, &xi) in x.iter().enumerate() {
            let inner = xi * xi.sin() + c * xi;
            if inner == T::zero() {
                return Err(GradientError::NonDifferentiable {
                    reason: "absolute value at a root of x sin(x) + 0.1 x",
                });
            }
            g[i] = inner.signum() * (xi.sin() + xi * xi.cos() + c);
        }

        Ok(g)
    }
}

/// Powell singular function. Defined for multiples of four variables, other
/// dimensions evaluate to NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct Powell;

impl Formula for Powell {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        if x.len() % 4 != 0 {
            return T::nan();
        }

        let five: T = convert(5.0);
        let ten: T = convert(10.0);
        x.as_slice().chunks(4).fold(T::zero(), |acc, v| {
            let a = v[0] + ten * v[1];
            let b = v[2] - v[3];
            let c = v[1] - convert::<T>(2.0) * v[2];
            let d = v[0] - v[3];
            acc + a * a + five * b * b + c.powi(4) + ten * d.powi(4)
        })
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let n = x.len();
        if n % 4 != 0 {
            return Err(GradientError::InvalidDimensionality {
                expected: (n / 4 + 1) * 4,
                got: n,
            });
        }

        let two: T = convert(2.0);
        let ten: T = convert(10.0);
        let forty: T = convert(40.0);
        let mut g = DVector::from_element(n, T::zero());

        for k in (0..n).step_by(4) {
            let a = x[k] + ten * x[k + 1];
            let b = x[k + 2] - x[k + 3];
            let c = x[k + 1] - two * x[k + 2];
            let d = x[k] - x[k + 3];

            g[k] = two * a + forty * d.powi(3);
            g[k + 1] = convert::<T>(20.0) * a + convert::<T>(4.0) * c.powi(3);
            g[k + 2] = ten * b - convert::<T>(8.0) * c.powi(3);
            g[k + 3] = -ten * b - forty * d.powi(3);
        }

        Ok(g)
    }
}

pub(super) fn defs() -> Vec<EntryDef> {
    let smooth_bowl = [
        "continuous",
        "differentiable",
        "separable",
        "scalable",
        "unimodal",
        "convex",
    ];

    let (lower, upper) = box_bounds(-5.12, 5.12);
    let sphere = scalable("sphere", Some(2))
        .with_description("Sum of squares of all variables.")
        .with_formula("f(x) = sum_i x_i^2")
        .with_reference(JAMIL_YANG)
        .with_properties(smooth_bowl)
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![1.0]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    let (lower, upper) = box_bounds(-10.0, 10.0);
    let sum_squares = scalable("sum_squares", Some(2))
        .with_description("Sum of squares weighted by the variable index.")
        .with_formula("f(x) = sum_i i x_i^2")
        .with_reference(JAMIL_YANG)
        .with_properties(smooth_bowl)
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![1.0]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    let (lower, upper) = box_bounds(-5.0, 10.0);
    let zakharov = scalable("zakharov", Some(2))
        .with_description("Plate-shaped function with a coupling of all variables.")
        .with_formula("f(x) = sum_i x_i^2 + (sum_i 0.5 i x_i)^2 + (sum_i 0.5 i x_i)^4")
        .with_reference(JAMIL_YANG)
        .with_properties([
            "continuous",
            "differentiable",
            "non_separable",
            "scalable",
            "unimodal",
            "convex",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![1.0]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    let (lower, upper) = box_bounds(-5.0, 10.0);
    let rosenbrock = scalable("rosenbrock", Some(2))
        .with_description("Narrow curved valley leading to the minimum.")
        .with_formula("f(x) = sum_{i<n} 100 (x_{i+1} - x_i^2)^2 + (1 - x_i)^2")
        .with_reference(
            "Rosenbrock, H. H. (1960). An automatic method for finding the greatest or least \
             value of a function. The Computer Journal, 3(3), 175-184.",
        )
        .with_properties([
            "continuous",
            "differentiable",
            "non_separable",
            "scalable",
            "unimodal",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![-1.2, 1.0]))
        .with_minimum(vec![Layout::Repeat(vec![1.0])], 0.0);

    let (lower, upper) = box_bounds(-5.12, 5.12);
    let rastrigin = scalable("rastrigin", Some(2))
        .with_description("Sphere with a regular cosine modulation, many local minima.")
        .with_formula("f(x) = 10 n + sum_i (x_i^2 - 10 cos(2 pi x_i))")
        .with_reference(JAMIL_YANG)
        .with_properties([
            "continuous",
            "differentiable",
            "separable",
            "scalable",
            "multimodal",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![0.2]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    let (lower, upper) = box_bounds(-32.768, 32.768);
    let ackley = scalable("ackley", Some(2))
        .with_description("Nearly flat outer region with a deep hole at the origin.")
        .with_formula(
            "f(x) = -20 exp(-0.2 sqrt(sum_i x_i^2 / n)) - exp(sum_i cos(2 pi x_i) / n) + 20 + e",
        )
        .with_reference(
            "Ackley, D. H. (1987). A connectionist machine for genetic hillclimbing. Kluwer.",
        )
        .with_properties(["continuous", "non_separable", "scalable", "multimodal"])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![0.2]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    let (lower, upper) = box_bounds(-600.0, 600.0);
    let griewank = scalable("griewank", Some(2))
        .with_description("Wide paraboloid with a product of cosines superimposed.")
        .with_formula("f(x) = 1 + sum_i x_i^2 / 4000 - prod_i cos(x_i / sqrt(i))")
        .with_reference(
            "Griewank, A. O. (1981). Generalized descent for global optimization. Journal of \
             Optimization Theory and Applications, 34, 11-39.",
        )
        .with_properties([
            "continuous",
            "differentiable",
            "non_separable",
            "scalable",
            "multimodal",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![0.5]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    let (lower, upper) = box_bounds(-5.0, 5.0);
    let styblinski_tang = scalable("styblinski_tang", Some(2))
        .with_description("Quartic in every variable, minimum value grows with the dimension.")
        .with_formula("f(x) = 0.5 sum_i (x_i^4 - 16 x_i^2 + 5 x_i)")
        .with_reference(
            "Styblinski, M. A., Tang, T.-S. (1990). Experiments in nonconvex optimization: \
             stochastic approximation with function smoothing and simulated annealing. Neural \
             Networks, 3(4), 467-483.",
        )
        .with_properties([
            "continuous",
            "differentiable",
            "separable",
            "scalable",
            "multimodal",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![-2.5]))
        .with_minimum_per_dimension(
            vec![Layout::Repeat(vec![-2.903534027771177])],
            -39.166165703771415,
        );

    let (lower, upper) = box_bounds(-10.0, 10.0);
    let levy = scalable("levy", Some(2))
        .with_description("Sine-modulated sum with the minimum at all ones.")
        .with_formula(
            "f(x) = sin^2(pi w_1) + sum_{i<n} (w_i - 1)^2 (1 + 10 sin^2(pi w_i + 1)) \
             + (w_n - 1)^2 (1 + sin^2(2 pi w_n)), w_i = 1 + (x_i - 1) / 4",
        )
        .with_reference(
            "Levy, A., Montalvo, A. (1985). The tunneling algorithm for the global minimization \
             of functions. SIAM Journal on Scientific and Statistical Computing, 6(1), 15-29.",
        )
        .with_properties(["continuous", "differentiable", "scalable", "multimodal"])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![1.2]))
        .with_minimum(vec![Layout::Repeat(vec![1.0])], 0.0);

    let (lower, upper) = box_bounds(-10.0, 10.0);
    let alpine_n1 = scalable("alpine_n1", Some(2))
        .with_description("Sum of absolute values, non-differentiable at every zero.")
        .with_formula("f(x) = sum_i |x_i sin(x_i) + 0.1 x_i|")
        .with_reference(JAMIL_YANG)
        .with_properties(["continuous", "separable", "scalable", "multimodal"])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![0.05]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    // Recorded before dimension defaults existed: the minimizer is stored for
    // four variables only and the dimension is found by probing.
    let (lower, upper) = box_bounds(-4.0, 5.0);
    let powell = scalable("powell", None)
        .with_description("Sum of blocks of four variables with a singular Hessian at the minimum.")
        .with_formula(
            "f(x) = sum_blocks (x_1 + 10 x_2)^2 + 5 (x_3 - x_4)^2 + (x_2 - 2 x_3)^4 \
             + 10 (x_1 - x_4)^4",
        )
        .with_reference(
            "Powell, M. J. D. (1962). An iterative method for finding stationary values of a \
             function of several variables. The Computer Journal, 5(2), 147-151.",
        )
        .with_properties([
            "continuous",
            "differentiable",
            "non_separable",
            "scalable",
            "unimodal",
            "convex",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Repeat(vec![3.0, -1.0, 0.0, 1.0]))
        .with_minimum(vec![Layout::Explicit(vec![0.0; 4])], 0.0);

    vec![
        EntryDef::new(Sphere, sphere),
        EntryDef::new(SumSquares, sum_squares),
        EntryDef::new(Zakharov, zakharov),
        EntryDef::new(Rosenbrock, rosenbrock),
        EntryDef::new(Rastrigin, rastrigin),
        EntryDef::new(Ackley, ackley),
        EntryDef::new(Griewank, griewank),
        EntryDef::new(StyblinskiTang, styblinski_tang),
        EntryDef::new(Levy, levy),
        EntryDef::new(AlpineN1, alpine_n1),
        EntryDef::new(Powell, powell),
    ]
}
