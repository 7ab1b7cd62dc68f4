//! Functions of two variables.

use nalgebra::DVector;

use crate::core::{convert, DimensionKind, Formula, GradientError, Layout, Real};
use crate::record::{EntryDef, EntryRecord};

use super::{JAMIL_YANG, SURJANOVIC_BINGHAM};

fn planar(name: &str) -> EntryRecord {
    EntryRecord::new(name, DimensionKind::Fixed { n: 2 })
}

fn pair<T: Real>(gx: T, gy: T) -> Result<DVector<T>, GradientError> {
    Ok(DVector::from_vec(vec![gx, gy]))
}

/// Beale function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Beale;

impl Beale {
    fn terms<T: Real>(x: T, y: T) -> [T; 3] {
        [
            convert::<T>(1.5) - x + x * y,
            convert::<T>(2.25) - x + x * y * y,
            convert::<T>(2.625) - x + x * y.powi(3),
        ]
    }
}

impl Formula for Beale {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let [t1, t2, t3] = Self::terms(x[0], x[1]);
        t1 * t1 + t2 * t2 + t3 * t3
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let (x, y) = (x[0], x[1]);
        let [t1, t2, t3] = Self::terms(x, y);
        let two: T = convert(2.0);
        let one = T::one();

        pair(
            two * t1 * (y - one) + two * t2 * (y * y - one) + two * t3 * (y.powi(3) - one),
            two * t1 * x
                + two * t2 * two * x * y
                + two * t3 * convert::<T>(3.0) * x * y * y,
        )
    }
}

/// Booth function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Booth;

impl Formula for Booth {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let two: T = convert(2.0);
        let a = x[0] + two * x[1] - convert(7.0);
        let b = two * x[0] + x[1] - convert(5.0);
        a * a + b * b
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let two: T = convert(2.0);
        let four: T = convert(4.0);
        let a = x[0] + two * x[1] - convert(7.0);
        let b = two * x[0] + x[1] - convert(5.0);
        pair(two * a + four * b, four * a + two * b)
    }
}

/// Matyas function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matyas;

impl Formula for Matyas {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        convert::<T>(0.26) * (x[0] * x[0] + x[1] * x[1]) - convert::<T>(0.48) * x[0] * x[1]
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let a: T = convert(0.52);
        let b: T = convert(0.48);
        pair(a * x[0] - b * x[1], a * x[1] - b * x[0])
    }
}

/// Himmelblau function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Himmelblau;

impl Formula for Himmelblau {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let a = x[0] * x[0] + x[1] - convert(11.0);
        let b = x[0] + x[1] * x[1] - convert(7.0);
        a * a + b * b
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let a = x[0] * x[0] + x[1] - convert(11.0);
        let b = x[0] + x[1] * x[1] - convert(7.0);
        let two: T = convert(2.0);
        let four: T = convert(4.0);
        pair(four * a * x[0] + two * b, two * a + four * b * x[1])
    }
}

/// Three-hump camel function.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeHumpCamel;

impl Formula for ThreeHumpCamel {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let (x, y) = (x[0], x[1]);
        convert::<T>(2.0) * x * x - convert::<T>(1.05) * x.powi(4) + x.powi(6) / convert(6.0)
            + x * y
            + y * y
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let (x, y) = (x[0], x[1]);
        pair(
            convert::<T>(4.0) * x - convert::<T>(4.2) * x.powi(3) + x.powi(5) + y,
            x + convert::<T>(2.0) * y,
        )
    }
}

/// Six-hump camel function.
#[derive(Debug, Clone, Copy, Default)]
pub struct SixHumpCamel;

impl Formula for SixHumpCamel {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let (x, y) = (x[0], x[1]);
        let four: T = convert(4.0);
        (four - convert::<T>(2.1) * x * x + x.powi(4) / convert(3.0)) * x * x
            + x * y
            + (four * y * y - four) * y * y
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let (x, y) = (x[0], x[1]);
        let eight: T = convert(8.0);
        pair(
            eight * x - convert::<T>(8.4) * x.powi(3) + convert::<T>(2.0) * x.powi(5) + y,
            x - eight * y + convert::<T>(16.0) * y.powi(3),
        )
    }
}

/// Branin (Branin-Hoo) function with the standard constants.
#[derive(Debug, Clone, Copy, Default)]
pub struct Branin;

impl Branin {
    // Residual of the squared term, b, c and s (1 - t).
    fn parts<T: Real>(x: T, y: T) -> (T, T, T, T) {
        let pi = T::pi();
        let b = convert::<T>(5.1) / (convert::<T>(4.0) * pi * pi);
        let c = convert::<T>(5.0) / pi;
        let t = T::one() / (convert::<T>(8.0) * pi);
        let r = y - b * x * x + c * x - convert(6.0);
        (r, b, c, convert::<T>(10.0) * (T::one() - t))
    }
}

impl Formula for Branin {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let (r, _, _, s) = Self::parts(x[0], x[1]);
        r * r + s * x[0].cos() + convert(10.0)
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let (r, b, c, s) = Self::parts(x[0], x[1]);
        let two: T = convert(2.0);
        pair(
            two * r * (c - two * b * x[0]) - s * x[0].sin(),
            two * r,
        )
    }
}

/// Easom function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Easom;

impl Easom {
    fn envelope<T: Real>(x: T, y: T) -> T {
        let pi = T::pi();
        (-((x - pi) * (x - pi) + (y - pi) * (y - pi))).exp()
    }
}

impl Formula for Easom {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let (x, y) = (x[0], x[1]);
        -(x.cos() * y.cos() * Self::envelope(x, y))
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let (x, y) = (x[0], x[1]);
        let e = Self::envelope(x, y);
        let two: T = convert(2.0);
        let pi = T::pi();
        pair(
            y.cos() * e * (x.sin() + two * (x - pi) * x.cos()),
            x.cos() * e * (y.sin() + two * (y - pi) * y.cos()),
        )
    }
}

pub(super) fn defs() -> Vec<EntryDef> {
    let square = |a: f64| (Layout::Repeat(vec![-a]), Layout::Repeat(vec![a]));

    let (lower, upper) = square(4.5);
    let beale = planar("beale")
        .with_description("Sharp peaks at the corners of the domain.")
        .with_formula(
            "f(x, y) = (1.5 - x + x y)^2 + (2.25 - x + x y^2)^2 + (2.625 - x + x y^3)^2",
        )
        .with_reference(JAMIL_YANG)
        .with_properties(["bounded", "continuous", "differentiable", "non_separable"])
        .with_bounds(lower, upper)
        .with_start(Layout::Explicit(vec![1.0, 1.0]))
        .with_minimum(vec![Layout::Explicit(vec![3.0, 0.5])], 0.0);

    let (lower, upper) = square(10.0);
    let booth = planar("booth")
        .with_description("Quadratic with an elongated valley.")
        .with_formula("f(x, y) = (x + 2 y - 7)^2 + (2 x + y - 5)^2")
        .with_reference(JAMIL_YANG)
        .with_properties([
            "bounded",
            "continuous",
            "differentiable",
            "non_separable",
            "unimodal",
            "convex",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Explicit(vec![0.0, 0.0]))
        .with_minimum(vec![Layout::Explicit(vec![1.0, 3.0])], 0.0);

    let (lower, upper) = square(10.0);
    let matyas = planar("matyas")
        .with_description("Flat quadratic plate.")
        .with_formula("f(x, y) = 0.26 (x^2 + y^2) - 0.48 x y")
        .with_reference(JAMIL_YANG)
        .with_properties([
            "bounded",
            "continuous",
            "differentiable",
            "non_separable",
            "unimodal",
            "convex",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Explicit(vec![1.0, -0.5]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    let (lower, upper) = square(5.0);
    let himmelblau = planar("himmelblau")
        .with_description("Four identical global minima.")
        .with_formula("f(x, y) = (x^2 + y - 11)^2 + (x + y^2 - 7)^2")
        .with_reference(
            "Himmelblau, D. M. (1972). Applied Nonlinear Programming. McGraw-Hill.",
        )
        .with_properties([
            "bounded",
            "continuous",
            "differentiable",
            "non_separable",
            "multimodal",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Explicit(vec![2.5, 2.5]))
        .with_minimum(
            vec![
                Layout::Explicit(vec![3.0, 2.0]),
                Layout::Explicit(vec![-2.805118086952745, 3.131312518250573]),
                Layout::Explicit(vec![-3.7793102533777469, -3.2831859912861694]),
                Layout::Explicit(vec![3.5844283403304917, -1.8481265269644036]),
            ],
            0.0,
        );

    let (lower, upper) = square(5.0);
    let three_hump_camel = planar("three_hump_camel")
        .with_description("Three local minima, the global one at the origin.")
        .with_formula("f(x, y) = 2 x^2 - 1.05 x^4 + x^6 / 6 + x y + y^2")
        .with_reference(SURJANOVIC_BINGHAM)
        .with_properties([
            "bounded",
            "continuous",
            "differentiable",
            "non_separable",
            "multimodal",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Explicit(vec![0.5, -0.5]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    let six_hump_camel = planar("six_hump_camel")
        .with_description("Six local minima, two of them global and symmetric.")
        .with_formula("f(x, y) = (4 - 2.1 x^2 + x^4 / 3) x^2 + x y + (4 y^2 - 4) y^2")
        .with_reference(SURJANOVIC_BINGHAM)
        .with_properties([
            "bounded",
            "continuous",
            "differentiable",
            "non_separable",
            "multimodal",
        ])
        .with_bounds(
            Layout::Explicit(vec![-3.0, -2.0]),
            Layout::Explicit(vec![3.0, 2.0]),
        )
        .with_start(Layout::Explicit(vec![0.0, -0.5]))
        .with_minimum(
            vec![
                Layout::Explicit(vec![0.08984201310031806, -0.7126564030207396]),
                Layout::Explicit(vec![-0.08984201310031806, 0.7126564030207396]),
            ],
            -1.0316284534898774,
        );

    let branin = planar("branin")
        .with_description("Three global minima in a rectangular domain.")
        .with_formula(
            "f(x, y) = (y - 5.1 x^2 / (4 pi^2) + 5 x / pi - 6)^2 + 10 (1 - 1 / (8 pi)) cos(x) + 10",
        )
        .with_reference(
            "Branin, F. H. (1972). Widely convergent method for finding multiple solutions of \
             simultaneous nonlinear equations. IBM Journal of Research and Development, 16(5), \
             504-522.",
        )
        .with_properties([
            "bounded",
            "continuous",
            "differentiable",
            "non_separable",
            "multimodal",
        ])
        .with_bounds(
            Layout::Explicit(vec![-5.0, 0.0]),
            Layout::Explicit(vec![10.0, 15.0]),
        )
        .with_start(Layout::Explicit(vec![3.0, 2.0]))
        .with_minimum(
            vec![
                Layout::Explicit(vec![-std::f64::consts::PI, 12.275]),
                Layout::Explicit(vec![std::f64::consts::PI, 2.275]),
                Layout::Explicit(vec![3.0 * std::f64::consts::PI, 2.475]),
            ],
            0.39788735772973816,
        );

    let (lower, upper) = square(100.0);
    let easom = planar("easom")
        .with_description("Flat landscape with a single narrow well.")
        .with_formula("f(x, y) = -cos(x) cos(y) exp(-(x - pi)^2 - (y - pi)^2)")
        .with_reference(
            "Easom, E. E. (1990). A survey of global optimization techniques. M. Eng. thesis, \
             University of Louisville.",
        )
        .with_properties([
            "bounded",
            "continuous",
            "differentiable",
            "non_separable",
            "multimodal",
        ])
        .with_bounds(lower, upper)
        .with_start(Layout::Explicit(vec![3.0, 3.0]))
        .with_minimum(
            vec![Layout::Repeat(vec![std::f64::consts::PI])],
            -1.0,
        );

    vec![
        EntryDef::new(Beale, beale),
        EntryDef::new(Booth, booth),
        EntryDef::new(Matyas, matyas),
        EntryDef::new(Himmelblau, himmelblau),
        EntryDef::new(ThreeHumpCamel, three_hump_camel),
        EntryDef::new(SixHumpCamel, six_hump_camel),
        EntryDef::new(Branin, branin),
        EntryDef::new(Easom, easom),
    ]
}
