//! Functions with a random or partially undefined value.

use nalgebra::DVector;
use rand::Rng;

use crate::core::{convert, DimensionKind, Formula, GradientError, Layout, Real};
use crate::record::{EntryDef, EntryRecord};

use super::JAMIL_YANG;

/// Quartic function with uniform noise in `[0, 1)`.
///
/// The noise is drawn on every evaluation and carries no derivative
/// information; the gradient is the gradient of the noise-free part.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuarticNoise;

impl Formula for QuarticNoise {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let noise: T = convert(rand::thread_rng().gen::<f64>());
        x.iter().enumerate().fold(noise, |acc, (i, &xi)| {
            acc + convert::<T>((i + 1) as f64) * xi.powi(4)
        })
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        Ok(DVector::from_iterator(
            x.len(),
            x.iter()
                .enumerate()
                .map(|(i, &xi)| convert::<T>(4.0 * (i + 1) as f64) * xi.powi(3)),
        ))
    }
}

/// Mishra's bird function restricted to the disk `(x + 5)^2 + (y + 5)^2 < 25`.
/// Points outside of the disk evaluate to NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct MishraBird;

impl MishraBird {
    fn feasible<T: Real>(x: T, y: T) -> bool {
        let five: T = convert(5.0);
        (x + five) * (x + five) + (y + five) * (y + five) < convert(25.0)
    }

    fn exponentials<T: Real>(x: T, y: T) -> (T, T) {
        let a = T::one() - x.cos();
        let b = T::one() - y.sin();
        ((a * a).exp(), (b * b).exp())
    }
}

impl Formula for MishraBird {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let (x, y) = (x[0], x[1]);
        if !Self::feasible(x, y) {
            return T::nan();
        }

        let (ex, ey) = Self::exponentials(x, y);
        y.sin() * ex + x.cos() * ey + (x - y) * (x - y)
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let (x, y) = (x[0], x[1]);
        if !Self::feasible(x, y) {
            return Ok(DVector::from_element(2, T::nan()));
        }

        let (ex, ey) = Self::exponentials(x, y);
        let two: T = convert(2.0);

        Ok(DVector::from_vec(vec![
            y.sin() * ex * two * (T::one() - x.cos()) * x.sin() - x.sin() * ey
                + two * (x - y),
            y.cos() * ex - x.cos() * ey * two * (T::one() - y.sin()) * y.cos() - two * (x - y),
        ]))
    }
}

pub(super) fn defs() -> Vec<EntryDef> {
    let quartic_noise = EntryRecord::new(
        "quartic_noise",
        DimensionKind::Scalable { default_n: Some(2) },
    )
    .with_description("Weighted quartic with uniform random noise added to every value.")
    .with_formula("f(x) = sum_i i x_i^4 + U[0, 1)")
    .with_reference(JAMIL_YANG)
    .with_properties(["continuous", "separable", "scalable", "has_noise"])
    .with_bounds(Layout::Repeat(vec![-1.28]), Layout::Repeat(vec![1.28]))
    .with_start(Layout::Repeat(vec![0.5]))
    .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);

    // Published values of the minimum differ in the last digits between
    // sources.
    let mishra_bird = EntryRecord::new("mishra_bird", DimensionKind::Fixed { n: 2 })
        .with_description("Bird-shaped landscape defined on a disk only.")
        .with_formula(
            "f(x, y) = sin(y) exp((1 - cos x)^2) + cos(x) exp((1 - sin y)^2) + (x - y)^2, \
             (x + 5)^2 + (y + 5)^2 < 25",
        )
        .with_reference(
            "Mishra, S. K. (2006). Some new test functions for global optimization and \
             performance of repulsive particle swarm method. MPRA Paper 2718.",
        )
        .with_properties([
            "bounded",
            "constrained",
            "continuous",
            "differentiable",
            "non_separable",
            "multimodal",
            "controversial",
        ])
        .with_bounds(
            Layout::Explicit(vec![-10.0, -6.5]),
            Layout::Explicit(vec![0.0, 0.0]),
        )
        .with_start(Layout::Explicit(vec![-3.0, -1.5]))
        .with_minimum(
            vec![Layout::Explicit(vec![-3.1302468034546564, -1.5821421769300335])],
            -106.76453674926467,
        );

    vec![
        EntryDef::new(QuarticNoise, quartic_noise),
        EntryDef::new(MishraBird, mishra_bird),
    ]
}
