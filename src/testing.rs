//! Formulas and fixtures useful for testing, debugging and smoke testing of
//! catalog operations.
//!
//! [`Paraboloid`] (sum of squares) is recommended for first tests, because its
//! minimum, gradient and properties are known exactly in every dimension.
//! Others can be used for specific conditions (e.g., coupled variables or a
//! noisy value).
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)

#![allow(unused)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use nalgebra::DVector;
use rand::Rng;

use crate::core::{
    convert, DimensionKind, FunctionEntry, Formula, GradientError, Kernel, Layout, Real,
};
use crate::record::{EntryDef, EntryRecord};

/// Sum of squares, `f(x) = sum x_i^2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Paraboloid;

impl Formula for Paraboloid {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        x.iter().fold(T::zero(), |acc, &xi| acc + xi * xi)
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let two: T = convert(2.0);
        Ok(x.map(|xi| two * xi))
    }
}

/// Chain of products of neighboring variables, `f(x) = sum x_i x_{i+1}`.
///
/// A saddle with no minimum; neither separable nor convex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coupled;

impl Formula for Coupled {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        x.as_slice()
            .windows(2)
            .fold(T::zero(), |acc, w| acc + w[0] * w[1])
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let n = x.len();
        Ok(DVector::from_iterator(
            n,
            (0..n).map(|i| {
                let left = if i > 0 { x[i - 1] } else { T::zero() };
                let right = if i + 1 < n { x[i + 1] } else { T::zero() };
                left + right
            }),
        ))
    }
}

/// Tilted double well in one variable, `f(x) = (x^2 - 1)^2 + x / 4`.
///
/// The global minimum is in the left well, the right well holds a higher
/// local minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleWell;

impl Formula for DoubleWell {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let a = x[0] * x[0] - T::one();
        a * a + x[0] / convert(4.0)
    }

    fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        let a = x[0] * x[0] - T::one();
        Ok(DVector::from_element(
            1,
            convert::<T>(4.0) * x[0] * a + convert(0.25),
        ))
    }
}

/// Quartic with uniform noise in `[0, 1)` added to every evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoisyQuartic;

impl Formula for NoisyQuartic {
    fn eval<T: Real>(&self, x: &DVector<T>) -> T {
        let noise: T = convert(rand::thread_rng().gen::<f64>());
        x.iter()
            .enumerate()
            .fold(T::zero(), |acc, (i, &xi)| {
                acc + convert::<T>((i + 1) as f64) * xi.powi(4)
            })
            + noise
    }

    fn gradient<T: Real>(&self, _x: &DVector<T>) -> Result<DVector<T>, GradientError> {
        Err(GradientError::NonDifferentiable {
            reason: "noisy function",
        })
    }
}

/// Kernel of [`Paraboloid`].
pub fn paraboloid_kernel() -> Arc<dyn Kernel> {
    Arc::new(Paraboloid)
}

/// Scalable record of [`Paraboloid`] with working dimension 2.
pub fn paraboloid_record(name: &str) -> EntryRecord {
    EntryRecord::new(name, DimensionKind::Scalable { default_n: Some(2) })
        .with_description("Sum of squares")
        .with_formula("f(x) = sum x_i^2")
        .with_properties([
            "convex",
            "scalable",
            "separable",
            "unimodal",
            "differentiable",
        ])
        .with_start(Layout::Repeat(vec![1.0]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0)
}

/// Definition of [`Paraboloid`] with [`paraboloid_record`].
pub fn paraboloid_def(name: &str) -> EntryDef {
    EntryDef::new(Paraboloid, paraboloid_record(name))
}

/// Record of [`Paraboloid`] fixed to dimension `n`.
pub fn fixed_paraboloid_record(name: &str, n: usize) -> EntryRecord {
    paraboloid_record(name)
        .with_dimension(DimensionKind::Fixed { n })
        .with_properties(["convex", "separable", "unimodal", "differentiable"])
}

/// Scalable record without a default dimension whose minimizer is only known
/// in dimension 4.
pub fn legacy_record(name: &str) -> EntryRecord {
    EntryRecord::new(name, DimensionKind::Scalable { default_n: None })
        .with_properties(["scalable"])
        .with_start(Layout::Repeat(vec![1.0]))
        .with_minimum(vec![Layout::Explicit(vec![0.0; 4])], 0.0)
}

/// Definition of [`Paraboloid`] with [`legacy_record`].
pub fn legacy_def(name: &str) -> EntryDef {
    EntryDef::new(Paraboloid, legacy_record(name))
}

/// Record of [`Coupled`] in dimension 2 without property tags.
pub fn coupled_record(name: &str) -> EntryRecord {
    EntryRecord::new(name, DimensionKind::Fixed { n: 2 })
        .with_start(Layout::Repeat(vec![1.0]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0)
}

/// Builds an entry of [`Coupled`] from the record.
pub fn build_coupled(record: EntryRecord) -> FunctionEntry {
    EntryDef::new(Coupled, record)
        .build()
        .expect("valid test record")
}

/// Entry of [`DoubleWell`] with no tags, starting between the wells.
pub fn double_well(record: impl FnOnce(EntryRecord) -> EntryRecord) -> FunctionEntry {
    let base = EntryRecord::new("double_well", DimensionKind::Fixed { n: 1 })
        .with_start(Layout::Explicit(vec![0.0]))
        .with_minimum(
            vec![Layout::Explicit(vec![-1.0298959850506604])],
            -0.2537912372204689,
        );
    EntryDef::new(DoubleWell, record(base))
        .build()
        .expect("valid test record")
}

/// Definition of [`NoisyQuartic`].
pub fn noisy_def(name: &str) -> EntryDef {
    let record = EntryRecord::new(name, DimensionKind::Scalable { default_n: Some(2) })
        .with_properties(["has_noise", "scalable", "continuous"])
        .with_start(Layout::Repeat(vec![1.0]))
        .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);
    EntryDef::new(NoisyQuartic, record)
}

/// Builds an entry of [`Paraboloid`] from the record.
pub fn build(record: EntryRecord) -> FunctionEntry {
    FunctionEntry::new(paraboloid_kernel(), record).expect("valid test record")
}

/// In-memory writer whose content stays accessible after it is handed over
/// as a boxed writer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Content written so far, decoded as UTF-8.
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned buffer"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
