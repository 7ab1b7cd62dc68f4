#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Optbench
//!
//! A catalog of analytic benchmark functions for nonlinear optimization with
//! verified, high-precision global minima.
//!
//! Every function in the catalog is described by its formula, analytic
//! gradient, bounds, start point, claimed mathematical properties and the
//! global minimum as published in the literature. The library does not trust
//! the literature blindly. It provides tools to
//!
//! * [check](consistency) that the recorded minimum is actually attained and
//!   that the gradient vanishes there,
//! * [audit](audit) the claimed properties (separability, convexity, ...) by
//!   sampling,
//! * [refine](refine) the minimum in extended precision and persist the result
//!   in a human-editable [store](store).
//!
//! ## Functions
//!
//! A function is written once as a [`Formula`], generically over the [`Real`]
//! trait, so that the same expression can be evaluated in double precision,
//! on [dual numbers](Dual) for automatic differentiation and in
//! [double-double](DoubleDouble) arithmetic for refinement.
//!
//! ```rust
//! use optbench::nalgebra::{dvector, DVector};
//! use optbench::record::{EntryDef, EntryRecord};
//! use optbench::registry::Registry;
//! use optbench::{convert, DimensionKind, Formula, GradientError, Layout, Real};
//!
//! struct Bowl;
//!
//! impl Formula for Bowl {
//!     fn eval<T: Real>(&self, x: &DVector<T>) -> T {
//!         x.iter().fold(T::zero(), |acc, &xi| acc + xi * xi)
//!     }
//!
//!     fn gradient<T: Real>(&self, x: &DVector<T>) -> Result<DVector<T>, GradientError> {
//!         Ok(x.map(|xi| convert::<T>(2.0) * xi))
//!     }
//! }
//!
//! let record = EntryRecord::new("bowl", DimensionKind::Scalable { default_n: Some(2) })
//!     .with_properties(["convex", "scalable", "separable"])
//!     .with_start(Layout::Repeat(vec![1.0]))
//!     .with_minimum(vec![Layout::Repeat(vec![0.0])], 0.0);
//!
//! let (registry, errors) = Registry::load(vec![EntryDef::new(Bowl, record)]);
//! assert!(errors.is_empty());
//!
//! let bowl = registry.lookup("bowl").unwrap();
//! assert_eq!(bowl.evaluate(&dvector![3.0, 4.0]).unwrap(), 25.0);
//! ```
//!
//! The built-in functions are available in the [catalog] module.
//!
//! ## Verification
//!
//! ```rust
//! use optbench::catalog;
//! use optbench::consistency::ConsistencyChecker;
//! use optbench::registry::Registry;
//!
//! let (registry, _) = Registry::load(catalog::builtin());
//! let rosenbrock = registry.lookup("rosenbrock").unwrap();
//!
//! let report = ConsistencyChecker::new()
//!     .check_resolved(&rosenbrock, registry.resolver(), None)
//!     .unwrap();
//! assert!(report.is_consistent());
//! ```
//!
//! The same workflows are exposed on the command line by the `optbench`
//! binary.

pub mod algo;
pub mod audit;
pub mod batch;
pub mod catalog;
pub mod consistency;
mod core;
pub mod derivatives;
pub mod dimension;
pub mod listing;
pub mod record;
pub mod refine;
pub mod registry;
pub mod store;

pub use core::*;

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
