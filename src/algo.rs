//! The collection of implemented algorithms.

pub mod bfgs;

pub use bfgs::Bfgs;
