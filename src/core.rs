//! Core abstractions and types of the catalog.
//!
//! *Catalog authors* are mainly interested in implementing the [`Formula`]
//! trait and describing it with an [`EntryRecord`](crate::record::EntryRecord).
//!
//! *Tool developers* work with [`FunctionEntry`] and the numeric
//! representations [`Real`], [`Dual`] and [`DoubleDouble`].

mod domain;
mod double_double;
mod dual;
mod entry;
mod kernel;
mod property;
mod real;

pub use domain::*;
pub use double_double::*;
pub use dual::*;
pub use entry::*;
pub use kernel::*;
pub use property::*;
pub use real::*;
