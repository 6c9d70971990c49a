//! Pure data types for pspace: values, parameter sets, operators, job records.
//!
//! This crate is a leaf dependency with no parser and no I/O. It exists so that
//! collaborators (job submission, reporting) can hold expanded parameter sets
//! and scheduler records without pulling in the configuration parser.

pub mod compare;
pub mod job;
pub mod pset;
pub mod value;

// Flat re-exports for convenience
pub use compare::*;
pub use job::*;
pub use pset::*;
pub use value::*;
