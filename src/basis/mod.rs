//! Contracted Gaussian basis functions.

pub mod ao_integrals;

pub use ao_integrals::{BasisSet, BasisShellContraction, GaussianContraction};
