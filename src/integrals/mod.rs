//! Gaussian integrals evaluated by quadrature over uniform real-space grids.
//!
//! The evaluation of a two-centre integral proceeds bottom-up:
//!
//! 1. [`rcut`] estimates how far the product of two primitives extends;
//! 2. [`axis`] tabulates the product along each lattice axis, folding periodic images;
//! 3. [`orth3d`] contracts the three axis tables against the grid field;
//! 4. [`prim_loop`] screens and contracts over primitive pairs;
//! 5. [`driver`] sizes the scratch requirement and hands the contracted Cartesian block to an
//!    angular [`transform`];
//! 6. [`fill2c`] tiles all shell pairs of a basis in parallel.

use std::error::Error;
use std::fmt;

pub mod axis;
pub mod driver;
pub mod fill2c;
pub mod hrr;
pub mod orth3d;
pub mod prim_loop;
pub mod rcut;
pub mod scratch;
pub mod transform;

pub use driver::ShellPairIntegrator;
pub use fill2c::{fill2c, Fill2cParams, FillMode};
pub use orth3d::GridField;
pub use scratch::ScratchArena;
pub use transform::{AngularTransform, AngularTransformKind};

// =================
// Error definitions
// =================

/// Errors arising during grid-integral evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GridIntegralError {
    /// The grid lattice is not orthogonal, and no evaluation strategy exists for it.
    UnsupportedLattice(String),

    /// A scratch arena is too small for the requested evaluation.
    ScratchExhausted {
        /// The number of elements that would have been in use after the failed request.
        requested: usize,

        /// The capacity of the arena.
        available: usize,
    },

    /// The inputs are inconsistent with one another.
    InvalidInput(String),
}

impl fmt::Display for GridIntegralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedLattice(msg) => write!(f, "Unsupported lattice: {msg}"),
            Self::ScratchExhausted {
                requested,
                available,
            } => write!(
                f,
                "Scratch arena exhausted: {requested} element(s) required but only {available} available."
            ),
            Self::InvalidInput(msg) => write!(f, "Invalid grid-integral input: {msg}"),
        }
    }
}

impl Error for GridIntegralError {}
