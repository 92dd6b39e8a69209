//! # gridint: Gaussian integrals on uniform grids
//!
//! `gridint` evaluates two-centre one-electron matrix elements
//!
//! ```math
//! M_{\mu\nu} = f \int \phi_\mu(\mathbf{r})\, w(\mathbf{r})\, \phi_\nu(\mathbf{r})\, \mathrm{d}\mathbf{r}
//! ```
//!
//! between contracted Gaussian basis functions $`\phi`$, where $`w`$ is a scalar field sampled
//! on a uniform real-space mesh that may be periodic along any number of its axes. With a unit
//! field, this yields the grid-quadrature overlap matrix.
//!
//! The quadrature is separable: for every primitive pair, one-dimensional tables of
//! monomial-weighted Gaussian values are built for each axis (folding periodic images) and
//! contracted against the field with two dense matrix products and one final reduction. Shell
//! pairs are processed in parallel, each worker carving its working memory from a private
//! [`ScratchArena`](integrals::scratch::ScratchArena).
//!
//! ## Layout
//!
//! - [`basis`]: contracted Gaussian shells and basis sets.
//! - [`grid`]: the uniform grid description.
//! - [`angmom`]: Cartesian component bookkeeping and real solid harmonic conversion.
//! - [`integrals`]: the quadrature engine, from support-radius estimation up to the parallel
//!   two-centre fill.
//! - [`drivers`]: run-level drivers with serialisable parameters.
//! - [`io`]: output formatting and logging helpers.
//!
//! ## Examples and usage
//!
//! Most items have their usage illustrated in test functions.

pub mod angmom;
pub mod basis;
pub mod drivers;
pub mod grid;
pub mod integrals;
pub mod io;
