use std::fmt;
use std::ops::Index;

use anyhow::{self, ensure, format_err};
use derive_builder::Builder;
use itertools::Itertools;
use nalgebra::Point3;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::angmom::angmom_label;

#[cfg(test)]
#[path = "ao_integrals_tests.rs"]
mod ao_integrals_tests;

// -------------------
// GaussianContraction
// -------------------

/// A structure to handle the primitives of a (possibly general) Gaussian contraction.
///
/// Every contracted function $`\chi_c`$ of the shell shares the same primitive exponents:
///
/// ```math
/// \chi_c(\mathbf{r}) = \sum_p d_{pc} \exp\left[-\alpha_p \lvert \mathbf{r} - \mathbf{R} \rvert^2\right].
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianContraction {
    /// The primitive exponents $`\alpha_p`$.
    exponents: Vec<f64>,

    /// The contraction coefficients $`d_{pc}`$ with primitives along rows and contracted
    /// functions along columns.
    coefficients: Array2<f64>,
}

impl GaussianContraction {
    /// Constructs a general contraction from its exponents and coefficient matrix.
    ///
    /// # Errors
    ///
    /// Errors if the number of coefficient rows does not match the number of exponents, if there
    /// are no contracted functions, or if any exponent is not strictly positive and finite.
    pub fn new(exponents: Vec<f64>, coefficients: Array2<f64>) -> Result<Self, anyhow::Error> {
        ensure!(!exponents.is_empty(), "A contraction needs at least one primitive.");
        ensure!(
            coefficients.nrows() == exponents.len(),
            "Mismatched numbers of primitives: {} exponents but {} coefficient rows.",
            exponents.len(),
            coefficients.nrows()
        );
        ensure!(
            coefficients.ncols() > 0,
            "A contraction needs at least one contracted function."
        );
        ensure!(
            exponents.iter().all(|a| a.is_finite() && *a > 0.0),
            "Primitive exponents must be positive and finite."
        );
        ensure!(
            coefficients.iter().all(|c| c.is_finite()),
            "Contraction coefficients must be finite."
        );
        Ok(Self {
            exponents,
            coefficients,
        })
    }

    /// Constructs a segmented contraction with one contracted function from
    /// `(exponent, coefficient)` tuples.
    pub fn from_primitives(primitives: &[(f64, f64)]) -> Result<Self, anyhow::Error> {
        let (exponents, coeffs): (Vec<f64>, Vec<f64>) = primitives.iter().copied().unzip();
        let n = coeffs.len();
        let coefficients = Array2::from_shape_vec((n, 1), coeffs)
            .map_err(|err| format_err!("Unable to shape contraction coefficients: {err}"))?;
        Self::new(exponents, coefficients)
    }

    /// The number of primitive Gaussians in this contraction.
    pub fn contraction_length(&self) -> usize {
        self.exponents.len()
    }

    /// The number of contracted functions sharing these primitives.
    pub fn n_contractions(&self) -> usize {
        self.coefficients.ncols()
    }

    /// The primitive exponents.
    pub fn exponents(&self) -> &[f64] {
        &self.exponents
    }

    /// The coefficients of primitive `p` across all contracted functions.
    pub fn primitive_coefficients(&self, p: usize) -> ArrayView1<'_, f64> {
        self.coefficients.index_axis(Axis(0), p)
    }

    /// The natural logarithm of the largest coefficient magnitude of primitive `p` over all
    /// contracted functions. This is $`-\infty`$ for a primitive that never contributes.
    pub fn log_max_coefficient(&self, p: usize) -> f64 {
        self.primitive_coefficients(p)
            .iter()
            .fold(0.0f64, |acc, c| acc.max(c.abs()))
            .ln()
    }
}

// ---------------------
// BasisShellContraction
// ---------------------

/// A structure to handle all shell information for grid integrals.
#[derive(Clone, Builder, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct BasisShellContraction {
    /// The total angular momentum of the shell.
    pub l: u32,

    /// The Gaussian primitives in the contraction of this shell.
    pub contraction: GaussianContraction,

    /// The Cartesian origin $`\mathbf{R}`$ of this shell.
    pub cart_origin: Point3<f64>,
}

impl BasisShellContractionBuilder {
    fn validate(&self) -> Result<(), String> {
        let origin = self
            .cart_origin
            .as_ref()
            .ok_or_else(|| "`cart_origin` has not been set.".to_string())?;
        if origin.iter().all(|x| x.is_finite()) {
            Ok(())
        } else {
            Err("The shell origin must be finite.".to_string())
        }
    }
}

impl BasisShellContraction {
    /// Returns a builder to construct a new [`BasisShellContraction`].
    pub fn builder() -> BasisShellContractionBuilder {
        BasisShellContractionBuilder::default()
    }

    /// Convenience constructor for a segmented shell with one contracted function.
    pub fn segmented(
        l: u32,
        primitives: &[(f64, f64)],
        cart_origin: Point3<f64>,
    ) -> Result<Self, anyhow::Error> {
        Self::builder()
            .l(l)
            .contraction(GaussianContraction::from_primitives(primitives)?)
            .cart_origin(cart_origin)
            .build()
            .map_err(|err| format_err!(err))
    }

    /// The number of primitive Gaussians in this shell.
    pub fn contraction_length(&self) -> usize {
        self.contraction.contraction_length()
    }

    /// The number of contracted functions in this shell.
    pub fn n_contractions(&self) -> usize {
        self.contraction.n_contractions()
    }

    /// The Cartesian origin $`\mathbf{R}`$ of this shell.
    pub fn cart_origin(&self) -> &Point3<f64> {
        &self.cart_origin
    }
}

impl fmt::Display for BasisShellContraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shell at ({}) with {} primitive(s) and {} contraction(s)",
            angmom_label(self.l),
            self.cart_origin
                .iter()
                .map(|x| format!("{x:+.4}"))
                .join(", "),
            self.contraction_length(),
            self.n_contractions()
        )
    }
}

// --------
// BasisSet
// --------

/// A structure to manage the basis shells of a system in a fixed order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BasisSet {
    /// The shells, in the order that defines shell indices.
    shells: Vec<BasisShellContraction>,
}

impl BasisSet {
    /// Creates a new [`BasisSet`] from an ordered list of shells.
    pub fn new(shells: Vec<BasisShellContraction>) -> Self {
        Self { shells }
    }

    /// Creates a new [`BasisSet`] from per-atom lists of shells, keeping atoms in order.
    pub fn from_atoms(batms: Vec<Vec<BasisShellContraction>>) -> Self {
        Self::new(batms.into_iter().flatten().collect())
    }

    /// The number of shells in the basis set.
    pub fn n_shells(&self) -> usize {
        self.shells.len()
    }

    /// Returns an iterator over all shells in the basis set.
    pub fn all_shells(&self) -> impl Iterator<Item = &BasisShellContraction> {
        self.shells.iter()
    }

    /// Returns the highest angular momentum of all shells.
    pub fn max_l(&self) -> u32 {
        self.shells.iter().map(|shell| shell.l).max().unwrap_or(0)
    }

    /// Computes the orbital-offset table: entry `i` is the index of the first function of shell
    /// `i`, and the final entry is the total number of functions.
    ///
    /// # Arguments
    ///
    /// * `n_funcs` - The number of functions a shell contributes.
    pub fn ao_loc<F>(&self, n_funcs: F) -> Vec<usize>
    where
        F: Fn(&BasisShellContraction) -> usize,
    {
        std::iter::once(0)
            .chain(self.shells.iter().scan(0, |acc, shell| {
                *acc += n_funcs(shell);
                Some(*acc)
            }))
            .collect()
    }
}

impl Index<usize> for BasisSet {
    type Output = BasisShellContraction;

    fn index(&self, i: usize) -> &Self::Output {
        &self.shells[i]
    }
}

impl fmt::Display for BasisSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Basis set with {} shell(s):", self.n_shells())?;
        for (i, shell) in self.shells.iter().enumerate() {
            writeln!(f, "  #{i:<4} {shell}")?;
        }
        Ok(())
    }
}
