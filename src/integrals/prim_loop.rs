//! Screening and contraction over the primitive pairs of a shell pair.

use ndarray::ArrayView1;

use crate::angmom::{n_cart, n_cart_triangle};
use crate::basis::BasisShellContraction;
use crate::integrals::hrr::hrr_2d;
use crate::integrals::orth3d::{numint_3d, GridField, PrimitivePair};
use crate::integrals::scratch::ScratchCarver;
use crate::integrals::GridIntegralError;

#[cfg(test)]
#[path = "prim_loop_tests.rs"]
mod prim_loop_tests;

/// Primitive pairs whose Gaussian-product exponent exceeds the log-coefficient bound by more
/// than this are skipped.
pub const EXPCUTOFF: f64 = 40.0;

// ==================
// Struct definitions
// ==================

/// States of a [`ContractionAccumulator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Nothing has been accumulated yet; the buffer contents are meaningless.
    Empty,

    /// At least one contribution has been accumulated.
    Accumulating,

    /// Accumulation has finished and the buffer holds the final values.
    Finalised,
}

/// Accumulates primitive contributions into the contracted functions of one shell.
///
/// The buffer holds one block of `block_len` values per contracted function. The first
/// contribution overwrites, later contributions add.
#[derive(Debug)]
pub struct ContractionAccumulator<'a> {
    buffer: &'a mut [f64],
    block_len: usize,
    state: AccumulatorState,
}

impl<'a> ContractionAccumulator<'a> {
    /// Wraps `buffer`, whose length must be a multiple of `block_len`.
    pub fn new(buffer: &'a mut [f64], block_len: usize) -> Self {
        debug_assert!(block_len > 0 && buffer.len() % block_len == 0);
        Self {
            buffer,
            block_len,
            state: AccumulatorState::Empty,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Whether any contribution has been accumulated.
    pub fn has_value(&self) -> bool {
        self.state != AccumulatorState::Empty
    }

    /// Empties the accumulator for reuse.
    pub fn reset(&mut self) {
        self.state = AccumulatorState::Empty;
    }

    /// Adds `src` weighted by `coeffs[n]` to block `n` for every contracted function $`n`$.
    ///
    /// # Errors
    ///
    /// Errors if the accumulator has been finalised or if the shapes disagree.
    pub fn accumulate(
        &mut self,
        src: &[f64],
        coeffs: ArrayView1<'_, f64>,
    ) -> Result<(), GridIntegralError> {
        if self.state == AccumulatorState::Finalised {
            return Err(GridIntegralError::InvalidInput(
                "Cannot accumulate into a finalised contraction.".to_string(),
            ));
        }
        if src.len() != self.block_len || coeffs.len() * self.block_len != self.buffer.len() {
            return Err(GridIntegralError::InvalidInput(format!(
                "Contraction shape mismatch: {} value(s) by {} coefficient(s) into {} element(s).",
                src.len(),
                coeffs.len(),
                self.buffer.len()
            )));
        }
        let empty = self.state == AccumulatorState::Empty;
        for (block, &c) in self.buffer.chunks_exact_mut(self.block_len).zip(coeffs.iter()) {
            if empty {
                block.iter_mut().zip(src).for_each(|(b, s)| *b = s * c);
            } else if c != 0.0 {
                block.iter_mut().zip(src).for_each(|(b, s)| *b += s * c);
            }
        }
        self.state = AccumulatorState::Accumulating;
        Ok(())
    }

    /// Marks accumulation as finished and returns the accumulated values, or `None` if nothing
    /// was accumulated.
    pub fn finalise(&mut self) -> Option<&[f64]> {
        match self.state {
            AccumulatorState::Empty => None,
            _ => {
                self.state = AccumulatorState::Finalised;
                Some(self.buffer)
            }
        }
    }

    /// The current buffer contents, meaningful only once something has been accumulated.
    pub fn values(&self) -> &[f64] {
        self.buffer
    }
}

/// A pair of contracted shells together with the quantities shared by all its primitive pairs.
#[derive(Clone, Copy, Debug)]
pub struct ShellPair<'a> {
    pub shell_i: &'a BasisShellContraction,
    pub shell_j: &'a BasisShellContraction,
}

impl<'a> ShellPair<'a> {
    pub fn new(shell_i: &'a BasisShellContraction, shell_j: &'a BasisShellContraction) -> Self {
        Self { shell_i, shell_j }
    }

    /// The length of the moment triangle with total degree in $`l_i..=l_i + l_j`$.
    pub fn len_g1d(&self) -> usize {
        n_cart_triangle(self.shell_i.l, self.shell_i.l + self.shell_j.l)
    }

    /// The number of Cartesian entries $`n_{f_i} n_{f_j} n_{\mathrm{ctr},i} n_{\mathrm{ctr},j}`$ of
    /// the contracted block.
    pub fn n_cart_block(&self) -> usize {
        n_cart(self.shell_i.l)
            * n_cart(self.shell_j.l)
            * self.shell_i.n_contractions()
            * self.shell_j.n_contractions()
    }

    /// The scratch requirement of [`numint1e_loop`] for this pair on a grid of `mesh` points.
    pub fn loop_cache_size(&self, mesh: &[usize; 3]) -> usize {
        let len_g1d = self.len_g1d();
        let ictr = self.shell_i.n_contractions();
        let jctr = self.shell_j.n_contractions();
        let l1 = (self.shell_i.l + self.shell_j.l) as usize + 1;
        let [mx, my, mz] = *mesh;
        len_g1d * (1 + ictr + ictr * jctr)
            + self.shell_i.contraction_length()
            + self.shell_j.contraction_length()
            + l1 * (mx + my + mz)
            + l1 * my * mz
            + l1 * l1 * mz
    }
}

// =========
// Functions
// =========

/// Computes the contracted Cartesian block of a shell pair on a grid field.
///
/// For every primitive pair $`(p_i, p_j)`$ not screened out by
/// $`e_{ij} - \ln \max\lvert c_i \rvert - \ln \max\lvert c_j \rvert > 40`$, the moment triangle is
/// evaluated with prefactor $`f e^{-e_{ij}}`$ and contracted first over $`p_i`$, then over
/// $`p_j`$. The horizontal transfer then yields one $`n_{f_i} \times n_{f_j}`$ block per pair of
/// contracted functions.
///
/// The support radii of a retained pair are computed for the precision target
/// $`\ln\epsilon - \ln \max\lvert c_i \rvert - \ln \max\lvert c_j \rvert`$, so that the
/// truncation error of a contribution is bounded after it is scaled by its coefficients. With
/// coefficients below unity this gives smaller radii than the target
/// $`\ln\epsilon + \ln \max\lvert c_i \rvert + \ln \max\lvert c_j \rvert`$ used by libcint-style
/// grid codes.
///
/// # Arguments
///
/// * `gctr` - Receives the contracted Cartesian blocks; see
/// [`crate::integrals::AngularTransform`] for the layout. Left untouched if nothing is retained.
/// * `fac` - The overall prefactor.
/// * `log_prec` - The natural logarithm of the precision target.
///
/// # Returns
///
/// Whether any primitive pair was retained.
pub fn numint1e_loop(
    gctr: &mut [f64],
    pair: &ShellPair<'_>,
    fac: f64,
    log_prec: f64,
    field: &GridField<'_>,
    carver: &mut ScratchCarver<'_>,
) -> Result<bool, GridIntegralError> {
    let (shell_i, shell_j) = (pair.shell_i, pair.shell_j);
    let (li, lj) = (shell_i.l, shell_j.l);
    let ictr = shell_i.n_contractions();
    let jctr = shell_j.n_contractions();
    let iprim = shell_i.contraction_length();
    let jprim = shell_j.contraction_length();
    let len_g1d = pair.len_g1d();
    let nf = n_cart(li) * n_cart(lj);
    if gctr.len() != nf * ictr * jctr {
        return Err(GridIntegralError::InvalidInput(format!(
            "The contracted block needs {} element(s) but {} were provided.",
            nf * ictr * jctr,
            gctr.len()
        )));
    }

    let mut sub = carver.sub();
    let mut accj = ContractionAccumulator::new(sub.carve(len_g1d * ictr * jctr)?, len_g1d * ictr);
    let mut acci = ContractionAccumulator::new(sub.carve(len_g1d * ictr)?, len_g1d);
    let g = sub.carve(len_g1d)?;
    let log_imax = sub.carve(iprim)?;
    let log_jmax = sub.carve(jprim)?;
    log_imax
        .iter_mut()
        .enumerate()
        .for_each(|(ip, v)| *v = shell_i.contraction.log_max_coefficient(ip));
    log_jmax
        .iter_mut()
        .enumerate()
        .for_each(|(jp, v)| *v = shell_j.contraction.log_max_coefficient(jp));

    let ai = shell_i.contraction.exponents();
    let aj = shell_j.contraction.exponents();
    for jp in 0..jprim {
        acci.reset();
        for ip in 0..iprim {
            let prim_pair = PrimitivePair {
                ai: ai[ip],
                aj: aj[jp],
                ri: shell_i.cart_origin,
                rj: shell_j.cart_origin,
            };
            let eij = prim_pair.eij();
            let logcc = log_imax[ip] + log_jmax[jp];
            if eij - logcc > EXPCUTOFF {
                continue;
            }
            let fac1i = fac * (-eij).exp();
            numint_3d(
                g,
                li,
                li + lj,
                &prim_pair,
                fac1i,
                log_prec - logcc,
                field,
                &mut sub.sub(),
            )?;
            acci.accumulate(g, shell_i.contraction.primitive_coefficients(ip))?;
        }
        if acci.has_value() {
            accj.accumulate(acci.values(), shell_j.contraction.primitive_coefficients(jp))?;
        }
    }

    let Some(gctrj) = accj.finalise() else {
        return Ok(false);
    };
    let rirj = shell_i.cart_origin - shell_j.cart_origin;
    let pw = sub.carve(3 * (lj as usize + 1))?;
    for (out, g) in gctr.chunks_exact_mut(nf).zip(gctrj.chunks_exact(len_g1d)) {
        hrr_2d(out, g, li, lj, &rirj, pw);
    }
    Ok(true)
}
