//! Evaluation of one shell-pair block, and the scratch it needs.

use ndarray::{s, ArrayViewMut2, ShapeBuilder};

use crate::basis::BasisShellContraction;
use crate::integrals::orth3d::GridField;
use crate::integrals::prim_loop::{numint1e_loop, ShellPair};
use crate::integrals::scratch::ScratchArena;
use crate::integrals::transform::AngularTransform;
use crate::integrals::GridIntegralError;

#[cfg(test)]
#[path = "driver_tests.rs"]
mod driver_tests;

/// A structure evaluating the grid integral of one shell pair into its output block.
///
/// The integrator works in two modes. [`Self::cache_size`] answers how many scratch elements an
/// evaluation needs without touching the field, and [`Self::evaluate`] or
/// [`Self::evaluate_into`] performs the evaluation within an arena of at least that size.
#[derive(Clone, Copy, Debug)]
pub struct ShellPairIntegrator<'a, 'f> {
    pair: ShellPair<'a>,
    field: &'a GridField<'f>,
    fac: f64,
    log_prec: f64,
    transform: &'a dyn AngularTransform,
}

impl<'a, 'f> ShellPairIntegrator<'a, 'f> {
    pub fn new(
        shell_i: &'a BasisShellContraction,
        shell_j: &'a BasisShellContraction,
        field: &'a GridField<'f>,
        fac: f64,
        log_prec: f64,
        transform: &'a dyn AngularTransform,
    ) -> Self {
        Self {
            pair: ShellPair::new(shell_i, shell_j),
            field,
            fac,
            log_prec,
            transform,
        }
    }

    /// The shape of the output block: output functions of the first shell by those of the second.
    pub fn block_shape(&self) -> (usize, usize) {
        let (shell_i, shell_j) = (self.pair.shell_i, self.pair.shell_j);
        (
            self.transform.n_funcs(shell_i.l) * shell_i.n_contractions(),
            self.transform.n_funcs(shell_j.l) * shell_j.n_contractions(),
        )
    }

    /// The exact number of scratch elements an evaluation of this pair needs.
    pub fn cache_size(&self) -> usize {
        let (li, lj) = (self.pair.shell_i.l, self.pair.shell_j.l);
        self.pair.n_cart_block()
            + self
                .pair
                .loop_cache_size(&self.field.grid().mesh)
                .max(self.transform.cache_size(li, lj))
    }

    /// Evaluates the block into the leading corner of the column-major buffer `out` of shape
    /// `dims`.
    ///
    /// # Arguments
    ///
    /// * `dims` - The shape of `out` as a matrix. If `None`, this is [`Self::block_shape`]. A
    /// larger shape embeds the block at its top-left corner with the corresponding stride.
    ///
    /// # Returns
    ///
    /// Whether any primitive pair contributed. A block with no contribution is written as zeros.
    pub fn evaluate(
        &self,
        out: &mut [f64],
        dims: Option<[usize; 2]>,
        arena: &mut ScratchArena,
    ) -> Result<bool, GridIntegralError> {
        let (nrows, ncols) = self.block_shape();
        let [d0, d1] = dims.unwrap_or([nrows, ncols]);
        if d0 < nrows || d1 < ncols {
            return Err(GridIntegralError::InvalidInput(format!(
                "Output dimensions {d0} x {d1} cannot hold a {nrows} x {ncols} block."
            )));
        }
        let len = out.len();
        let out = out.get_mut(..d0 * d1).ok_or_else(|| {
            GridIntegralError::InvalidInput(format!(
                "A {d0} x {d1} output needs {} element(s) but only {len} were provided.",
                d0 * d1
            ))
        })?;
        let view = ArrayViewMut2::from_shape((d0, d1).f(), out)
            .map_err(|err| GridIntegralError::InvalidInput(err.to_string()))?;
        self.evaluate_into(view.slice_move(s![..nrows, ..ncols]), arena)
    }

    /// Evaluates the block into `out`, whose shape must be [`Self::block_shape`].
    ///
    /// # Returns
    ///
    /// Whether any primitive pair contributed. A block with no contribution is written as zeros.
    pub fn evaluate_into(
        &self,
        mut out: ArrayViewMut2<'_, f64>,
        arena: &mut ScratchArena,
    ) -> Result<bool, GridIntegralError> {
        let shape = self.block_shape();
        if out.dim() != shape {
            return Err(GridIntegralError::InvalidInput(format!(
                "Output block has shape {:?} but the shell pair needs {shape:?}.",
                out.dim()
            )));
        }
        let mut carver = arena.carver();
        let gctr = carver.carve(self.pair.n_cart_block())?;
        let has_value = numint1e_loop(
            gctr,
            &self.pair,
            self.fac,
            self.log_prec,
            self.field,
            &mut carver.sub(),
        )?;
        if has_value {
            let (shell_i, shell_j) = (self.pair.shell_i, self.pair.shell_j);
            self.transform.apply(
                out,
                gctr,
                shell_i.l,
                shell_j.l,
                shell_i.n_contractions(),
                shell_j.n_contractions(),
                &mut carver.sub(),
            )?;
        } else {
            out.fill(0.0);
        }
        Ok(has_value)
    }
}
