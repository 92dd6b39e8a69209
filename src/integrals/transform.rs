//! Angular transforms applied to contracted Cartesian shell-pair blocks.

use std::fmt;

use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2, Axis, ShapeBuilder};
use serde::{Deserialize, Serialize};

use crate::angmom::n_cart;
use crate::angmom::sh_conversion::sh_cart2r_mat;
use crate::integrals::scratch::ScratchCarver;
use crate::integrals::GridIntegralError;

#[cfg(test)]
#[path = "transform_tests.rs"]
mod transform_tests;

// ================
// Trait definition
// ================

/// Trait for transforms mapping a contracted Cartesian shell-pair block onto the output basis.
///
/// The Cartesian block `gctr` holds $`n_{\mathrm{ctr},i} n_{\mathrm{ctr},j}`$ sub-blocks, sub-block
/// $`(c_i, c_j)`$ starting at offset $`(c_j n_{\mathrm{ctr},i} + c_i) n_{f_i} n_{f_j}`$ and stored
/// column-major with the component of the first shell running fastest.
pub trait AngularTransform: fmt::Debug + Send + Sync {
    /// The number of output functions per contracted function of angular momentum `l`.
    fn n_funcs(&self, l: u32) -> usize;

    /// The number of scratch elements [`Self::apply`] carves for a shell pair.
    fn cache_size(&self, li: u32, lj: u32) -> usize;

    /// Writes the transformed block into `out`, whose shape must be
    /// $`(n_i n_{\mathrm{ctr},i}) \times (n_j n_{\mathrm{ctr},j})`$ with $`n`$ given by
    /// [`Self::n_funcs`].
    ///
    /// # Errors
    ///
    /// Errors if the scratch is too small or the shapes are inconsistent.
    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self,
        out: ArrayViewMut2<'_, f64>,
        gctr: &[f64],
        li: u32,
        lj: u32,
        ictr: usize,
        jctr: usize,
        carver: &mut ScratchCarver<'_>,
    ) -> Result<(), GridIntegralError>;
}

// ==================
// Struct definitions
// ==================

/// An enumerated type for the available output bases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AngularTransformKind {
    /// Cartesian functions, in lexicographic order.
    #[default]
    Cartesian,

    /// Real solid harmonics, in increasing-$`m`$ order.
    Spherical,

    /// Real solid harmonics as in libcint: increasing-$`m`$ order except for p shells, which
    /// are ordered $`(x, y, z)`$.
    SphericalLibcint,
}

impl AngularTransformKind {
    /// Constructs the transform for shells of angular momentum up to `lmax`.
    pub fn build(&self, lmax: u32) -> Box<dyn AngularTransform> {
        match self {
            Self::Cartesian => Box::new(CartesianPassthrough),
            Self::Spherical => Box::new(CartesianToSpherical::new(lmax)),
            Self::SphericalLibcint => Box::new(CartesianToSpherical::with_xyz_p_order(lmax)),
        }
    }
}

impl fmt::Display for AngularTransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cartesian => write!(f, "Cartesian"),
            Self::Spherical => write!(f, "Spherical"),
            Self::SphericalLibcint => write!(f, "Spherical (p as x, y, z)"),
        }
    }
}

/// Leaves Cartesian blocks as they are, only rearranging them into the output layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct CartesianPassthrough;

impl AngularTransform for CartesianPassthrough {
    fn n_funcs(&self, l: u32) -> usize {
        n_cart(l)
    }

    fn cache_size(&self, _li: u32, _lj: u32) -> usize {
        0
    }

    fn apply(
        &self,
        mut out: ArrayViewMut2<'_, f64>,
        gctr: &[f64],
        li: u32,
        lj: u32,
        ictr: usize,
        jctr: usize,
        _carver: &mut ScratchCarver<'_>,
    ) -> Result<(), GridIntegralError> {
        let (nfi, nfj) = (n_cart(li), n_cart(lj));
        for jc in 0..jctr {
            for ic in 0..ictr {
                let block = cart_block(gctr, ic, jc, ictr, nfi, nfj)?;
                out.slice_mut(s![ic * nfi..(ic + 1) * nfi, jc * nfj..(jc + 1) * nfj])
                    .assign(&block);
            }
        }
        Ok(())
    }
}

/// Converts Cartesian blocks to real solid harmonics on both sides,
/// $`\mathbf{T}^{(l_i)} \mathbf{G} \mathbf{T}^{(l_j)\dagger}`$.
#[derive(Clone, Debug)]
pub struct CartesianToSpherical {
    /// The Cartesian-to-spherical matrices for $`l = 0, 1, \ldots`$.
    tmats: Vec<Array2<f64>>,
}

impl CartesianToSpherical {
    /// Precomputes the conversion matrices up to and including `lmax`.
    pub fn new(lmax: u32) -> Self {
        Self {
            tmats: (0..=lmax).map(sh_cart2r_mat).collect(),
        }
    }

    /// As [`Self::new`], but with the p functions ordered $`(x, y, z)`$ rather than
    /// $`(y, z, x)`$.
    pub fn with_xyz_p_order(lmax: u32) -> Self {
        let mut transform = Self::new(lmax);
        if let Some(tmat) = transform.tmats.get_mut(1) {
            *tmat = tmat.select(Axis(0), &[2, 0, 1]);
        }
        transform
    }

    fn tmat(&self, l: u32) -> Result<&Array2<f64>, GridIntegralError> {
        self.tmats.get(l as usize).ok_or_else(|| {
            GridIntegralError::InvalidInput(format!(
                "No Cartesian-to-spherical matrix prepared for l = {l}."
            ))
        })
    }
}

impl AngularTransform for CartesianToSpherical {
    fn n_funcs(&self, l: u32) -> usize {
        2 * l as usize + 1
    }

    fn cache_size(&self, li: u32, lj: u32) -> usize {
        n_cart(li) * self.n_funcs(lj)
    }

    fn apply(
        &self,
        mut out: ArrayViewMut2<'_, f64>,
        gctr: &[f64],
        li: u32,
        lj: u32,
        ictr: usize,
        jctr: usize,
        carver: &mut ScratchCarver<'_>,
    ) -> Result<(), GridIntegralError> {
        let (nfi, nfj) = (n_cart(li), n_cart(lj));
        let (nsi, nsj) = (self.n_funcs(li), self.n_funcs(lj));
        let ti = self.tmat(li)?;
        let tj = self.tmat(lj)?;
        let mut tmp = ArrayViewMut2::from_shape((nfi, nsj), carver.carve(nfi * nsj)?)
            .map_err(|err| GridIntegralError::InvalidInput(err.to_string()))?;
        for jc in 0..jctr {
            for ic in 0..ictr {
                let block = cart_block(gctr, ic, jc, ictr, nfi, nfj)?;
                general_mat_mul(1.0, &block, &tj.t(), 0.0, &mut tmp);
                general_mat_mul(
                    1.0,
                    ti,
                    &tmp,
                    0.0,
                    &mut out.slice_mut(s![ic * nsi..(ic + 1) * nsi, jc * nsj..(jc + 1) * nsj]),
                );
            }
        }
        Ok(())
    }
}

/// Views Cartesian sub-block `(ic, jc)` of `gctr` as an $`n_{f_i} \times n_{f_j}`$ matrix.
fn cart_block(
    gctr: &[f64],
    ic: usize,
    jc: usize,
    ictr: usize,
    nfi: usize,
    nfj: usize,
) -> Result<ArrayView2<'_, f64>, GridIntegralError> {
    let nf = nfi * nfj;
    let offset = (jc * ictr + ic) * nf;
    let data = gctr.get(offset..offset + nf).ok_or_else(|| {
        GridIntegralError::InvalidInput(format!(
            "Cartesian block ({ic}, {jc}) lies outside a buffer of {} element(s).",
            gctr.len()
        ))
    })?;
    ArrayView2::from_shape((nfi, nfj).f(), data)
        .map_err(|err| GridIntegralError::InvalidInput(err.to_string()))
}
