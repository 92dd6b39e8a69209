//! Separable three-dimensional quadrature of primitive-pair products against a grid field.

use log;
use nalgebra::{Point3, Vector3};
use ndarray::linalg::general_mat_mul;
use ndarray::{s, ArrayView2, ArrayView3, ArrayViewMut2};

use crate::angmom::cart_triangle;
use crate::grid::UniformGrid;
use crate::integrals::axis::{tabulate_axis, AxisParams, AxisWindow};
use crate::integrals::rcut::gto_rcut;
use crate::integrals::scratch::ScratchCarver;
use crate::integrals::GridIntegralError;

#[cfg(test)]
#[path = "orth3d_tests.rs"]
mod orth3d_tests;

// ==================
// Struct definitions
// ==================

/// A field sampled on every point of a uniform grid.
#[derive(Clone, Debug)]
pub struct GridField<'a> {
    grid: &'a UniformGrid,

    /// The field values with the $`x`$ index along rows and the flattened $`(y, z)`$ index along
    /// columns.
    values: ArrayView2<'a, f64>,
}

impl<'a> GridField<'a> {
    /// Pairs `field` with the grid it is sampled on.
    ///
    /// # Errors
    ///
    /// Errors if the shape of `field` differs from the grid mesh or if `field` is not in standard
    /// (x-major) layout.
    pub fn new(grid: &'a UniformGrid, field: ArrayView3<'a, f64>) -> Result<Self, GridIntegralError> {
        let [nx, ny, nz] = grid.mesh;
        if field.dim() != (nx, ny, nz) {
            return Err(GridIntegralError::InvalidInput(format!(
                "Field shape {:?} does not match the grid mesh {:?}.",
                field.dim(),
                grid.mesh
            )));
        }
        if !field.is_standard_layout() {
            return Err(GridIntegralError::InvalidInput(
                "The field must be stored x-major, then y, then z.".to_string(),
            ));
        }
        let values = field
            .into_shape((nx, ny * nz))
            .map_err(|err| GridIntegralError::InvalidInput(err.to_string()))?;
        Ok(Self { grid, values })
    }

    /// The grid on which the field is sampled.
    pub fn grid(&self) -> &'a UniformGrid {
        self.grid
    }

    /// The field values as an $`n_x \times n_y n_z`$ matrix.
    pub fn values(&self) -> &ArrayView2<'a, f64> {
        &self.values
    }
}

/// A pair of primitive Gaussians centred at $`\mathbf{R}_i`$ and $`\mathbf{R}_j`$.
#[derive(Clone, Copy, Debug)]
pub struct PrimitivePair {
    pub ai: f64,
    pub aj: f64,
    pub ri: Point3<f64>,
    pub rj: Point3<f64>,
}

impl PrimitivePair {
    /// The combined exponent $`a_{ij} = a_i + a_j`$.
    pub fn aij(&self) -> f64 {
        self.ai + self.aj
    }

    /// The product centre $`(a_i \mathbf{R}_i + a_j \mathbf{R}_j) / a_{ij}`$.
    pub fn centre(&self) -> Point3<f64> {
        Point3::from((self.ri.coords * self.ai + self.rj.coords * self.aj) / self.aij())
    }

    /// The Gaussian-product exponent $`a_i a_j \lvert \mathbf{R}_i - \mathbf{R}_j \rvert^2 / a_{ij}`$.
    pub fn eij(&self) -> f64 {
        self.ai * self.aj / self.aij() * (self.ri - self.rj).norm_squared()
    }
}

// =========
// Functions
// =========

/// Integrates the product of a primitive pair against a grid field, dispatching on the lattice
/// geometry.
///
/// # Errors
///
/// Errors with [`GridIntegralError::UnsupportedLattice`] for non-orthogonal lattices.
#[allow(clippy::too_many_arguments)]
pub fn numint_3d(
    out: &mut [f64],
    floorl: u32,
    topl: u32,
    pair: &PrimitivePair,
    fac: f64,
    log_prec: f64,
    field: &GridField<'_>,
    carver: &mut ScratchCarver<'_>,
) -> Result<(), GridIntegralError> {
    if field.grid().is_orthogonal() {
        numint_3d_orth(out, floorl, topl, pair, fac, log_prec, field, carver)
    } else {
        numint_3d_nonorth(field.grid())
    }
}

/// Integrates $`f \, (x-x_i)^{l_x} (y-y_i)^{l_y} (z-z_i)^{l_z} \exp[-a_{ij}
/// \lvert \mathbf{r} - \mathbf{R}_{ij} \rvert^2] \, w(\mathbf{r})`$ over an orthogonal grid for every
/// Cartesian component with total degree in `floorl..=topl`.
///
/// The three axis tables are contracted with the field $`w`$ one axis at a time through dense
/// matrix products restricted to the active windows.
///
/// # Arguments
///
/// * `out` - The triangle of Cartesian results, ordered by total degree then lexicographically.
/// * `fac` - The overall prefactor $`f`$, also used to estimate the support radius.
/// * `log_prec` - The natural logarithm of the precision target.
/// * `carver` - Scratch for the axis tables and intermediate contractions.
#[allow(clippy::too_many_arguments)]
pub fn numint_3d_orth(
    out: &mut [f64],
    floorl: u32,
    topl: u32,
    pair: &PrimitivePair,
    fac: f64,
    log_prec: f64,
    field: &GridField<'_>,
    carver: &mut ScratchCarver<'_>,
) -> Result<(), GridIntegralError> {
    let grid = field.grid();
    let [mx, my, mz] = grid.mesh;
    let l1 = topl as usize + 1;
    let aij = pair.aij();
    let rij = pair.centre() - grid.origin;
    let ri = pair.ri - grid.origin;
    let cutoff = gto_rcut(aij, topl, fac, log_prec);

    let xs = carver.carve(l1 * mx)?;
    let ys = carver.carve(l1 * my)?;
    let zs = carver.carve(l1 * mz)?;
    let windows: [AxisWindow; 3] = [
        tabulate_axis(xs, &axis_params(grid, 0, &rij, &ri, cutoff, topl, aij)),
        tabulate_axis(ys, &axis_params(grid, 1, &rij, &ri, cutoff, topl, aij)),
        tabulate_axis(zs, &axis_params(grid, 2, &rij, &ri, cutoff, topl, aij)),
    ];
    let xs = shaped(xs, l1, mx)?;
    let ys = shaped(ys, l1, my)?;
    let zs = shaped(zs, l1, mz)?;

    // weightyz[lx, (y, z)] = fac * sum_x xs[lx, x] w[x, (y, z)]
    let weightyz = carver.carve(l1 * my * mz)?;
    {
        let mut weightyz = shaped_mut(weightyz, l1, my * mz)?;
        for seg in windows[0].segments(mx).into_iter().filter(|r| !r.is_empty()) {
            general_mat_mul(
                fac,
                &xs.slice(s![.., seg.clone()]),
                &field.values().slice(s![seg, ..]),
                1.0,
                &mut weightyz,
            );
        }
    }

    // weightz[lx, ly, z] = sum_y ys[ly, y] weightyz[lx, y, z]
    let weightz = carver.carve(l1 * l1 * mz)?;
    let y_segments = windows[1].segments(my);
    for lx in 0..l1 {
        let wyz = shaped(&weightyz[lx * my * mz..(lx + 1) * my * mz], my, mz)?;
        let mut wz = shaped_mut(&mut weightz[lx * l1 * mz..(lx + 1) * l1 * mz], l1, mz)?;
        for seg in y_segments.iter().filter(|r| !r.is_empty()) {
            general_mat_mul(
                1.0,
                &ys.slice(s![.., seg.clone()]),
                &wyz.slice(s![seg.clone(), ..]),
                1.0,
                &mut wz,
            );
        }
    }

    // out[(lx, ly, lz)] = sum_z weightz[lx, ly, z] zs[lz, z]
    let z_segments = windows[2].segments(mz);
    let components = cart_triangle(floorl, topl);
    for (val, (lx, ly, lz)) in out.iter_mut().zip(components) {
        let wz = &weightz[(lx as usize * l1 + ly as usize) * mz..][..mz];
        let pz = zs.row(lz as usize);
        *val = z_segments
            .iter()
            .flat_map(|seg| seg.clone())
            .map(|z| wz[z] * pz[z])
            .sum();
    }
    Ok(())
}

/// Integration over non-orthogonal lattices, for which no evaluation strategy is implemented.
///
/// # Errors
///
/// Always errors with [`GridIntegralError::UnsupportedLattice`].
pub fn numint_3d_nonorth(grid: &UniformGrid) -> Result<(), GridIntegralError> {
    log::debug!("Grid integration requested on a non-orthogonal lattice.");
    Err(GridIntegralError::UnsupportedLattice(format!(
        "grid integration over non-orthogonal lattice vectors is not available:\n{grid}"
    )))
}

fn axis_params(
    grid: &UniformGrid,
    k: usize,
    rij: &Vector3<f64>,
    ri: &Vector3<f64>,
    cutoff: f64,
    topl: u32,
    aij: f64,
) -> AxisParams {
    let height = grid.heights[(k, k)];
    AxisParams {
        x_frac: rij[k] * height,
        extent: grid.lattice[(k, k)],
        n: grid.mesh[k],
        radius_frac: cutoff * height.abs(),
        topl,
        periodic: grid.is_periodic(k),
        xij: rij[k],
        xi: ri[k],
        aij,
    }
}

fn shaped(buf: &[f64], rows: usize, cols: usize) -> Result<ArrayView2<'_, f64>, GridIntegralError> {
    ArrayView2::from_shape((rows, cols), buf)
        .map_err(|err| GridIntegralError::InvalidInput(err.to_string()))
}

fn shaped_mut(
    buf: &mut [f64],
    rows: usize,
    cols: usize,
) -> Result<ArrayViewMut2<'_, f64>, GridIntegralError> {
    ArrayViewMut2::from_shape((rows, cols), buf)
        .map_err(|err| GridIntegralError::InvalidInput(err.to_string()))
}
