//! Per-axis tabulation of Gaussian products with periodic image folding.

use std::ops::Range;

#[cfg(test)]
#[path = "axis_tests.rs"]
mod axis_tests;

// ==================
// Struct definitions
// ==================

/// Inputs describing one lattice axis for the tabulation of a primitive-pair product.
///
/// All Cartesian coordinates are measured from the grid origin along this axis.
#[derive(Clone, Debug)]
pub struct AxisParams {
    /// The fractional coordinate of the pair centre along this axis.
    pub x_frac: f64,

    /// The length of the lattice vector along this axis.
    pub extent: f64,

    /// The number of grid points along this axis.
    pub n: usize,

    /// The support radius expressed in fractional units.
    pub radius_frac: f64,

    /// The highest power of the displacement to tabulate.
    pub topl: u32,

    /// Whether this axis is periodic.
    pub periodic: bool,

    /// The Cartesian coordinate of the pair centre.
    pub xij: f64,

    /// The Cartesian coordinate of the first shell's centre, from which the displacement powers
    /// are measured.
    pub xi: f64,

    /// The combined exponent of the primitive pair.
    pub aij: f64,
}

/// The region of an axis over which a tabulated product is non-negligible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisWindow {
    /// The first periodic image touched (inclusive).
    pub nimg0: i64,

    /// The last periodic image touched (exclusive).
    pub nimg1: i64,

    /// The first grid index of the window within one period (inclusive).
    pub nx0: usize,

    /// The last grid index of the window within one period (exclusive).
    pub nx1: usize,
}

impl AxisWindow {
    /// The number of periodic images spanned by the window.
    pub fn n_images(&self) -> i64 {
        self.nimg1 - self.nimg0
    }

    /// Whether the window wraps around the cell boundary as two disjoint pieces.
    pub fn is_wrapped(&self) -> bool {
        self.n_images() == 2 && self.nx1 <= self.nx0
    }

    /// The grid-index ranges over which the window is active within one period of `n` points.
    ///
    /// A window inside one image yields one range; a wrapped window yields
    /// $`[0, n_{x1})`$ and $`[n_{x0}, n)`$; any other window yields the full period. Unused
    /// entries are empty.
    pub fn segments(&self, n: usize) -> [Range<usize>; 2] {
        if self.n_images() == 1 {
            [self.nx0..self.nx1.max(self.nx0), 0..0]
        } else if self.is_wrapped() {
            [0..self.nx1, self.nx0..n]
        } else {
            [0..n, 0..0]
        }
    }
}

// =========
// Functions
// =========

/// Fills `table` with $`(x - x_i)^l \exp[-a_{ij} (x - x_{ij})^2]`$ for $`l = 0, \ldots, l_{\mathrm{top}}`$
/// at every grid point of one period, summing over all periodic images touched by the support
/// window.
///
/// Row $`l`$ occupies `table[l * n..(l + 1) * n]`. Rather than one exponential per point, the
/// value nearest the pair centre seeds two geometric recurrences that propagate outward.
///
/// # Returns
///
/// The support window of the product along this axis.
pub fn tabulate_axis(table: &mut [f64], params: &AxisParams) -> AxisWindow {
    let n = params.n;
    let nf = n as f64;
    debug_assert_eq!(table.len(), (params.topl as usize + 1) * n);

    let edge0 = params.x_frac - params.radius_frac;
    let edge1 = params.x_frac + params.radius_frac;
    let window = if params.periodic {
        let nimg0 = edge0.floor() as i64;
        let nimg1 = (edge1.ceil() as i64).max(nimg0 + 1);
        let n_i = n as i64;
        let nx0 = ((edge0 * nf).floor() as i64).rem_euclid(n_i) as usize;
        let nx1 = (((edge1 * nf).ceil() as i64 - 1).rem_euclid(n_i) + 1) as usize;
        AxisWindow {
            nimg0,
            nimg1,
            nx0,
            nx1,
        }
    } else {
        let clamp = |x: f64| x.max(0.0).min(nf) as usize;
        AxisWindow {
            nimg0: 0,
            nimg1: 1,
            nx0: clamp((edge0 * nf).floor()),
            nx1: clamp((edge1 * nf).ceil()),
        }
    };

    table.fill(0.0);
    let n_unfolded = window.n_images() as usize * n;
    if n_unfolded == 0 {
        return window;
    }

    let aij = params.aij;
    let dx = params.extent / nf;
    let img0_x = params.extent * window.nimg0 as f64;
    let seed = ((params.x_frac * nf).round() as i64 - window.nimg0 * n as i64)
        .clamp(0, n_unfolded as i64 - 1) as usize;
    let x_seed = img0_x + dx * seed as f64;
    let d_seed = x_seed - params.xij;

    let exp_dxdx = (-aij * dx * dx).exp();
    let exp_2dxdx = exp_dxdx * exp_dxdx;
    let topl = params.topl as usize;

    // Folds the value at unfolded index `u` into every degree row.
    let mut deposit = |u: usize, value: f64| {
        let g = u % n;
        let t = img0_x + dx * u as f64 - params.xi;
        let mut p = value;
        for l in 0..=topl {
            table[l * n + g] += p;
            p *= t;
        }
    };

    let v_seed = (-aij * d_seed * d_seed).exp();
    deposit(seed, v_seed);

    let mut value = v_seed;
    let mut ratio = (-2.0 * aij * d_seed * dx).exp() * exp_dxdx;
    for u in (seed + 1)..n_unfolded {
        value *= ratio;
        ratio *= exp_2dxdx;
        deposit(u, value);
    }

    let mut value = v_seed;
    let mut ratio = (2.0 * aij * d_seed * dx).exp() * exp_dxdx;
    for u in (0..seed).rev() {
        value *= ratio;
        ratio *= exp_2dxdx;
        deposit(u, value);
    }

    window
}
