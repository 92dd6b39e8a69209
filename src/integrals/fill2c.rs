//! Parallel assembly of two-centre grid-integral matrices over a basis set.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use derive_builder::Builder;
use log;
use ndarray::{Array2, ArrayView3, ArrayViewMut2, Axis, ShapeBuilder};
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::basis::BasisSet;
use crate::grid::UniformGrid;
use crate::integrals::driver::ShellPairIntegrator;
use crate::integrals::orth3d::GridField;
use crate::integrals::scratch::ScratchArena;
use crate::integrals::transform::AngularTransform;
use crate::integrals::GridIntegralError;

#[cfg(test)]
#[path = "fill2c_tests.rs"]
mod fill2c_tests;

// ==================
// Struct definitions
// ==================

/// An enumerated type for the symmetry with which a two-centre matrix is filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillMode {
    /// Every block is evaluated.
    Plain,

    /// Only blocks on or above the diagonal are evaluated; the lower triangle is the transpose
    /// of the upper triangle.
    #[default]
    Hermitian,

    /// Only blocks on or above the diagonal are evaluated; the lower triangle is the negated
    /// transpose of the upper triangle and the diagonal vanishes.
    AntiHermitian,

    /// As [`FillMode::Hermitian`] for real matrices.
    Symmetric,
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Hermitian => write!(f, "Hermitian"),
            Self::AntiHermitian => write!(f, "anti-Hermitian"),
            Self::Symmetric => write!(f, "symmetric"),
        }
    }
}

/// A structure containing control parameters for [`fill2c`].
#[derive(Clone, Builder, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fill2cParams {
    /// The natural logarithm of the precision target.
    #[builder(default = "1e-10f64.ln()")]
    pub log_prec: f64,

    /// The overall prefactor of the integrals.
    #[builder(default = "1.0")]
    pub fac: f64,

    /// The symmetry with which the matrix is filled.
    #[builder(default)]
    pub fill_mode: FillMode,

    /// The number of worker threads. If `None`, the global thread pool is used.
    #[builder(default = "None")]
    pub n_threads: Option<usize>,
}

impl Fill2cParams {
    /// Returns a builder to construct a [`Fill2cParams`] structure.
    pub fn builder() -> Fill2cParamsBuilder {
        Fill2cParamsBuilder::default()
    }
}

impl Default for Fill2cParams {
    fn default() -> Self {
        Self {
            log_prec: 1e-10f64.ln(),
            fac: 1.0,
            fill_mode: FillMode::default(),
            n_threads: None,
        }
    }
}

/// The rectangle of the output matrix owned by one shell pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockAssignment {
    pub ish: usize,
    pub jsh: usize,

    /// The first row of the block, relative to the first row shell of the fill.
    pub row0: usize,
    pub nrows: usize,

    /// The first column of the block, relative to the first column shell of the fill.
    pub col0: usize,
    pub ncols: usize,
}

// =========
// Functions
// =========

/// Partitions the output matrix into the shell-pair blocks to be evaluated.
///
/// Pairs with the row shell after the column shell are skipped unless `fill_mode` is
/// [`FillMode::Plain`].
///
/// # Arguments
///
/// * `ao_loc` - The orbital-offset table of the whole basis.
/// * `shls_slice` - The shell ranges `[ish0, ish1, jsh0, jsh1]`.
pub fn block_assignments(
    ao_loc: &[usize],
    shls_slice: [usize; 4],
    fill_mode: FillMode,
) -> Vec<BlockAssignment> {
    let [ish0, ish1, jsh0, jsh1] = shls_slice;
    let mut assignments = Vec::with_capacity((ish1 - ish0) * (jsh1 - jsh0));
    for jsh in jsh0..jsh1 {
        for ish in ish0..ish1 {
            if fill_mode != FillMode::Plain && ish > jsh {
                continue;
            }
            assignments.push(BlockAssignment {
                ish,
                jsh,
                row0: ao_loc[ish] - ao_loc[ish0],
                nrows: ao_loc[ish + 1] - ao_loc[ish],
                col0: ao_loc[jsh] - ao_loc[jsh0],
                ncols: ao_loc[jsh + 1] - ao_loc[jsh],
            });
        }
    }
    assignments
}

/// Splits `mat` into disjoint mutable views, one per shell block of the grid defined by
/// `row_sizes` and `col_sizes`. The view of row shell `a` and column shell `b` is at
/// `[b][a]`.
fn split_blocks<'m>(
    mat: ArrayViewMut2<'m, f64>,
    row_sizes: &[usize],
    col_sizes: &[usize],
) -> Vec<Vec<ArrayViewMut2<'m, f64>>> {
    let mut columns = Vec::with_capacity(col_sizes.len());
    let mut rest = mat;
    for &ncols in col_sizes {
        let (strip, tail) = rest.split_at(Axis(1), ncols);
        columns.push(strip);
        rest = tail;
    }
    columns
        .into_iter()
        .map(|strip| {
            let mut blocks = Vec::with_capacity(row_sizes.len());
            let mut rest = strip;
            for &nrows in row_sizes {
                let (block, tail) = rest.split_at(Axis(0), nrows);
                blocks.push(block);
                rest = tail;
            }
            blocks
        })
        .collect()
}

/// Fills the two-centre matrix of grid integrals between the shells of `basis`.
///
/// The matrix element for functions $`\mu`$ on shell $`i`$ and $`\nu`$ on shell $`j`$ is
///
/// ```math
/// f \sum_{\mathbf{r}} \chi_\mu(\mathbf{r}) \chi_\nu(\mathbf{r}) w(\mathbf{r}),
/// ```
///
/// where $`w`$ is the field, taken to already include any quadrature weight, and the sum runs
/// over all grid points and the periodic images of the shell-pair product.
///
/// # Arguments
///
/// * `basis` - The basis set.
/// * `shls_slice` - The shell ranges `[ish0, ish1, jsh0, jsh1]` of the rows and columns.
/// * `grid` - The grid on which `field` is sampled.
/// * `field` - The field values, of shape `grid.mesh`, in standard layout.
/// * `params` - The control parameters.
/// * `transform` - The angular transform defining the output functions.
///
/// # Returns
///
/// The column-major matrix of shape $`n_{\mathrm{ao},i} \times n_{\mathrm{ao},j}`$.
///
/// # Errors
///
/// Errors if the inputs are inconsistent, and with the first error raised by any block
/// otherwise. No partial matrix is returned.
pub fn fill2c(
    basis: &BasisSet,
    shls_slice: [usize; 4],
    grid: &UniformGrid,
    field: ArrayView3<'_, f64>,
    params: &Fill2cParams,
    transform: &dyn AngularTransform,
) -> Result<Array2<f64>, GridIntegralError> {
    let [ish0, ish1, jsh0, jsh1] = shls_slice;
    let nbas = basis.n_shells();
    if ish0 > ish1 || jsh0 > jsh1 || ish1 > nbas || jsh1 > nbas {
        return Err(GridIntegralError::InvalidInput(format!(
            "Shell slice {shls_slice:?} is invalid for a basis of {nbas} shell(s)."
        )));
    }
    if params.fill_mode != FillMode::Plain && (ish0 != jsh0 || ish1 != jsh1) {
        return Err(GridIntegralError::InvalidInput(format!(
            "A {} fill needs identical row and column shell ranges, not {shls_slice:?}.",
            params.fill_mode
        )));
    }
    let field = GridField::new(grid, field.view())?;

    let ao_loc = basis.ao_loc(|shell| transform.n_funcs(shell.l) * shell.n_contractions());
    let naoi = ao_loc[ish1] - ao_loc[ish0];
    let naoj = ao_loc[jsh1] - ao_loc[jsh0];
    let assignments = block_assignments(&ao_loc, shls_slice, params.fill_mode);

    let integrator = |ish: usize, jsh: usize| {
        ShellPairIntegrator::new(
            &basis[ish],
            &basis[jsh],
            &field,
            params.fac,
            params.log_prec,
            transform,
        )
    };
    let cache_size = (ish0.min(jsh0)..ish1.max(jsh1))
        .map(|ish| integrator(ish, ish).cache_size())
        .chain(
            assignments
                .iter()
                .map(|assign| integrator(assign.ish, assign.jsh).cache_size()),
        )
        .max()
        .unwrap_or(0);
    log::debug!(
        "Filling a {naoi} x {naoj} {} matrix from {} shell-pair block(s) with {cache_size} scratch element(s) per worker.",
        params.fill_mode,
        assignments.len()
    );

    let mut mat = Array2::<f64>::zeros((naoi, naoj).f());
    {
        let row_sizes = (ish0..ish1)
            .map(|ish| ao_loc[ish + 1] - ao_loc[ish])
            .collect::<Vec<_>>();
        let col_sizes = (jsh0..jsh1)
            .map(|jsh| ao_loc[jsh + 1] - ao_loc[jsh])
            .collect::<Vec<_>>();
        let mut blocks = split_blocks(mat.view_mut(), &row_sizes, &col_sizes)
            .into_iter()
            .map(|column| column.into_iter().map(Some).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let tasks = assignments
            .iter()
            .filter_map(|assign| {
                blocks[assign.jsh - jsh0][assign.ish - ish0]
                    .take()
                    .map(|block| (*assign, block))
            })
            .collect::<Vec<_>>();

        let pool = params
            .n_threads
            .map(|n_threads| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n_threads)
                    .build()
                    .map_err(|err| GridIntegralError::InvalidInput(err.to_string()))
            })
            .transpose()?;
        let outcome = run_tasks(tasks, cache_size, pool.as_ref(), |(assign, block), arena| {
            integrator(assign.ish, assign.jsh)
                .evaluate_into(block, arena)
                .map(|_| ())
        });
        if let Err(err) = &outcome {
            log::error!("Two-centre grid-integral fill failed: {err}");
        }
        let n_arenas = outcome?;
        log::debug!("Blocks evaluated with {n_arenas} scratch arena(s).");
    }

    match params.fill_mode {
        FillMode::Plain => {}
        FillMode::Hermitian | FillMode::Symmetric => complete_lower_triangle(&mut mat, 1.0),
        FillMode::AntiHermitian => {
            complete_lower_triangle(&mut mat, -1.0);
            mat.diag_mut().fill(0.0);
        }
    }
    Ok(mat)
}

/// Evaluates every task on the workers of `pool`, or of the current pool if `None`.
///
/// Each worker allocates one arena of `cache_size` elements and reuses it for every task it
/// pulls from the shared queue. Once a task fails, the remaining tasks are abandoned.
///
/// # Returns
///
/// The number of arenas allocated.
fn run_tasks<T, F>(
    tasks: Vec<T>,
    cache_size: usize,
    pool: Option<&ThreadPool>,
    evaluate: F,
) -> Result<usize, GridIntegralError>
where
    T: Send,
    F: Fn(T, &mut ScratchArena) -> Result<(), GridIntegralError> + Sync,
{
    let slots = tasks
        .into_iter()
        .map(|task| Mutex::new(Some(task)))
        .collect::<Vec<_>>();
    let next = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let n_arenas = AtomicUsize::new(0);
    let worker = || -> Result<(), GridIntegralError> {
        if next.load(Ordering::Relaxed) >= slots.len() {
            return Ok(());
        }
        let mut arena = ScratchArena::new(cache_size);
        n_arenas.fetch_add(1, Ordering::Relaxed);
        while !failed.load(Ordering::Relaxed) {
            let Some(slot) = slots.get(next.fetch_add(1, Ordering::Relaxed)) else {
                break;
            };
            let task = slot.lock().ok().and_then(|mut guard| guard.take());
            if let Some(task) = task {
                if let Err(err) = evaluate(task, &mut arena) {
                    failed.store(true, Ordering::Relaxed);
                    return Err(err);
                }
            }
        }
        Ok(())
    };
    let outcomes = match pool {
        Some(pool) => pool.broadcast(|_| worker()),
        None => rayon::broadcast(|_| worker()),
    };
    outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;
    Ok(n_arenas.load(Ordering::Relaxed))
}

/// Overwrites the strict lower triangle of the square matrix `mat` with `sign` times the
/// transpose of its strict upper triangle.
fn complete_lower_triangle(mat: &mut Array2<f64>, sign: f64) {
    let n = mat.nrows();
    for j in 0..n {
        for i in (j + 1)..n {
            mat[(i, j)] = sign * mat[(j, i)];
        }
    }
}
