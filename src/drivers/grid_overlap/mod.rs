//! Driver for two-centre grid-quadrature integral matrices.

use std::fmt;
use std::path::Path;

use anyhow::{self, format_err};
use derive_builder::Builder;
use log;
use ndarray::{Array2, ArrayView3, CowArray};
use serde::{Deserialize, Serialize};

use crate::basis::BasisSet;
use crate::drivers::GridIntDriver;
use crate::grid::UniformGrid;
use crate::integrals::fill2c::{fill2c, Fill2cParams, FillMode};
use crate::integrals::rcut::gto_rcut;
use crate::integrals::transform::AngularTransformKind;
use crate::io::format::{
    gridint_output, gridint_warn, log_subtitle, log_title, nice_bool, write_subtitle,
    GridIntOutput,
};
use crate::io::read_gridint_yaml;

#[cfg(test)]
#[path = "grid_overlap_tests.rs"]
mod grid_overlap_tests;

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for a grid-integral matrix run.
#[derive(Clone, Builder, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOverlapParams {
    /// The natural logarithm of the precision target for screening and support radii.
    #[builder(default = "1e-10f64.ln()")]
    pub log_prec: f64,

    /// The overall prefactor of the integrals.
    #[builder(default = "1.0")]
    pub fac: f64,

    /// The symmetry with which the matrix is filled.
    #[builder(default)]
    pub fill_mode: FillMode,

    /// The angular functions of the output matrix.
    #[builder(default)]
    pub transform: AngularTransformKind,

    /// The number of worker threads. If `None`, the global thread pool is used.
    #[builder(default = "None")]
    pub n_threads: Option<usize>,

    /// The shell ranges `[ish0, ish1, jsh0, jsh1]` of the rows and columns. If `None`, the whole
    /// basis is used for both.
    #[builder(default = "None")]
    pub shls_slice: Option<[usize; 4]>,

    /// Boolean indicating if the sampled field is to be multiplied by the volume element of one
    /// grid point before integration. If `false`, the field is taken to hold quadrature weights
    /// already.
    #[builder(default = "true")]
    pub include_volume_element: bool,
}

impl GridOverlapParams {
    /// Returns a builder to construct a [`GridOverlapParams`] structure.
    pub fn builder() -> GridOverlapParamsBuilder {
        GridOverlapParamsBuilder::default()
    }

    /// Reads parameters from a YAML file. Keys that are absent take their default values.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        read_gridint_yaml(path)
    }

    /// The subset of these parameters that controls the matrix fill itself.
    pub fn fill2c_params(&self) -> Fill2cParams {
        Fill2cParams {
            log_prec: self.log_prec,
            fac: self.fac,
            fill_mode: self.fill_mode,
            n_threads: self.n_threads,
        }
    }
}

impl Default for GridOverlapParams {
    fn default() -> Self {
        Self {
            log_prec: 1e-10f64.ln(),
            fac: 1.0,
            fill_mode: FillMode::default(),
            transform: AngularTransformKind::default(),
            n_threads: None,
            shls_slice: None,
            include_volume_element: true,
        }
    }
}

impl fmt::Display for GridOverlapParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Precision target: {:.3e} (ln = {:+.3})",
            self.log_prec.exp(),
            self.log_prec
        )?;
        writeln!(f, "Integral prefactor: {:+.6e}", self.fac)?;
        writeln!(f, "Matrix fill: {}", self.fill_mode)?;
        writeln!(f, "Angular functions: {}", self.transform)?;
        writeln!(
            f,
            "Shell ranges: {}",
            self.shls_slice
                .map(|[ish0, ish1, jsh0, jsh1]| format!(
                    "rows {ish0}..{ish1}, columns {jsh0}..{jsh1}"
                ))
                .unwrap_or_else(|| "whole basis".to_string())
        )?;
        writeln!(
            f,
            "Multiply field by grid volume element: {}",
            nice_bool(self.include_volume_element)
        )?;
        writeln!(
            f,
            "Worker threads: {}",
            self.n_threads
                .map(|n| n.to_string())
                .unwrap_or_else(|| "global pool".to_string())
        )?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Result
// ------

/// A structure to contain the results of a grid-integral matrix run.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct GridOverlapResult {
    /// The control parameters used to obtain this result.
    pub parameters: GridOverlapParams,

    /// The shell ranges `[ish0, ish1, jsh0, jsh1]` actually integrated.
    pub shls_slice: [usize; 4],

    /// The column-major integral matrix.
    pub matrix: Array2<f64>,
}

impl GridOverlapResult {
    /// Returns a builder to construct a [`GridOverlapResult`] structure.
    fn builder() -> GridOverlapResultBuilder {
        GridOverlapResultBuilder::default()
    }

    /// The largest element magnitude of the matrix.
    pub fn max_abs(&self) -> f64 {
        self.matrix.iter().fold(0.0f64, |acc, v| acc.max(v.abs()))
    }
}

impl fmt::Display for GridOverlapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [ish0, ish1, jsh0, jsh1] = self.shls_slice;
        let (nrows, ncols) = self.matrix.dim();
        write_subtitle(f, "Grid-integral matrix summary")?;
        writeln!(f)?;
        writeln!(
            f,
            "Matrix of shape {nrows} x {ncols} over row shells {ish0}..{ish1} and column shells {jsh0}..{jsh1}"
        )?;
        writeln!(f, "  Largest |element|: {:.6e}", self.max_abs())?;
        if nrows == ncols && nrows > 0 {
            writeln!(f, "  Trace: {:+.6e}", self.matrix.diag().sum())?;
        }
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for two-centre grid-integral matrices.
#[derive(Clone, Builder)]
pub struct GridOverlapDriver<'a> {
    /// The control parameters.
    parameters: &'a GridOverlapParams,

    /// The basis set whose shells index the rows and columns.
    basis: &'a BasisSet,

    /// The grid on which the field is sampled.
    grid: &'a UniformGrid,

    /// The field values, of shape `grid.mesh`.
    field: ArrayView3<'a, f64>,

    /// The result of the run.
    #[builder(setter(skip), default = "None")]
    result: Option<GridOverlapResult>,
}

impl<'a> GridOverlapDriver<'a> {
    /// Returns a builder to construct a [`GridOverlapDriver`] structure.
    pub fn builder() -> GridOverlapDriverBuilder<'a> {
        GridOverlapDriverBuilder::default()
    }

    /// Warns about shells whose support reaches past an open edge of the grid, where their
    /// integrals are truncated.
    fn check_open_edges(&self) {
        if !self.grid.is_orthogonal() {
            return;
        }
        let log_prec = self.parameters.log_prec;
        for (ish, shell) in self.basis.all_shells().enumerate() {
            let contraction = &shell.contraction;
            let radius = contraction
                .exponents()
                .iter()
                .enumerate()
                .map(|(p, &alpha)| {
                    gto_rcut(
                        alpha,
                        shell.l,
                        contraction.log_max_coefficient(p).exp(),
                        log_prec,
                    )
                })
                .fold(0.0, f64::max);
            let truncated_axes = (self.grid.dimension..3)
                .filter(|&k| {
                    let edge0 = self.grid.origin[k];
                    let edge1 = edge0 + self.grid.lattice[(k, k)];
                    let (lo, hi) = (edge0.min(edge1), edge0.max(edge1));
                    let x = shell.cart_origin[k];
                    x - radius < lo || x + radius > hi
                })
                .collect::<Vec<_>>();
            if !truncated_axes.is_empty() {
                gridint_warn!(
                    "Shell #{ish} reaches {radius:.3} bohr from its centre, beyond the open grid edge along axis/axes {truncated_axes:?}."
                );
            }
        }
    }

    /// Evaluates the integral matrix.
    fn compute_matrix(&mut self) -> Result<(), anyhow::Error> {
        log_title("Grid-Quadrature Two-Centre Integrals");
        gridint_output!("");
        let params = self.parameters;
        params.log_output_display();
        self.grid.log_output_display();
        gridint_output!("");
        gridint_output!(
            "Basis set: {} shell(s), highest angular momentum {}",
            self.basis.n_shells(),
            self.basis.max_l()
        );
        gridint_output!("");
        self.check_open_edges();

        let nbas = self.basis.n_shells();
        let shls_slice = params.shls_slice.unwrap_or([0, nbas, 0, nbas]);
        let field = if params.include_volume_element {
            let mut weights = self.field.as_standard_layout().into_owned();
            weights *= self.grid.point_volume();
            CowArray::from(weights)
        } else {
            self.field.as_standard_layout()
        };
        let transform = params.transform.build(self.basis.max_l());

        log_subtitle("Matrix fill");
        gridint_output!("");
        let matrix = fill2c(
            self.basis,
            shls_slice,
            self.grid,
            field.view(),
            &params.fill2c_params(),
            transform.as_ref(),
        )?;
        log::debug!("Grid-integral matrix of shape {:?} filled.", matrix.dim());

        let result = GridOverlapResult::builder()
            .parameters(params.clone())
            .shls_slice(shls_slice)
            .matrix(matrix)
            .build()?;
        result.log_output_display();
        self.result = Some(result);
        Ok(())
    }
}

impl<'a> GridIntDriver for GridOverlapDriver<'a> {
    type Params = GridOverlapParams;

    type Outcome = GridOverlapResult;

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.compute_matrix()
    }

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No grid-integral results found."))
    }
}
