//! Uniform real-space grids.

use std::fmt;

use derive_builder::Builder;
use itertools::Itertools;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};


/// Relative tolerance below which off-diagonal lattice elements are treated as zero.
const ORTHOGONALITY_THRESH: f64 = 1e-12;

/// A structure describing a uniform grid spanned by three lattice vectors.
///
/// Grid point $`(i, j, k)`$ sits at
///
/// ```math
/// \mathbf{O} + \frac{i}{n_0}\mathbf{a}_0 + \frac{j}{n_1}\mathbf{a}_1 + \frac{k}{n_2}\mathbf{a}_2,
/// ```
///
/// where $`\mathbf{O}`$ is [`Self::origin`] and $`n_k`$ the mesh counts. The first
/// [`Self::dimension`] axes are periodic; the remaining ones are open.
#[derive(Clone, Builder, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct UniformGrid {
    /// The lattice vectors $`\mathbf{a}_k`$ as the rows of a matrix.
    pub lattice: Matrix3<f64>,

    /// The reciprocal height vectors $`\mathbf{b}_k`$ as the rows of a matrix, satisfying
    /// $`\mathbf{a}_i \cdot \mathbf{b}_j = \delta_{ij}`$. By default these are derived from
    /// [`Self::lattice`].
    #[builder(default = "self.default_heights()?")]
    pub heights: Matrix3<f64>,

    /// The number of grid points along each lattice vector.
    pub mesh: [usize; 3],

    /// The number of periodic axes, between 0 (open in every direction) and 3 (fully periodic).
    #[builder(default = "0")]
    pub dimension: usize,

    /// The Cartesian position of grid point $`(0, 0, 0)`$.
    #[builder(default = "Point3::origin()")]
    pub origin: Point3<f64>,
}

impl UniformGridBuilder {
    fn default_heights(&self) -> Result<Matrix3<f64>, String> {
        let lattice = self
            .lattice
            .ok_or_else(|| "`lattice` has not been set.".to_string())?;
        lattice
            .try_inverse()
            .map(|inv| inv.transpose())
            .ok_or_else(|| "The lattice vectors are linearly dependent.".to_string())
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(mesh) = self.mesh {
            if mesh.iter().any(|&n| n == 0) {
                return Err("Every mesh count must be positive.".to_string());
            }
        }
        if let Some(dimension) = self.dimension {
            if dimension > 3 {
                return Err(format!(
                    "The number of periodic axes must be between 0 and 3, not {dimension}."
                ));
            }
        }
        if let Some(lattice) = self.lattice {
            if !lattice.iter().all(|x| x.is_finite()) || lattice.determinant() == 0.0 {
                return Err("The lattice vectors must be finite and span three dimensions.".to_string());
            }
        }
        Ok(())
    }
}

impl UniformGrid {
    /// Returns a builder to construct a new [`UniformGrid`].
    pub fn builder() -> UniformGridBuilder {
        UniformGridBuilder::default()
    }

    /// Constructs an orthorhombic grid with edge lengths `lengths` whose point $`(0,0,0)`$ lies
    /// at `origin`.
    pub fn orthorhombic(
        lengths: [f64; 3],
        mesh: [usize; 3],
        dimension: usize,
        origin: Point3<f64>,
    ) -> Result<Self, anyhow::Error> {
        Self::builder()
            .lattice(Matrix3::from_diagonal(&Vector3::from(lengths)))
            .mesh(mesh)
            .dimension(dimension)
            .origin(origin)
            .build()
            .map_err(|err| anyhow::format_err!(err))
    }

    /// Checks whether the lattice vectors are aligned with the Cartesian axes.
    pub fn is_orthogonal(&self) -> bool {
        let scale = self.lattice.amax();
        (0..3)
            .cartesian_product(0..3)
            .filter(|(i, j)| i != j)
            .all(|(i, j)| self.lattice[(i, j)].abs() <= ORTHOGONALITY_THRESH * scale)
    }

    /// Whether axis `axis` is periodic.
    pub fn is_periodic(&self, axis: usize) -> bool {
        axis < self.dimension
    }

    /// The total number of grid points.
    pub fn n_points(&self) -> usize {
        self.mesh.iter().product()
    }

    /// The volume element associated with one grid point.
    pub fn point_volume(&self) -> f64 {
        self.lattice.determinant().abs() / self.n_points() as f64
    }
}

impl fmt::Display for UniformGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Uniform grid:")?;
        for k in 0..3 {
            writeln!(
                f,
                "  a{k} = ({}), {} points, {}",
                self.lattice
                    .row(k)
                    .iter()
                    .map(|x| format!("{x:+.4}"))
                    .join(", "),
                self.mesh[k],
                if self.is_periodic(k) { "periodic" } else { "open" }
            )?;
        }
        writeln!(
            f,
            "  Origin: ({})",
            self.origin.iter().map(|x| format!("{x:+.4}")).join(", ")
        )?;
        Ok(())
    }
}
