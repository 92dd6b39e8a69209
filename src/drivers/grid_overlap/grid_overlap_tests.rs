use std::f64::consts::PI;

use approx::assert_relative_eq;
use nalgebra::{Matrix3, Point3};
use ndarray::Array3;

use crate::basis::{BasisSet, BasisShellContraction};
use crate::drivers::grid_overlap::{GridOverlapDriver, GridOverlapParams};
use crate::drivers::GridIntDriver;
use crate::grid::UniformGrid;
use crate::integrals::fill2c::{fill2c, FillMode};
use crate::integrals::transform::AngularTransformKind;

fn open_grid() -> UniformGrid {
    UniformGrid::orthorhombic([12.0, 12.0, 12.0], [60, 60, 60], 0, Point3::new(-6.0, -6.0, -6.0))
        .unwrap()
}

fn water_like_basis() -> BasisSet {
    let o = Point3::new(0.0, 0.0, 0.12);
    let h1 = Point3::new(0.0, 1.43, -0.98);
    let h2 = Point3::new(0.0, -1.43, -0.98);
    BasisSet::from_atoms(vec![
        vec![
            BasisShellContraction::segmented(0, &[(5.0, 0.4), (1.1, 0.6)], o).unwrap(),
            BasisShellContraction::segmented(1, &[(1.2, 1.0)], o).unwrap(),
        ],
        vec![BasisShellContraction::segmented(0, &[(0.9, 1.0)], h1).unwrap()],
        vec![BasisShellContraction::segmented(0, &[(0.9, 1.0)], h2).unwrap()],
    ])
}

#[test]
fn test_drivers_grid_overlap_unit_field() {
    let basis = water_like_basis();
    let grid = open_grid();
    let field = Array3::<f64>::ones((60, 60, 60));
    let params = GridOverlapParams::builder().log_prec(-30.0).build().unwrap();
    let mut driver = GridOverlapDriver::builder()
        .parameters(&params)
        .basis(&basis)
        .grid(&grid)
        .field(field.view())
        .build()
        .unwrap();
    assert!(driver.result().is_err());
    driver.run().unwrap();
    let res = driver.result().unwrap();
    assert_eq!(res.shls_slice, [0, 4, 0, 4]);
    assert_eq!(res.matrix.dim(), (6, 6));

    // Scaling a unit field by the volume element reproduces plain quadrature weights.
    let weights = Array3::from_elem((60, 60, 60), grid.point_volume());
    let transform = AngularTransformKind::Cartesian.build(basis.max_l());
    let direct = fill2c(
        &basis,
        [0, 4, 0, 4],
        &grid,
        weights.view(),
        &params.fill2c_params(),
        transform.as_ref(),
    )
    .unwrap();
    assert_eq!(res.matrix, direct);

    assert_relative_eq!(res.matrix[(4, 4)], (PI / 1.8).powf(1.5), max_relative = 1e-9);
    assert_relative_eq!(res.matrix[(4, 5)], res.matrix[(5, 4)]);
    assert!(res.max_abs() >= res.matrix[(0, 0)]);
}

#[test]
fn test_drivers_grid_overlap_prescaled_field_and_slice() {
    let basis = water_like_basis();
    let grid = open_grid();
    let weights = Array3::from_elem((60, 60, 60), grid.point_volume());
    let full_params = GridOverlapParams::builder()
        .log_prec(-30.0)
        .include_volume_element(false)
        .fill_mode(FillMode::Plain)
        .build()
        .unwrap();
    let mut driver = GridOverlapDriver::builder()
        .parameters(&full_params)
        .basis(&basis)
        .grid(&grid)
        .field(weights.view())
        .build()
        .unwrap();
    driver.run().unwrap();
    let full = driver.result().unwrap().matrix.clone();

    let part_params = GridOverlapParams::builder()
        .log_prec(-30.0)
        .include_volume_element(false)
        .fill_mode(FillMode::Plain)
        .shls_slice(Some([1, 2, 2, 4]))
        .n_threads(Some(2))
        .build()
        .unwrap();
    let mut driver = GridOverlapDriver::builder()
        .parameters(&part_params)
        .basis(&basis)
        .grid(&grid)
        .field(weights.view())
        .build()
        .unwrap();
    driver.run().unwrap();
    let part = &driver.result().unwrap().matrix;
    assert_eq!(part.dim(), (3, 2));
    for i in 0..3 {
        for j in 0..2 {
            assert_eq!(part[(i, j)], full[(1 + i, 4 + j)]);
        }
    }
}

#[test]
fn test_drivers_grid_overlap_spherical_p_matches_cartesian_permutation() {
    let basis = water_like_basis();
    let grid = open_grid();
    let field = Array3::<f64>::ones((60, 60, 60));
    let run = |transform: AngularTransformKind| {
        let params = GridOverlapParams::builder()
            .log_prec(-30.0)
            .transform(transform)
            .build()
            .unwrap();
        let mut driver = GridOverlapDriver::builder()
            .parameters(&params)
            .basis(&basis)
            .grid(&grid)
            .field(field.view())
            .build()
            .unwrap();
        driver.run().unwrap();
        driver.result().unwrap().matrix.clone()
    };
    let cart = run(AngularTransformKind::Cartesian);
    let sph = run(AngularTransformKind::Spherical);
    // s and p shells have the same number of functions in both representations; the real
    // solid harmonics of p order the components as (y, z, x).
    assert_eq!(sph.dim(), cart.dim());
    let perm = [0, 2, 3, 1, 4, 5];
    for i in 0..6 {
        for j in 0..6 {
            assert_relative_eq!(
                sph[(i, j)],
                cart[(perm[i], perm[j])],
                max_relative = 1e-12,
                epsilon = 1e-14
            );
        }
    }
}

#[test]
fn test_drivers_grid_overlap_errors() {
    let basis = water_like_basis();
    let skewed = UniformGrid::builder()
        .lattice(Matrix3::new(6.0, 0.0, 0.0, 1.0, 6.0, 0.0, 0.0, 0.0, 6.0))
        .mesh([8, 8, 8])
        .dimension(3)
        .build()
        .unwrap();
    let field = Array3::<f64>::ones((8, 8, 8));
    let params = GridOverlapParams::default();
    let mut driver = GridOverlapDriver::builder()
        .parameters(&params)
        .basis(&basis)
        .grid(&skewed)
        .field(field.view())
        .build()
        .unwrap();
    assert!(driver.run().is_err());
    assert!(driver.result().is_err());

    let grid = open_grid();
    let mut driver = GridOverlapDriver::builder()
        .parameters(&params)
        .basis(&basis)
        .grid(&grid)
        .field(field.view())
        .build()
        .unwrap();
    assert!(driver.run().is_err());

    assert!(GridOverlapDriver::builder()
        .parameters(&params)
        .basis(&basis)
        .build()
        .is_err());
}

#[test]
fn test_drivers_grid_overlap_params_from_yaml() {
    let dir = std::env::temp_dir().join(format!("gridint-params-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("params.yml");
    std::fs::write(
        &path,
        "fill_mode: AntiHermitian\ntransform: Spherical\nshls_slice: [0, 2, 0, 2]\n",
    )
    .unwrap();
    let params = GridOverlapParams::from_yaml(&path).unwrap();
    assert_eq!(params.fill_mode, FillMode::AntiHermitian);
    assert_eq!(params.transform, AngularTransformKind::Spherical);
    assert_eq!(params.shls_slice, Some([0, 2, 0, 2]));
    assert_eq!(params.log_prec, 1e-10f64.ln());
    assert_eq!(params.fac, 1.0);
    assert!(params.include_volume_element);
    assert_eq!(params.n_threads, None);
    assert_eq!(GridOverlapParams::builder().build().unwrap(), GridOverlapParams::default());
    std::fs::remove_dir_all(&dir).unwrap();
}
