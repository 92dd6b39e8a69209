use std::f64::consts::PI;

use approx::assert_relative_eq;
use nalgebra::Point3;
use ndarray::Array3;

use gridint::basis::{BasisSet, BasisShellContraction};
use gridint::drivers::grid_overlap::{GridOverlapDriver, GridOverlapParams};
use gridint::drivers::GridIntDriver;
use gridint::grid::UniformGrid;
use gridint::integrals::AngularTransformKind;

/// Analytic overlap of two unit-coefficient s primitives.
fn s_overlap(a: f64, ra: &Point3<f64>, b: f64, rb: &Point3<f64>) -> f64 {
    let p = a + b;
    (PI / p).powf(1.5) * (-a * b / p * (ra - rb).norm_squared()).exp()
}

#[test]
fn test_periodic_cell_overlap_matrix() {
    let _ = env_logger::builder().is_test(true).try_init();

    let ra = Point3::new(0.2, -0.1, 0.0);
    let rb = Point3::new(1.3, 0.4, -0.6);
    let basis = BasisSet::from_atoms(vec![
        vec![
            BasisShellContraction::segmented(0, &[(1.1, 1.0)], ra).unwrap(),
            BasisShellContraction::segmented(1, &[(0.9, 1.0)], ra).unwrap(),
        ],
        vec![BasisShellContraction::segmented(0, &[(0.7, 1.0)], rb).unwrap()],
    ]);
    let grid =
        UniformGrid::orthorhombic([5.0, 5.0, 5.0], [50, 50, 50], 3, Point3::new(-2.5, -2.5, -2.5))
            .unwrap();
    let field = Array3::<f64>::ones((50, 50, 50));
    let params = GridOverlapParams::builder()
        .log_prec(-30.0)
        .transform(AngularTransformKind::Spherical)
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
    let s = &driver.result().unwrap().matrix;
    assert_eq!(s.dim(), (5, 5));

    assert_relative_eq!(s[(0, 0)], s_overlap(1.1, &ra, 1.1, &ra), max_relative = 1e-8);
    assert_relative_eq!(s[(4, 4)], s_overlap(0.7, &rb, 0.7, &rb), max_relative = 1e-8);
    assert_relative_eq!(s[(0, 4)], s_overlap(1.1, &ra, 0.7, &rb), max_relative = 1e-8);
    // Concentric s and p functions are orthogonal.
    for k in 1..4 {
        assert_relative_eq!(s[(0, k)], 0.0, epsilon = 1e-10);
    }
    for i in 0..5 {
        for j in 0..5 {
            assert_eq!(s[(i, j)], s[(j, i)]);
        }
    }
}
