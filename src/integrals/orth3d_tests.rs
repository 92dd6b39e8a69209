use approx::assert_relative_eq;
use nalgebra::{Matrix3, Point3};
use ndarray::Array3;

use crate::angmom::{cart_triangle, n_cart_triangle};
use crate::grid::UniformGrid;
use crate::integrals::orth3d::{numint_3d, GridField, PrimitivePair};
use crate::integrals::scratch::ScratchArena;
use crate::integrals::GridIntegralError;

fn test_field(mesh: [usize; 3]) -> Array3<f64> {
    Array3::from_shape_fn((mesh[0], mesh[1], mesh[2]), |(i, j, k)| {
        1.0 + 0.3 * (i as f64 * 0.7).sin() + 0.2 * ((j * k) as f64 * 0.3).cos()
    })
}

/// Direct summation over grid points and periodic images within `-nimg..=nimg` along each
/// periodic axis.
#[allow(clippy::too_many_arguments)]
fn brute_force(
    grid: &UniformGrid,
    field: &Array3<f64>,
    pair: &PrimitivePair,
    fac: f64,
    floorl: u32,
    topl: u32,
    nimg: i64,
) -> Vec<f64> {
    let rij = pair.centre();
    let aij = pair.aij();
    let range = |k: usize| {
        if grid.is_periodic(k) {
            -nimg..=nimg
        } else {
            0..=0
        }
    };
    cart_triangle(floorl, topl)
        .map(|(lx, ly, lz)| {
            let mut total = 0.0;
            for ((i, j, k), w) in field.indexed_iter() {
                for ix in range(0) {
                    for iy in range(1) {
                        for iz in range(2) {
                            let idx = [i, j, k];
                            let img = [ix, iy, iz];
                            let r: Vec<f64> = (0..3)
                                .map(|d| {
                                    grid.origin[d]
                                        + grid.lattice[(d, d)]
                                            * (idx[d] as f64 / grid.mesh[d] as f64
                                                + img[d] as f64)
                                })
                                .collect();
                            let d2: f64 = (0..3).map(|d| (r[d] - rij[d]).powi(2)).sum();
                            total += fac
                                * (r[0] - pair.ri[0]).powi(lx as i32)
                                * (r[1] - pair.ri[1]).powi(ly as i32)
                                * (r[2] - pair.ri[2]).powi(lz as i32)
                                * (-aij * d2).exp()
                                * w;
                        }
                    }
                }
            }
            total
        })
        .collect()
}

fn test_pair() -> PrimitivePair {
    PrimitivePair {
        ai: 0.9,
        aj: 0.4,
        ri: Point3::new(0.3, -0.2, 0.5),
        rj: Point3::new(-0.4, 0.6, 0.1),
    }
}

#[test]
fn test_numint_3d_open_matches_direct_sum() {
    let grid = UniformGrid::orthorhombic(
        [6.0, 6.5, 7.0],
        [12, 13, 14],
        0,
        Point3::new(-3.0, -3.0, -3.5),
    )
    .unwrap();
    let field = test_field(grid.mesh);
    let gf = GridField::new(&grid, field.view()).unwrap();
    let pair = test_pair();
    let (floorl, topl) = (1, 3);

    let needed = 4 * (12 + 13 + 14) + 4 * 13 * 14 + 16 * 14;
    let mut arena = ScratchArena::new(needed);
    let mut out = vec![0.0; n_cart_triangle(floorl, topl)];
    numint_3d(&mut out, floorl, topl, &pair, 0.7, -60.0, &gf, &mut arena.carver()).unwrap();
    assert_eq!(arena.high_water_mark(), needed);

    let expected = brute_force(&grid, &field, &pair, 0.7, floorl, topl, 0);
    for (a, b) in out.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-10, epsilon = 1e-9);
    }
}

#[test]
fn test_numint_3d_periodic_matches_direct_sum() {
    let grid =
        UniformGrid::orthorhombic([4.0, 4.5, 5.0], [8, 9, 10], 3, Point3::new(-2.0, -2.0, -2.0))
            .unwrap();
    let field = test_field(grid.mesh);
    let gf = GridField::new(&grid, field.view()).unwrap();
    let pair = PrimitivePair {
        ai: 0.3,
        aj: 0.2,
        ..test_pair()
    };
    let (floorl, topl) = (0, 2);

    let mut arena = ScratchArena::new(3 * 27 + 3 * 90 + 9 * 10);
    let mut out = vec![0.0; n_cart_triangle(floorl, topl)];
    numint_3d(&mut out, floorl, topl, &pair, 1.0, -40.0, &gf, &mut arena.carver()).unwrap();

    let expected = brute_force(&grid, &field, &pair, 1.0, floorl, topl, 4);
    for (a, b) in out.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-9, epsilon = 1e-8);
    }
}

#[test]
fn test_numint_3d_mixed_periodicity_matches_direct_sum() {
    let grid =
        UniformGrid::orthorhombic([4.0, 8.0, 8.0], [10, 16, 16], 1, Point3::new(-2.0, -4.0, -4.0))
            .unwrap();
    let field = test_field(grid.mesh);
    let gf = GridField::new(&grid, field.view()).unwrap();
    let pair = PrimitivePair {
        ai: 0.7,
        aj: 0.6,
        ri: Point3::new(1.8, 0.2, -0.3),
        rj: Point3::new(1.5, -0.1, 0.4),
    };
    let (floorl, topl) = (1, 2);

    let mut arena = ScratchArena::new(3 * 42 + 3 * 256 + 9 * 16);
    let mut out = vec![0.0; n_cart_triangle(floorl, topl)];
    numint_3d(&mut out, floorl, topl, &pair, 1.0, -50.0, &gf, &mut arena.carver()).unwrap();

    let expected = brute_force(&grid, &field, &pair, 1.0, floorl, topl, 3);
    for (a, b) in out.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-9, epsilon = 1e-9);
    }
}

#[test]
fn test_numint_3d_rejects_nonorthogonal_lattice() {
    let grid = UniformGrid::builder()
        .lattice(Matrix3::new(4.0, 0.0, 0.0, 1.0, 4.0, 0.0, 0.0, 0.0, 4.0))
        .mesh([4, 4, 4])
        .dimension(3)
        .build()
        .unwrap();
    let field = Array3::<f64>::ones((4, 4, 4));
    let gf = GridField::new(&grid, field.view()).unwrap();
    let mut arena = ScratchArena::new(1000);
    let mut out = vec![0.0; 1];
    let err = numint_3d(&mut out, 0, 0, &test_pair(), 1.0, -20.0, &gf, &mut arena.carver())
        .unwrap_err();
    assert!(matches!(err, GridIntegralError::UnsupportedLattice(_)));
}

#[test]
fn test_numint_3d_reports_small_arena() {
    let grid = UniformGrid::orthorhombic([4.0, 4.0, 4.0], [4, 4, 4], 0, Point3::origin()).unwrap();
    let field = Array3::<f64>::ones((4, 4, 4));
    let gf = GridField::new(&grid, field.view()).unwrap();
    let mut arena = ScratchArena::new(10);
    let mut out = vec![0.0; 1];
    let err = numint_3d(&mut out, 0, 0, &test_pair(), 1.0, -20.0, &gf, &mut arena.carver())
        .unwrap_err();
    assert!(matches!(err, GridIntegralError::ScratchExhausted { .. }));
}

#[test]
fn test_grid_field_checks_shape_and_layout() {
    let grid = UniformGrid::orthorhombic([4.0, 4.0, 4.0], [4, 4, 5], 0, Point3::origin()).unwrap();
    let wrong = Array3::<f64>::ones((4, 5, 4));
    assert!(GridField::new(&grid, wrong.view()).is_err());
    let transposed = Array3::<f64>::ones((5, 4, 4));
    assert!(GridField::new(&grid, transposed.t()).is_err());
}
