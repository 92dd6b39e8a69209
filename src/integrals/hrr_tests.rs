use approx::assert_relative_eq;
use nalgebra::Vector3;

use crate::angmom::{cart_triangle, cart_tuples, n_cart, n_cart_triangle};
use crate::integrals::hrr::hrr_2d;

/// Moments of the monomial weight $`x^a y^b z^c \mapsto m_x(a) m_y(b) m_z(c)`$ for a separable toy
/// measure whose one-dimensional moments are known in closed form.
fn moment_1d(order: u32, shift: f64) -> f64 {
    // Measure: point masses 1 at t = 1 and 2 at t = -0.5, measured from `shift`.
    (1.0 - shift).powi(order as i32) + 2.0 * (-0.5 - shift).powi(order as i32)
}

#[test]
fn test_hrr_2d_matches_direct_moments() {
    let ri = [0.2, -0.1, 0.4];
    let rj = [-0.3, 0.5, 0.1];
    let rirj = Vector3::new(ri[0] - rj[0], ri[1] - rj[1], ri[2] - rj[2]);
    for li in 0..=2 {
        for lj in 0..=2 {
            let g: Vec<f64> = cart_triangle(li, li + lj)
                .map(|(x, y, z)| {
                    moment_1d(x, ri[0]) * moment_1d(y, ri[1]) * moment_1d(z, ri[2])
                })
                .collect();
            assert_eq!(g.len(), n_cart_triangle(li, li + lj));
            let nfi = n_cart(li);
            let mut out = vec![0.0; nfi * n_cart(lj)];
            hrr_2d(&mut out, &g, li, lj, &rirj, &mut vec![0.0; 3 * (lj as usize + 1)]);

            for (cj, (jx, jy, jz)) in cart_tuples(lj).enumerate() {
                for (ci, (ix, iy, iz)) in cart_tuples(li).enumerate() {
                    // Product of (t - ri)^i (t - rj)^j over the same toy measure.
                    let axis = |a: usize, i: u32, j: u32| {
                        [(1.0, 1.0), (-0.5, 2.0)]
                            .iter()
                            .map(|(t, w)| {
                                w * (t - ri[a]).powi(i as i32) * (t - rj[a]).powi(j as i32)
                            })
                            .sum::<f64>()
                    };
                    let expected = axis(0, ix, jx) * axis(1, iy, jy) * axis(2, iz, jz);
                    assert_relative_eq!(
                        out[cj * nfi + ci],
                        expected,
                        max_relative = 1e-12,
                        epsilon = 1e-14
                    );
                }
            }
        }
    }
}

#[test]
fn test_hrr_2d_same_centre_is_a_copy() {
    let (li, lj) = (1, 1);
    let g: Vec<f64> = (0..n_cart_triangle(li, li + lj)).map(|i| i as f64 + 1.0).collect();
    let mut out = vec![0.0; 9];
    hrr_2d(&mut out, &g, li, lj, &Vector3::zeros(), &mut [0.0; 6]);
    // (x|y) picks out g[xy], the second d component, at triangle offset 3 + 1.
    assert_eq!(out[3], g[4]);
    // (z|z) picks out g[zz].
    assert_eq!(out[8], g[8]);
}
