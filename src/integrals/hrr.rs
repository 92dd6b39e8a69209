//! Horizontal transfer of angular momentum between the two centres of a shell pair.
//!
//! Moments are tabulated about the first centre $`\mathbf{R}_i`$ only. Writing
//! $`x - x_j = (x - x_i) + (x_i - x_j)`$ and expanding binomially gives
//!
//! ```math
//! (\mathbf{i} \vert \mathbf{j}) = \sum_{\mathbf{k} \le \mathbf{j}}
//!     \binom{j_x}{k_x} \binom{j_y}{k_y} \binom{j_z}{k_z}
//!     (\mathbf{R}_i - \mathbf{R}_j)^{\mathbf{j} - \mathbf{k}} \, g_{\mathbf{i} + \mathbf{k}},
//! ```
//!
//! where $`g`$ is the triangle of moments with total degree between $`l_i`$ and $`l_i + l_j`$.

use itertools::Itertools;
use nalgebra::Vector3;

use crate::angmom::{binom, cart_tuples, fill_powers, n_cart, n_cart_triangle, triangle_index};

#[cfg(test)]
#[path = "hrr_tests.rs"]
mod hrr_tests;

/// Transfers the moment triangle `g` into a Cartesian shell-pair block.
///
/// # Arguments
///
/// * `out` - The $`n_{f_i} \times n_{f_j}`$ block in column-major order, the component of the
/// first shell running fastest.
/// * `g` - The moments about $`\mathbf{R}_i`$ with total degree in `li..=li + lj`.
/// * `rirj` - The displacement $`\mathbf{R}_i - \mathbf{R}_j`$.
/// * `pw` - Scratch for the displacement powers, of length $`3 (l_j + 1)`$.
pub fn hrr_2d(
    out: &mut [f64],
    g: &[f64],
    li: u32,
    lj: u32,
    rirj: &Vector3<f64>,
    pw: &mut [f64],
) {
    let nfi = n_cart(li);
    let l1 = lj as usize + 1;
    debug_assert_eq!(out.len(), nfi * n_cart(lj));
    debug_assert_eq!(g.len(), n_cart_triangle(li, li + lj));
    debug_assert_eq!(pw.len(), 3 * l1);

    for (k, pw_k) in pw.chunks_exact_mut(l1).enumerate() {
        fill_powers(pw_k, rirj[k]);
    }
    for (cj, (jx, jy, jz)) in cart_tuples(lj).enumerate() {
        for (ci, (ix, iy, iz)) in cart_tuples(li).enumerate() {
            out[cj * nfi + ci] = (0..=jx)
                .cartesian_product(0..=jy)
                .cartesian_product(0..=jz)
                .map(|((kx, ky), kz)| {
                    binom(jx, kx)
                        * binom(jy, ky)
                        * binom(jz, kz)
                        * pw[(jx - kx) as usize]
                        * pw[l1 + (jy - ky) as usize]
                        * pw[2 * l1 + (jz - kz) as usize]
                        * g[triangle_index(li, ix + kx, iy + ky, iz + kz)]
                })
                .sum();
        }
    }
}
