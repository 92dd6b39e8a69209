//! Conversion between Cartesian monomials and real solid harmonics.

use factorial::Factorial;
use ndarray::Array2;

use crate::angmom::{binom, cart_index, n_cart};

#[cfg(test)]
#[path = "sh_conversion_tests.rs"]
mod sh_conversion_tests;

/// Factorial of `n` as a floating-point number.
fn factorial_f64(n: u32) -> f64 {
    u64::from(n)
        .checked_factorial()
        .map(|v| v as f64)
        .unwrap_or_else(|| (1..=n).map(f64::from).product())
}

/// Normalisation prefactor $`N_{lm}`$ of a real solid harmonic.
fn norm_rsh(l: u32, absm: u32) -> f64 {
    let delta = if absm == 0 { 2.0 } else { 1.0 };
    (2.0 * factorial_f64(l + absm) * factorial_f64(l - absm) / delta).sqrt()
        / (2.0f64.powi(absm as i32) * factorial_f64(l))
}

/// Obtains the matrix $`\mathbf{T}^{(l)}`$ expressing real solid harmonics of degree $`l`$ as
/// linear combinations of unnormalised Cartesian monomials of the same degree,
///
/// ```math
/// S_{lm}(\mathbf{r}) = \sum_{l_x + l_y + l_z = l} T^{(l)}_{m, (l_x l_y l_z)}\, x^{l_x} y^{l_y} z^{l_z},
/// ```
///
/// using the explicit expansion of Helgaker, T., Jørgensen, P. & Olsen, J. *Molecular
/// Electronic-Structure Theory* (Wiley, 2000), Equation 6.4.47,
///
/// ```math
/// S_{lm} = N_{lm} \sum_{t=0}^{\lfloor (l-|m|)/2 \rfloor} \sum_{u=0}^{t}
///     \sum_{v=v_m}^{\lfloor |m|/2 - v_m \rfloor + v_m}
///     C^{lm}_{tuv}\, x^{2t+|m|-2(u+v)} y^{2(u+v)} z^{l-2t-|m|},
/// ```
///
/// where $`v_m = 0`$ for $`m \ge 0`$ and $`v_m = 1/2`$ for $`m < 0`$. With this
/// normalisation $`\lVert S_{lm} R \rVert = \lVert x^l R \rVert`$ for any radial factor $`R`$, so
/// contraction coefficients that normalise the $`x^l`$ component of a shell also normalise its
/// pure components.
///
/// # Arguments
///
/// * `l` - The degree of the solid harmonics.
///
/// # Returns
///
/// The $`(2l+1) \times \frac{1}{2}(l+1)(l+2)`$ matrix $`\mathbf{T}^{(l)}`$. Rows are in
/// increasing-$`m`$ order and columns in lexicographic Cartesian order.
pub fn sh_cart2r_mat(l: u32) -> Array2<f64> {
    let mut tmat = Array2::<f64>::zeros((2 * l as usize + 1, n_cart(l)));
    let li = l as i32;
    for m in -li..=li {
        let absm = m.unsigned_abs();
        let row = (m + li) as usize;
        let nlm = norm_rsh(l, absm);
        // 2v runs over odd values for m < 0 and even values otherwise.
        let (v2_start, nv) = if m < 0 {
            (1, (absm - 1) / 2 + 1)
        } else {
            (0, absm / 2 + 1)
        };
        for t in 0..=((l - absm) / 2) {
            let ct = 0.25f64.powi(t as i32) * binom(l, t) * binom(l - t, absm + t);
            for u in 0..=t {
                for k in 0..nv {
                    let v2 = v2_start + 2 * k;
                    let sign = if (t + k) % 2 == 0 { 1.0 } else { -1.0 };
                    let c = sign * ct * binom(t, u) * binom(absm, v2);
                    if c == 0.0 {
                        continue;
                    }
                    let lx = 2 * t + absm - 2 * u - v2;
                    let ly = 2 * u + v2;
                    let lz = l - 2 * t - absm;
                    tmat[(row, cart_index(lx, ly, lz))] += nlm * c;
                }
            }
        }
    }
    tmat
}
