//! Support-radius estimation for Gaussian products.

#[cfg(test)]
#[path = "rcut_tests.rs"]
mod rcut_tests;

/// Extra orders of magnitude (in natural-log units) demanded on top of the requested precision
/// to absorb contraction coefficients and integral prefactors.
pub const RCUT_LOG_MARGIN: f64 = 7.0;

/// Estimates the radius beyond which $`c \exp(-\alpha r^2)`$ drops below the precision target.
///
/// The radius solves $`\ln\lvert c \rvert - \alpha r^2 = \epsilon - 7`$, where $`\epsilon`$ is
/// `log_prec`, and is exactly zero whenever the left-hand side never reaches the target, which
/// includes $`c = 0`$.
///
/// # Arguments
///
/// * `alpha` - The exponent $`\alpha > 0`$ of the Gaussian product.
/// * `_l` - The total angular momentum of the product. The single-dominant-term bound used here
/// does not depend on it.
/// * `c` - The prefactor of the product.
/// * `log_prec` - The natural logarithm of the requested precision.
///
/// # Returns
///
/// The support radius, non-negative.
pub fn gto_rcut(alpha: f64, _l: u32, c: f64, log_prec: f64) -> f64 {
    let excess = c.abs().ln() - (log_prec - RCUT_LOG_MARGIN);
    if excess > 0.0 {
        (excess / alpha).sqrt()
    } else {
        0.0
    }
}
