//! Angular momentum bookkeeping and conversion.
//!
//! Cartesian components of a given total degree $`l`$ are always enumerated in lexicographic
//! order: $`l_x`$ descending, then $`l_y`$ descending, with $`l_z = l - l_x - l_y`$. For
//! $`l = 2`$ this gives $`xx, xy, xz, yy, yz, zz`$.

pub mod sh_conversion;


/// Alphabetical labels of angular momenta.
pub static ANGMOM_LABELS: [&str; 7] = ["S", "P", "D", "F", "G", "H", "I"];

/// Returns the label of angular momentum `l`, falling back to `L=<l>` beyond the tabulated range.
pub fn angmom_label(l: u32) -> String {
    ANGMOM_LABELS
        .get(l as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("L={l}"))
}

/// Number of Cartesian components of total degree `l`.
#[inline]
pub fn n_cart(l: u32) -> usize {
    let l = l as usize;
    (l + 1) * (l + 2) / 2
}

/// Number of Cartesian components of all total degrees up to and including `l`.
#[inline]
pub fn cum_n_cart(l: u32) -> usize {
    let l = l as usize;
    (l + 1) * (l + 2) * (l + 3) / 6
}

/// Number of Cartesian components with total degree in `floorl..=topl`.
#[inline]
pub fn n_cart_triangle(floorl: u32, topl: u32) -> usize {
    debug_assert!(floorl <= topl);
    let below = if floorl == 0 { 0 } else { cum_n_cart(floorl - 1) };
    cum_n_cart(topl) - below
}

/// Position of the component $`(l_x, l_y, l_z)`$ among all components of the same total degree.
#[inline]
pub fn cart_index(lx: u32, ly: u32, lz: u32) -> usize {
    let l = (lx + ly + lz) as usize;
    let dx = l - lx as usize;
    dx * (dx + 1) / 2 + lz as usize
}

/// Position of the component $`(l_x, l_y, l_z)`$ within a triangle whose lowest total degree is
/// `floorl`.
#[inline]
pub fn triangle_index(floorl: u32, lx: u32, ly: u32, lz: u32) -> usize {
    let l = lx + ly + lz;
    debug_assert!(l >= floorl);
    n_cart_triangle(floorl, l) - n_cart(l) + cart_index(lx, ly, lz)
}

/// Iterates over the Cartesian components of total degree `l` in lexicographic order.
pub fn cart_tuples(l: u32) -> impl Iterator<Item = (u32, u32, u32)> {
    (0..=l)
        .rev()
        .flat_map(move |lx| (0..=(l - lx)).rev().map(move |ly| (lx, ly, l - lx - ly)))
}

/// Iterates over the components of all total degrees in `floorl..=topl`, degree by degree.
pub fn cart_triangle(floorl: u32, topl: u32) -> impl Iterator<Item = (u32, u32, u32)> {
    (floorl..=topl).flat_map(cart_tuples)
}

/// Binomial coefficient $`\binom{n}{k}`$ as a floating-point number.
pub(crate) fn binom(n: u32, k: u32) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * f64::from(n - i) / f64::from(i + 1))
}

/// Writes the integer powers $`x^0, x^1, \ldots`$ of `x` into `out`.
pub(crate) fn fill_powers(out: &mut [f64], x: f64) {
    let mut p = 1.0;
    for v in out.iter_mut() {
        *v = p;
        p *= x;
    }
}
