//! The missing-value convention shared by every kernel.
//!
//! A scalar is valid iff it is `>= 0`; anything else is a sentinel for
//! "missing" (suited to non-negative count and genotype data). NaN fails
//! the comparison and is therefore missing as well. A pair of positions
//! contributes to a statistic only when both sides are valid.

use crate::element::Element;

/// Returns `true` if `v` is an observation rather than a missing sentinel.
#[inline]
pub fn is_valid<T: Element>(v: T) -> bool {
    v.to_f64() >= 0.0
}

/// Returns `true` if `v` is a missing sentinel.
#[inline]
pub fn is_missing<T: Element>(v: T) -> bool {
    !is_valid(v)
}

/// Iterates the pairs `(x[i], y[i])` where both entries are valid, widened to `f64`.
///
/// Stops at the shorter of the two slices.
pub fn valid_pairs<'a, T: Element>(
    x: &'a [T],
    y: &'a [T],
) -> impl Iterator<Item = (f64, f64)> + 'a {
    x.iter()
        .zip(y)
        .filter(|&(&a, &b)| is_valid(a) && is_valid(b))
        .map(|(&a, &b)| (a.to_f64(), b.to_f64()))
}

/// Number of positions where both `x` and `y` are valid.
pub fn count_valid<T: Element>(x: &[T], y: &[T]) -> usize {
    valid_pairs(x, y).count()
}
