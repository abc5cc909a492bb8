/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Numeric primitives shared by the pipeline stages.
//!
//! Shape agreement between arguments is a caller precondition; it is only
//! checked in debug builds.

use crate::arena::Arena;
use crate::matrix::Matrix;

/// Dot product of two equal-length slices.
#[inline]
pub fn inner_product(u: &[f64], v: &[f64]) -> f64 {
    debug_assert_eq!(u.len(), v.len());
    u.iter().zip(v).map(|(a, b)| a * b).sum()
}

/// Squared Euclidean distance `‖u − v‖²`.
#[inline]
pub fn squared_distance(u: &[f64], v: &[f64]) -> f64 {
    debug_assert_eq!(u.len(), v.len());
    u.iter()
        .zip(v)
        .map(|(a, b)| {
            let d = a - b;
            d * d
        })
        .sum()
}

/// Gaussian kernel `exp(-½‖u − v‖²)`.
#[inline]
pub fn gaussian_similarity(u: &[f64], v: &[f64]) -> f64 {
    (-0.5 * squared_distance(u, v)).exp()
}

/// `Σ_{i,j} (A[i][j] − B[i][j])²` over two matrices of the same shape.
pub fn squared_frobenius_norm_of_difference(arena: &Arena, a: Matrix, b: Matrix) -> f64 {
    debug_assert_eq!(arena.shape(a), arena.shape(b));
    (0..arena.rows(a))
        .map(|i| squared_distance(arena.row(a, i), arena.row(b, i)))
        .sum()
}

/// Copy every row of `src` into `dst`. Shapes must match.
pub fn copy_rows(arena: &mut Arena, src: Matrix, dst: Matrix) {
    debug_assert_eq!(arena.shape(src), arena.shape(dst));
    for i in 0..arena.rows(src) {
        arena.with_row_mut(dst, i, |arena, out| out.copy_from_slice(arena.row(src, i)));
    }
}

/// Gram matrix `G = Hᵗ·H` written into the `k × k` matrix `g`.
pub fn gram(arena: &mut Arena, h: Matrix, g: Matrix) {
    let (n, k) = arena.shape(h);
    debug_assert_eq!(arena.shape(g), (k, k));
    for a in 0..k {
        arena.with_row_mut(g, a, |arena, out| {
            out.fill(0.0);
            for p in 0..n {
                let hp = arena.row(h, p);
                let scale = hp[a];
                for (dst, &x) in out.iter_mut().zip(hp) {
                    *dst += scale * x;
                }
            }
        });
    }
}

/// `(H·Hᵗ·H)[i][j]` as the direct triple sum `Σ_{p,q} H[i][q]·H[p][q]·H[p][j]`.
///
/// O(n·k) per element. The factorization loop uses [`gram`] instead; this is
/// the reference it must agree with.
pub fn hht_h_element(arena: &Arena, h: Matrix, i: usize, j: usize) -> f64 {
    let hi = arena.row(h, i);
    (0..arena.rows(h))
        .map(|p| {
            let hp = arena.row(h, p);
            inner_product(hi, hp) * hp[j]
        })
        .sum()
}
