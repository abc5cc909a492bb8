/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Gaussian-kernel similarity matrix.
//!
//! `A[i][j] = exp(-½‖xᵢ − xⱼ‖²)` for `i ≠ j`, `A[i][i] = 0`.
//!
//! Only the upper triangle is evaluated; the lower triangle is mirrored from
//! rows already written, so the result is exactly symmetric.

use tracing::debug;

use crate::arena::Arena;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::ops::gaussian_similarity;

/// Build the `n × n` similarity matrix of an `n × d` points matrix. O(n²d).
pub fn similarity(arena: &mut Arena, points: Matrix) -> Result<Matrix> {
    let (n, d) = arena.shape(points);
    debug!(n, d, "building similarity matrix");
    let sim = arena.alloc_matrix(n, n)?;

    for i in 0..n {
        arena.with_row_mut(sim, i, |arena, row| {
            let xi = arena.row(points, i);
            for j in 0..i {
                row[j] = arena.get(sim, j, i);
            }
            row[i] = 0.0;
            for j in (i + 1)..n {
                row[j] = gaussian_similarity(xi, arena.row(points, j));
            }
        });
    }
    Ok(sim)
}
