/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Symmetrically normalized similarity `W = D^{-1/2}·A·D^{-1/2}`.
//!
//! `W[i][j] = A[i][j] / sqrt(dᵢ·dⱼ)` for `i ≠ j`, `W[i][i] = 0`.
//!
//! A zero degree is not guarded: the affected row and column become
//! non-finite and stay that way through every later stage. It is logged.

use tracing::{debug, warn};

use crate::arena::Arena;
use crate::error::Result;
use crate::matrix::{Matrix, Vector};

/// Normalize a similarity matrix by its degree vector. O(n²).
pub fn normalize(arena: &mut Arena, similarity: Matrix, degree: Vector) -> Result<Matrix> {
    let n = arena.rows(similarity);
    debug_assert_eq!(arena.vector(degree).len(), n);
    debug!(n, "building normalized similarity matrix");

    let isolated = arena.vector(degree).iter().filter(|&&d| d == 0.0).count();
    if isolated > 0 && n > 1 {
        warn!(isolated, "zero-degree points, normalized matrix will contain non-finite values");
    }

    let norm = arena.alloc_matrix(n, n)?;
    for i in 0..n {
        arena.with_row_mut(norm, i, |arena, row| {
            let deg = arena.vector(degree);
            let sim = arena.row(similarity, i);
            for j in 0..i {
                row[j] = arena.get(norm, j, i);
            }
            row[i] = 0.0;
            for j in (i + 1)..n {
                row[j] = sim[j] / (deg[i] * deg[j]).sqrt();
            }
        });
    }
    Ok(norm)
}
