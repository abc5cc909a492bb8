/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Diagonal degree vector: `dᵢ = Σⱼ A[i][j]`.

use tracing::debug;

use crate::arena::Arena;
use crate::error::Result;
use crate::matrix::{Matrix, Vector};

/// Row sums of a similarity matrix. O(n²).
///
/// The result is the diagonal of the degree matrix; see
/// [`crate::report::write_diagonal`] for its full-matrix rendering.
pub fn degree(arena: &mut Arena, similarity: Matrix) -> Result<Vector> {
    let n = arena.rows(similarity);
    debug!(n, "building degree vector");
    let deg = arena.alloc_vector(n)?;
    for i in 0..n {
        let sum: f64 = arena.row(similarity, i).iter().sum();
        arena.vector_mut(deg)[i] = sum;
    }
    Ok(deg)
}
