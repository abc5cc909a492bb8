/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Random initial association matrix.
//!
//! Entries are drawn uniformly from `[0, 2·sqrt(m / k))` where `m` is the
//! mean entry of the normalized similarity matrix `W`. The generator is
//! supplied by the caller, so a seeded [`rand::rngs::StdRng`] makes whole
//! runs reproducible.

use rand::Rng;
use tracing::debug;

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Default seed used by [`crate::pipeline::PipelineConfig`].
pub const DEFAULT_SEED: u64 = 1234;

/// Mean of every entry of a matrix. Zero for an empty matrix.
pub fn matrix_mean(arena: &Arena, m: Matrix) -> f64 {
    let (rows, columns) = arena.shape(m);
    let count = rows * columns;
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = (0..rows).map(|i| arena.row(m, i).iter().sum::<f64>()).sum();
    sum / count as f64
}

/// Draw an `n × k` initial `H` for the `n × n` matrix `w`.
pub fn initial_association<R: Rng + ?Sized>(
    arena: &mut Arena,
    w: Matrix,
    k: usize,
    rng: &mut R,
) -> Result<Matrix> {
    if k == 0 {
        return Err(Error::InvalidArgument("number of clusters must be at least 1".into()));
    }
    let n = arena.rows(w);
    // A non-finite mean (degenerate W) is passed through, not rejected.
    let upper = 2.0 * (matrix_mean(arena, w) / k as f64).sqrt();
    debug!(n, k, upper, "drawing initial association matrix");

    let h = arena.alloc_matrix(n, k)?;
    for i in 0..n {
        for value in arena.row_mut(h, i) {
            *value = rng.gen::<f64>() * upper;
        }
    }
    Ok(h)
}
