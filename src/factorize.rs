/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! symNMF multiplicative-update loop.
//!
//! Minimises `‖W − H·Hᵗ‖²_F` over non-negative `H` with the damped update
//!
//! ```text
//! H'[i][j] = H[i][j] · (½ + ½ · (W·H)[i][j] / (H·Hᵗ·H)[i][j])
//! ```
//!
//! `(H·Hᵗ·H)` is evaluated as `H·G` with `G = Hᵗ·H` formed once per
//! iteration, which is O(n·k²) instead of the O(n²·k) per element of the
//! direct triple sum ([`crate::ops::hht_h_element`]).
//!
//! # Termination
//!
//! - **Converged**: `‖H' − H‖²_F < epsilon`; `H'` is returned.
//! - **Iteration limit**: after `max_iterations` updates the last `H'` is
//!   returned. This is not an error.
//!
//! Zero denominators are not guarded. A non-finite iterate never satisfies
//! the convergence test, so the loop runs to the limit and returns it.

use std::mem;

use tracing::{debug, trace, warn};

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::ops::{copy_rows, gram, inner_product, squared_frobenius_norm_of_difference};

/// Default iteration cap.
pub const MAX_ITERATIONS: usize = 300;

/// Default convergence threshold on `‖H' − H‖²_F`.
pub const EPSILON: f64 = 1e-4;

// ─── FactorizeConfig ────────────────────────────────────────────────────────

/// Stopping rule for [`factorize`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FactorizeConfig {
    /// Hard cap on update steps. Default: 300.
    pub max_iterations: usize,
    /// Convergence threshold on the squared Frobenius norm of successive
    /// iterates' difference. Default: 0.0001.
    pub epsilon: f64,
}

impl Default for FactorizeConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            epsilon: EPSILON,
        }
    }
}

impl FactorizeConfig {
    /// Reject configurations the loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidArgument(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "epsilon must be finite and positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

// ─── Factorization ──────────────────────────────────────────────────────────

/// Outcome of [`factorize`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Factorization {
    /// Final association matrix, same shape as the initial `H`.
    pub matrix: Matrix,
    /// Update steps performed.
    pub iterations: usize,
    /// Whether the convergence threshold was met.
    pub converged: bool,
    /// `‖H' − H‖²_F` of the last step.
    pub last_delta: f64,
}

/// One multiplicative update of `h` into `out`.
///
/// `gram_scratch` must be `k × k` and is overwritten with `Hᵗ·H`. `w` must be
/// `n × n`, `h` and `out` `n × k`, and `out` distinct from `h`.
pub fn update_step(arena: &mut Arena, h: Matrix, w: Matrix, gram_scratch: Matrix, out: Matrix) {
    gram(arena, h, gram_scratch);
    let (n, k) = arena.shape(h);
    for i in 0..n {
        arena.with_row_mut(out, i, |arena, row| {
            // (W·H)[i][·], accumulated over p in order.
            row.fill(0.0);
            for (p, &wip) in arena.row(w, i).iter().enumerate() {
                for (acc, &x) in row.iter_mut().zip(arena.row(h, p)) {
                    *acc += wip * x;
                }
            }
            let hi = arena.row(h, i);
            for j in 0..k {
                // G is symmetric, so row j is column j.
                let denominator = inner_product(hi, arena.row(gram_scratch, j));
                row[j] = hi[j] * (0.5 + 0.5 * (row[j] / denominator));
            }
        });
    }
}

/// Iterate the update rule from `h0` against the normalized similarity `w`.
///
/// `h0` is left untouched. Working storage (two `n × k` iterates and the
/// `k × k` Gram scratch) is allocated once, up front.
pub fn factorize(
    arena: &mut Arena,
    h0: Matrix,
    w: Matrix,
    config: &FactorizeConfig,
) -> Result<Factorization> {
    config.validate()?;
    let (n, k) = arena.shape(h0);
    debug_assert_eq!(arena.shape(w), (n, n));
    debug!(
        n,
        k,
        max_iterations = config.max_iterations,
        epsilon = config.epsilon,
        "starting multiplicative updates"
    );

    let mut current = arena.alloc_matrix(n, k)?;
    let mut next = arena.alloc_matrix(n, k)?;
    let g = arena.alloc_matrix(k, k)?;
    copy_rows(arena, h0, current);

    let mut delta = f64::INFINITY;
    let mut warned = false;
    for iteration in 1..=config.max_iterations {
        update_step(arena, current, w, g, next);
        delta = squared_frobenius_norm_of_difference(arena, next, current);
        trace!(iteration, delta, "update step");

        if !delta.is_finite() && !warned {
            warn!(iteration, "non-finite iterate, values will propagate to the result");
            warned = true;
        }
        if delta < config.epsilon {
            debug!(iterations = iteration, delta, "converged");
            return Ok(Factorization {
                matrix: next,
                iterations: iteration,
                converged: true,
                last_delta: delta,
            });
        }
        if iteration < config.max_iterations {
            mem::swap(&mut current, &mut next);
        }
    }

    debug!(iterations = config.max_iterations, delta, "iteration limit reached");
    Ok(Factorization {
        matrix: next,
        iterations: config.max_iterations,
        converged: false,
        last_delta: delta,
    })
}

/// Hard cluster assignment: index of the largest entry of each row of `h`.
///
/// Ties go to the lowest column. A NaN entry never beats a number, and an
/// all-NaN row is assigned to column 0.
pub fn assign_clusters(arena: &Arena, h: Matrix) -> Vec<usize> {
    (0..arena.rows(h))
        .map(|i| {
            let row = arena.row(h, i);
            let mut best = 0;
            for (j, &value) in row.iter().enumerate().skip(1) {
                if value > row[best] || (row[best].is_nan() && !value.is_nan()) {
                    best = j;
                }
            }
            best
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two(arena: &mut Arena) -> (Matrix, Matrix) {
        let h0 = arena.matrix_from_rows(&[vec![1.0], vec![1.0]]).unwrap();
        let w = arena
            .matrix_from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]])
            .unwrap();
        (h0, w)
    }

    #[test]
    fn test_single_update_matches_closed_form() {
        // W·H = [1, 1]ᵗ, H·Hᵗ·H = [2, 2]ᵗ → 1 · (½ + ½ · ½) = 0.75
        let mut arena = Arena::new();
        let (h0, w) = two_by_two(&mut arena);
        let g = arena.alloc_matrix(1, 1).unwrap();
        let out = arena.alloc_matrix(2, 1).unwrap();
        update_step(&mut arena, h0, w, g, out);
        assert_eq!(arena.get(g, 0, 0), 2.0);
        assert_eq!(arena.export_rows(out), vec![vec![0.75], vec![0.75]]);
    }

    #[test]
    fn test_loop_converges_to_fixed_point() {
        // Fixed point: h = 2h³ → h = 1/√2.
        let mut arena = Arena::new();
        let (h0, w) = two_by_two(&mut arena);
        let result = factorize(&mut arena, h0, w, &FactorizeConfig::default()).unwrap();
        assert!(result.converged);
        assert!(result.last_delta < EPSILON);
        assert!(result.iterations < MAX_ITERATIONS);
        for i in 0..2 {
            assert!((arena.get(result.matrix, i, 0) - 0.5f64.sqrt()).abs() < 0.01);
        }
        assert_eq!(arena.export_rows(h0), vec![vec![1.0], vec![1.0]], "h0 untouched");
    }

    #[test]
    fn test_iteration_limit_is_not_an_error() {
        let mut arena = Arena::new();
        let (h0, w) = two_by_two(&mut arena);
        let config = FactorizeConfig {
            max_iterations: 1,
            epsilon: 1e-30,
        };
        let result = factorize(&mut arena, h0, w, &config).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(arena.export_rows(result.matrix), vec![vec![0.75], vec![0.75]]);
        assert_eq!(result.last_delta, 0.125);
    }

    #[test]
    fn test_zero_initial_matrix_propagates_nan() {
        let mut arena = Arena::new();
        let h0 = arena.alloc_matrix(2, 1).unwrap();
        let w = arena
            .matrix_from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]])
            .unwrap();
        let result = factorize(&mut arena, h0, w, &FactorizeConfig::default()).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, MAX_ITERATIONS);
        assert!(arena.get(result.matrix, 0, 0).is_nan());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut arena = Arena::new();
        let (h0, w) = two_by_two(&mut arena);
        let zero_iters = FactorizeConfig {
            max_iterations: 0,
            ..FactorizeConfig::default()
        };
        assert!(matches!(
            factorize(&mut arena, h0, w, &zero_iters),
            Err(Error::InvalidArgument(_))
        ));
        let bad_eps = FactorizeConfig {
            epsilon: f64::NAN,
            ..FactorizeConfig::default()
        };
        assert!(bad_eps.validate().is_err());
    }

    #[test]
    fn test_assign_clusters_argmax() {
        let mut arena = Arena::new();
        let h = arena
            .matrix_from_rows(&[
                vec![0.9, 0.1],
                vec![0.2, 0.8],
                vec![0.5, 0.5],
                vec![f64::NAN, 0.3],
            ])
            .unwrap();
        assert_eq!(assign_clusters(&arena, h), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_assign_clusters_all_nan_row_goes_to_first_column() {
        let mut arena = Arena::new();
        let h = arena
            .matrix_from_rows(&[
                vec![f64::NAN, f64::NAN, f64::NAN],
                vec![f64::NAN, f64::NAN, 0.1],
                vec![0.4, f64::NAN, f64::NAN],
            ])
            .unwrap();
        assert_eq!(assign_clusters(&arena, h), vec![0, 2, 0]);
    }
}
