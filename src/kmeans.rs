/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Lloyd's k-means, the baseline symNMF clusterings are compared against.
//!
//! # Algorithm
//!
//! 1. The first `k` points seed the `k` centroids and belong to their own
//!    clusters; every later point joins its nearest seed.
//! 2. Centroids move to the mean of their members.
//! 3. Every point is reassigned to its nearest centroid, then step 2 runs
//!    again. This repeats until no centroid moves by `threshold` or more
//!    (Euclidean distance), or `max_iterations` passes have run.
//!
//! Nearest-centroid ties go to the lowest index. A cluster that loses all
//! of its members keeps its previous centroid.
//!
//! # Invariants
//!
//! - Centroids, their previous positions and member counts all live in the
//!   arena; an allocation failure rolls back like any other stage.
//! - `labels[i] < k` for every point.

use tracing::{debug, trace};

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::factorize::MAX_ITERATIONS;
use crate::matrix::{Matrix, Vector};
use crate::ops::{copy_rows, squared_distance};

/// Centroid movement below which a cluster counts as converged.
pub const CONVERGENCE_THRESHOLD: f64 = 0.001;

// ─── KMeansConfig ───────────────────────────────────────────────────────────

/// Stopping rule for [`kmeans`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KMeansConfig {
    /// Cap on reassignment passes after initialisation. Default: 300.
    pub max_iterations: usize,
    /// Every centroid must move less than this for the run to converge.
    /// Default: 0.001.
    pub threshold: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            threshold: CONVERGENCE_THRESHOLD,
        }
    }
}

impl KMeansConfig {
    /// Reject configurations the loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidArgument(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "threshold must be finite and positive, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

// ─── Clustering ─────────────────────────────────────────────────────────────

/// Outcome of [`kmeans`].
#[derive(Clone, Debug, PartialEq)]
pub struct Clustering {
    /// `k × d` centroids, in the arena.
    pub centroids: Matrix,
    /// Cluster index of every point.
    pub labels: Vec<usize>,
    /// Reassignment passes performed.
    pub iterations: usize,
    /// Whether every centroid settled below the threshold.
    pub converged: bool,
}

/// Cluster the `n × d` points into `k` groups. `k` must be in `1..=n`.
pub fn kmeans(
    arena: &mut Arena,
    points: Matrix,
    k: usize,
    config: &KMeansConfig,
) -> Result<Clustering> {
    config.validate()?;
    let (n, d) = arena.shape(points);
    if k == 0 || k > n {
        return Err(Error::InvalidArgument(format!(
            "number of clusters must be between 1 and {n}, got {k}"
        )));
    }
    debug!(n, d, k, max_iterations = config.max_iterations, "starting k-means");

    let centroids = arena.alloc_matrix(k, d)?;
    let previous = arena.alloc_matrix(k, d)?;
    let counts = arena.alloc_vector(k)?;
    for c in 0..k {
        arena.with_row_mut(centroids, c, |arena, row| {
            row.copy_from_slice(arena.row(points, c))
        });
    }

    let mut labels: Vec<usize> = (0..n)
        .map(|i| if i < k { i } else { nearest(arena, centroids, arena.row(points, i)) })
        .collect();
    let state = Centroids {
        points,
        centroids,
        previous,
        counts,
    };
    state.update(arena, &labels, config.threshold);

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iterations && !converged {
        for (i, label) in labels.iter_mut().enumerate() {
            *label = nearest(arena, centroids, arena.row(points, i));
        }
        converged = state.update(arena, &labels, config.threshold);
        iterations += 1;
        trace!(iteration = iterations, converged, "k-means pass");
    }
    debug!(iterations, converged, "k-means finished");

    Ok(Clustering {
        centroids,
        labels,
        iterations,
        converged,
    })
}

/// Index of the centroid closest to `point`; ties go to the lowest index.
fn nearest(arena: &Arena, centroids: Matrix, point: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for c in 0..arena.rows(centroids) {
        let distance = squared_distance(arena.row(centroids, c), point);
        if distance < best_distance {
            best = c;
            best_distance = distance;
        }
    }
    best
}

struct Centroids {
    points: Matrix,
    centroids: Matrix,
    previous: Matrix,
    counts: Vector,
}

impl Centroids {
    /// Move every centroid to its members' mean. Returns whether all of
    /// them moved less than `threshold`.
    fn update(&self, arena: &mut Arena, labels: &[usize], threshold: f64) -> bool {
        let k = arena.rows(self.centroids);
        copy_rows(arena, self.centroids, self.previous);
        arena.vector_mut(self.counts).fill(0.0);
        for c in 0..k {
            arena.row_mut(self.centroids, c).fill(0.0);
        }

        for (i, &c) in labels.iter().enumerate() {
            arena.vector_mut(self.counts)[c] += 1.0;
            arena.with_row_mut(self.centroids, c, |arena, sum| {
                for (acc, &x) in sum.iter_mut().zip(arena.row(self.points, i)) {
                    *acc += x;
                }
            });
        }

        let mut settled = true;
        for c in 0..k {
            let count = arena.vector(self.counts)[c];
            arena.with_row_mut(self.centroids, c, |arena, centroid| {
                if count == 0.0 {
                    centroid.copy_from_slice(arena.row(self.previous, c));
                } else {
                    centroid.iter_mut().for_each(|v| *v /= count);
                }
            });
            let moved =
                squared_distance(arena.row(self.centroids, c), arena.row(self.previous, c)).sqrt();
            if !(moved < threshold) {
                settled = false;
            }
        }
        settled
    }
}
