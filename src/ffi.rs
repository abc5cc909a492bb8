/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Python FFI bindings via PyO3.
//!
//! Exposes the four computations and a k-means baseline as functions over nested lists of floats.
//! Each call runs in its own arena which is released before returning, so
//! nothing crosses the boundary but plain Python lists.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! import numpy as np
//! import symnmf_extension as ext
//!
//! points = [[0.0, 0.0], [1.0, 0.0], [5.0, 5.0], [5.5, 5.0]]
//! W = ext.norm(points)
//! k = 2
//! np.random.seed(1234)
//! m = np.mean(W)
//! H0 = np.random.uniform(0, 2 * np.sqrt(m / k), size=(len(points), k)).tolist()
//! H = ext.symnmf(H0, W, max_iterations=300, epsilon=1e-4)
//! labels = np.argmax(np.array(H), axis=1)
//! centroids, kmeans_labels = ext.kmeans(points, k)
//! ```

use pyo3::exceptions::{PyMemoryError, PyValueError};
use pyo3::prelude::*;

use crate::error::Error;
use crate::factorize::{FactorizeConfig, EPSILON, MAX_ITERATIONS};
use crate::kmeans::{KMeansConfig, CONVERGENCE_THRESHOLD};
use crate::pipeline::{
    degree_rows, factorize_rows, kmeans_rows, normalized_rows, similarity_rows,
};

fn to_py_err(err: Error) -> PyErr {
    if err.is_allocation_failure() {
        PyMemoryError::new_err(err.to_string())
    } else {
        PyValueError::new_err(err.to_string())
    }
}

// ── Functions ────────────────────────────────────────────────────────────────

/// Similarity matrix of a list of points.
///
/// Args:
///     points: n lists of d floats
///
/// Returns:
///     n × n list of lists, zero diagonal
#[pyfunction]
pub fn sym(points: Vec<Vec<f64>>) -> PyResult<Vec<Vec<f64>>> {
    similarity_rows(&points).map_err(to_py_err)
}

/// Degree vector (diagonal of the degree matrix) of a list of points.
#[pyfunction]
pub fn ddg(points: Vec<Vec<f64>>) -> PyResult<Vec<f64>> {
    degree_rows(&points).map_err(to_py_err)
}

/// Normalized similarity matrix of a list of points.
#[pyfunction]
pub fn norm(points: Vec<Vec<f64>>) -> PyResult<Vec<Vec<f64>>> {
    normalized_rows(&points).map_err(to_py_err)
}

/// Factorize a normalized similarity matrix from an initial association matrix.
///
/// Args:
///     h: n × k initial association matrix (non-negative)
///     w: n × n normalized similarity matrix
///     max_iterations: update cap (default 300)
///     epsilon: convergence threshold on the squared Frobenius step (default 1e-4)
///
/// Returns:
///     the final n × k association matrix
///
/// Raises:
///     ValueError: on empty or mismatched shapes, or invalid parameters
///     MemoryError: if working storage could not be allocated
#[pyfunction]
#[pyo3(signature = (h, w, max_iterations=MAX_ITERATIONS, epsilon=EPSILON))]
pub fn symnmf(
    h: Vec<Vec<f64>>,
    w: Vec<Vec<f64>>,
    max_iterations: usize,
    epsilon: f64,
) -> PyResult<Vec<Vec<f64>>> {
    let config = FactorizeConfig {
        max_iterations,
        epsilon,
    };
    factorize_rows(&h, &w, &config).map_err(to_py_err)
}

/// k-means with the first k points as initial centroids.
///
/// Args:
///     points: n lists of d floats
///     k: number of clusters, 1 <= k <= n
///     max_iterations: reassignment cap (default 300)
///     threshold: centroid movement below which a run converges (default 0.001)
///
/// Returns:
///     (centroids, labels): k lists of d floats and the cluster of every point
#[pyfunction]
#[pyo3(signature = (points, k, max_iterations=MAX_ITERATIONS, threshold=CONVERGENCE_THRESHOLD))]
pub fn kmeans(
    points: Vec<Vec<f64>>,
    k: usize,
    max_iterations: usize,
    threshold: f64,
) -> PyResult<(Vec<Vec<f64>>, Vec<usize>)> {
    let config = KMeansConfig {
        max_iterations,
        threshold,
    };
    kmeans_rows(&points, k, &config).map_err(to_py_err)
}

// ── Module entry point ────────────────────────────────────────────────────────

/// symNMF clustering primitives.
#[pymodule]
pub fn symnmf_extension(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(sym, m)?)?;
    m.add_function(wrap_pyfunction!(ddg, m)?)?;
    m.add_function(wrap_pyfunction!(norm, m)?)?;
    m.add_function(wrap_pyfunction!(symnmf, m)?)?;
    m.add_function(wrap_pyfunction!(kmeans, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
