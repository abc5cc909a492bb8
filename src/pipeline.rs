/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Goal dispatch over a single arena.
//!
//! ```text
//! points ─► similarity ─► degree ─► normalize ─► initial H ─► factorize
//!   sym ───────┘            │           │                        │
//!   ddg ────────────────────┘           │                        │
//!   norm ───────────────────────────────┘                        │
//!   symnmf ──────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Pipeline`] owns the arena for one logical run. Every stage allocates
//! through it, so a failure in any stage leaves nothing behind.
//!
//! The `*_rows` helpers run one computation end to end on plain `Vec` data;
//! they back the Python bindings.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::arena::{Arena, ArenaConfig, Release};
use crate::degree::degree;
use crate::error::{Error, Result};
use crate::factorize::{factorize, Factorization, FactorizeConfig};
use crate::init::{initial_association, DEFAULT_SEED};
use crate::kmeans::{kmeans, KMeansConfig};
use crate::matrix::{Matrix, Vector};
use crate::normalize::normalize;
use crate::similarity::similarity;

// ─── Goal ───────────────────────────────────────────────────────────────────

/// What a run computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Goal {
    /// Similarity matrix.
    Sym,
    /// Diagonal degree matrix.
    Ddg,
    /// Normalized similarity matrix.
    Norm,
    /// Full factorization from a seeded random initial `H`.
    Symnmf,
}

impl Goal {
    /// Keyword accepted on the command line.
    pub fn keyword(self) -> &'static str {
        match self {
            Goal::Sym => "sym",
            Goal::Ddg => "ddg",
            Goal::Norm => "norm",
            Goal::Symnmf => "symnmf",
        }
    }
}

impl FromStr for Goal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sym" => Ok(Goal::Sym),
            "ddg" => Ok(Goal::Ddg),
            "norm" => Ok(Goal::Norm),
            "symnmf" => Ok(Goal::Symnmf),
            other => Err(Error::InvalidArgument(format!("unknown goal `{other}`"))),
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Result of [`Pipeline::run`]; handles point into the pipeline's arena.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GoalOutput {
    /// A square matrix (`sym`, `norm`).
    Matrix(Matrix),
    /// The degree vector (`ddg`), rendered as a diagonal matrix.
    Degree(Vector),
    /// The association matrix and loop statistics (`symnmf`).
    Association(Factorization),
}

// ─── PipelineConfig ─────────────────────────────────────────────────────────

/// Configuration for a [`Pipeline`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Arena pool sizing and byte budget.
    pub arena: ArenaConfig,
    /// Factorization stopping rule.
    pub factorize: FactorizeConfig,
    /// Seed for the initial association matrix. Default: 1234.
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            factorize: FactorizeConfig::default(),
            seed: DEFAULT_SEED,
        }
    }
}

// ─── Pipeline ───────────────────────────────────────────────────────────────

/// One logical run: an arena plus the configuration of every stage.
#[derive(Debug)]
pub struct Pipeline {
    arena: Arena,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline with a fresh arena.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            arena: Arena::with_config(config.arena.clone()),
            config,
        }
    }

    /// The pipeline's arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable access to the pipeline's arena.
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// The pipeline's configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Copy row-major points into the arena. At least one non-empty point is required.
    pub fn load_rows(&mut self, points: &[Vec<f64>]) -> Result<Matrix> {
        load(&mut self.arena, points)
    }

    /// Compute `goal` for an `n × d` points matrix held in this pipeline's arena.
    ///
    /// `clusters` is required for [`Goal::Symnmf`] and ignored otherwise.
    pub fn run(
        &mut self,
        points: Matrix,
        goal: Goal,
        clusters: Option<usize>,
    ) -> Result<GoalOutput> {
        let (n, d) = self.arena.shape(points);
        info!(%goal, n, d, "running pipeline");

        // Validate before any stage allocates.
        let k = match goal {
            Goal::Symnmf => {
                let k = clusters.ok_or_else(|| {
                    Error::InvalidArgument("the symnmf goal needs a cluster count".into())
                })?;
                if k == 0 {
                    return Err(Error::InvalidArgument(
                        "number of clusters must be at least 1".into(),
                    ));
                }
                self.config.factorize.validate()?;
                k
            }
            _ => 0,
        };

        let sim = similarity(&mut self.arena, points)?;
        if goal == Goal::Sym {
            return Ok(GoalOutput::Matrix(sim));
        }
        let deg = degree(&mut self.arena, sim)?;
        if goal == Goal::Ddg {
            return Ok(GoalOutput::Degree(deg));
        }
        let w = normalize(&mut self.arena, sim, deg)?;
        if goal == Goal::Norm {
            return Ok(GoalOutput::Matrix(w));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let h0 = initial_association(&mut self.arena, w, k, &mut rng)?;
        let result = factorize(&mut self.arena, h0, w, &self.config.factorize)?;
        info!(
            iterations = result.iterations,
            converged = result.converged,
            "factorization finished"
        );
        Ok(GoalOutput::Association(result))
    }

    /// Free everything and start a new logical run on the same arena.
    pub fn reset(&mut self) {
        self.arena.release_all(Release::Reset);
    }

    /// Free everything and retire the arena.
    pub fn finish(mut self) {
        self.arena.release_all(Release::Final);
    }
}

// ─── Owned-data entry points ────────────────────────────────────────────────

fn run_once<T>(f: impl FnOnce(&mut Arena) -> Result<T>) -> Result<T> {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let out = f(pipeline.arena_mut());
    pipeline.finish();
    out
}

fn load(arena: &mut Arena, points: &[Vec<f64>]) -> Result<Matrix> {
    if points.is_empty() || points[0].is_empty() {
        return Err(Error::EmptyInput);
    }
    arena.matrix_from_rows(points)
}

/// Similarity matrix of row-major points.
pub fn similarity_rows(points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    run_once(|arena| {
        let p = load(arena, points)?;
        let sim = similarity(arena, p)?;
        Ok(arena.export_rows(sim))
    })
}

/// Degree vector of row-major points.
pub fn degree_rows(points: &[Vec<f64>]) -> Result<Vec<f64>> {
    run_once(|arena| {
        let p = load(arena, points)?;
        let sim = similarity(arena, p)?;
        let deg = degree(arena, sim)?;
        Ok(arena.export_vector(deg))
    })
}

/// Normalized similarity matrix of row-major points.
pub fn normalized_rows(points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    run_once(|arena| {
        let p = load(arena, points)?;
        let sim = similarity(arena, p)?;
        let deg = degree(arena, sim)?;
        let w = normalize(arena, sim, deg)?;
        Ok(arena.export_rows(w))
    })
}

/// Factorize `w` (`n × n`) from the initial `h0` (`n × k`).
///
/// Shapes are checked here, at the owned-data boundary; the core loop
/// assumes them.
pub fn factorize_rows(
    h0: &[Vec<f64>],
    w: &[Vec<f64>],
    config: &FactorizeConfig,
) -> Result<Vec<Vec<f64>>> {
    let n = h0.len();
    let k = h0.first().map_or(0, Vec::len);
    if n == 0 || k == 0 {
        return Err(Error::EmptyInput);
    }
    if w.len() != n {
        return Err(Error::ShapeMismatch(format!(
            "H has {n} rows but W has {}",
            w.len()
        )));
    }
    if let Some(row) = w.iter().find(|row| row.len() != n) {
        return Err(Error::ShapeMismatch(format!(
            "W must be {n} x {n}, found a row of {} values",
            row.len()
        )));
    }
    config.validate()?;

    run_once(|arena| {
        let h0 = arena.matrix_from_rows(h0)?;
        let w = arena.matrix_from_rows(w)?;
        let result = factorize(arena, h0, w, config)?;
        Ok(arena.export_rows(result.matrix))
    })
}

/// k-means over row-major points. Returns the centroids and each point's
/// cluster index.
pub fn kmeans_rows(
    points: &[Vec<f64>],
    k: usize,
    config: &KMeansConfig,
) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    run_once(|arena| {
        let p = load(arena, points)?;
        let clustering = kmeans(arena, p, k, config)?;
        Ok((arena.export_rows(clustering.centroids), clustering.labels))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_keywords() {
        for goal in [Goal::Sym, Goal::Ddg, Goal::Norm, Goal::Symnmf] {
            assert_eq!(goal.keyword().parse::<Goal>().unwrap(), goal);
        }
        assert!(matches!("kmeans".parse::<Goal>(), Err(Error::InvalidArgument(_))));
        assert!("SYM".parse::<Goal>().is_err());
    }

    #[test]
    fn test_run_each_goal_shape() {
        let points = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]];
        let mut pipeline = Pipeline::new(PipelineConfig::default());

        for goal in [Goal::Sym, Goal::Norm] {
            let p = pipeline.load_rows(&points).unwrap();
            match pipeline.run(p, goal, None).unwrap() {
                GoalOutput::Matrix(m) => assert_eq!(pipeline.arena().shape(m), (3, 3)),
                other => panic!("unexpected output {other:?}"),
            }
            pipeline.reset();
        }

        let p = pipeline.load_rows(&points).unwrap();
        match pipeline.run(p, Goal::Ddg, None).unwrap() {
            GoalOutput::Degree(v) => assert_eq!(pipeline.arena().vector(v).len(), 3),
            other => panic!("unexpected output {other:?}"),
        }
        pipeline.reset();

        let p = pipeline.load_rows(&points).unwrap();
        match pipeline.run(p, Goal::Symnmf, Some(2)).unwrap() {
            GoalOutput::Association(f) => assert_eq!(pipeline.arena().shape(f.matrix), (3, 2)),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_symnmf_needs_clusters_and_allocates_nothing_without_them() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let p = pipeline.load_rows(&[vec![0.0], vec![1.0]]).unwrap();
        let before = pipeline.arena().live_allocations();
        assert!(matches!(
            pipeline.run(p, Goal::Symnmf, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(pipeline.run(p, Goal::Symnmf, Some(0)).is_err());
        assert_eq!(pipeline.arena().live_allocations(), before);
    }

    #[test]
    fn test_empty_points_rejected() {
        assert!(matches!(similarity_rows(&[]), Err(Error::EmptyInput)));
        assert!(matches!(degree_rows(&[vec![]]), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_owned_helpers_agree_with_pipeline() {
        let points = vec![vec![0.0, 0.0], vec![1.0, 0.0]];
        let e = (-0.5f64).exp();
        assert_eq!(similarity_rows(&points).unwrap(), vec![vec![0.0, e], vec![e, 0.0]]);
        assert_eq!(degree_rows(&points).unwrap(), vec![e, e]);
        let norm = normalized_rows(&points).unwrap();
        assert!((norm[0][1] - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_factorize_rows_checks_shapes() {
        let config = FactorizeConfig::default();
        let h = vec![vec![1.0], vec![1.0]];
        assert!(matches!(
            factorize_rows(&h, &[vec![0.0, 1.0]], &config),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            factorize_rows(&h, &[vec![0.0, 1.0], vec![1.0]], &config),
            Err(Error::ShapeMismatch(_))
        ));
        let out = factorize_rows(&h, &[vec![0.0, 1.0], vec![1.0, 0.0]], &config).unwrap();
        assert!((out[0][0] - 0.5f64.sqrt()).abs() < 0.01);
    }

    #[test]
    fn test_kmeans_rows_returns_centroids_and_labels() {
        let points = vec![vec![0.0], vec![10.0], vec![1.0], vec![9.0]];
        let (centroids, labels) = kmeans_rows(&points, 2, &KMeansConfig::default()).unwrap();
        assert_eq!(centroids, vec![vec![0.5], vec![9.5]]);
        assert_eq!(labels, vec![0, 1, 0, 1]);
        assert!(matches!(
            kmeans_rows(&[], 1, &KMeansConfig::default()),
            Err(Error::EmptyInput)
        ));
        assert!(matches!(
            kmeans_rows(&points, 5, &KMeansConfig::default()),
            Err(Error::InvalidArgument(_))
        ));
    }
}
