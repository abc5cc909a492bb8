/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! # symnmf
//!
//! Symmetric non-negative matrix factorization clustering over an
//! all-or-nothing resource arena.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! points (n × d) → similarity A (n × n) → degree d (n) → W = D^{-1/2}·A·D^{-1/2}
//!                                                             ↓
//!                                   H0 (n × k, seeded) → factorize → H (n × k)
//! ```
//!
//! Points are compared with a Gaussian kernel `exp(−‖xᵢ − xⱼ‖² / 2)`. `W` is
//! then factorized as `W ≈ H·Hᵗ` with non-negative `H` by damped
//! multiplicative updates; row `i` of `H` is point `i`'s affinity to each
//! of the `k` clusters.
//!
//! ## The arena
//!
//! Every matrix, vector and open file of a run is registered in one
//! [`Arena`]. A failed allocation anywhere releases everything the arena
//! holds, including the outputs of stages that already succeeded, before
//! the error is returned. Callers never free anything piecemeal.
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`arena`] | [`Arena`], [`ArenaConfig`], [`Release`] | Pooled allocations with rollback |
//! | [`matrix`] | [`Matrix`], [`Vector`] | Dense row-owned matrices inside the arena |
//! | [`ops`] | | Inner products, Frobenius distance, Gram products |
//! | [`similarity`] | | Pairwise Gaussian similarity |
//! | [`degree`] | | Row sums of the similarity matrix |
//! | [`normalize`] | | Symmetric degree normalization |
//! | [`init`] | | Seeded random initial association matrix |
//! | [`factorize`] | [`Factorization`], [`FactorizeConfig`] | Multiplicative-update loop |
//! | [`kmeans`] | [`KMeansConfig`], [`Clustering`] | Lloyd's k-means baseline |
//! | [`pipeline`] | [`Pipeline`], [`Goal`] | Goal dispatch over one arena |
//! | [`loader`] | | Comma-separated points files |
//! | [`report`] | | Four-decimal text output |
//! | `ffi` | | Python bindings (requires `python-ffi` feature) |
//!
//! ## Example
//!
//! ```
//! use symnmf::{Goal, GoalOutput, Pipeline, PipelineConfig};
//!
//! let mut pipeline = Pipeline::new(PipelineConfig::default());
//! let points = pipeline
//!     .load_rows(&[vec![0.0, 0.0], vec![0.2, 0.1], vec![6.0, 6.0], vec![6.1, 5.9]])
//!     .unwrap();
//! let output = pipeline.run(points, Goal::Symnmf, Some(2)).unwrap();
//! let GoalOutput::Association(result) = output else {
//!     unreachable!()
//! };
//! assert_eq!(pipeline.arena().shape(result.matrix), (4, 2));
//! let labels = symnmf::factorize::assign_clusters(pipeline.arena(), result.matrix);
//! assert!(labels.iter().all(|&c| c < 2));
//! ```
//!
//! ## License
//!
//! Business Source License 1.1.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod arena;
pub mod degree;
pub mod error;
pub mod factorize;
pub mod init;
pub mod kmeans;
pub mod loader;
pub mod matrix;
pub mod normalize;
pub mod ops;
pub mod pipeline;
pub mod report;
pub mod similarity;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use arena::{Arena, ArenaConfig, ArenaStats, PoolKind, Release};
pub use error::{Error, Result};
pub use factorize::{Factorization, FactorizeConfig};
pub use kmeans::{Clustering, KMeansConfig};
pub use matrix::{Matrix, Vector};
pub use pipeline::{Goal, GoalOutput, Pipeline, PipelineConfig};
