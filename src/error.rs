/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Error types for the symNMF pipeline.
//!
//! Every fallible operation in the crate returns [`Result`]. Allocation
//! failures are reported only after the owning [`Arena`](crate::arena::Arena)
//! has already released everything it tracked, so an `Err` never leaves
//! partial pipeline state behind.

use std::path::PathBuf;

use thiserror::Error;

use crate::arena::PoolKind;

/// Result type alias for symNMF operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the resource arena, the numeric pipeline and its loaders.
#[derive(Debug, Error)]
pub enum Error {
    // ── Resource arena ──────────────────────────────────────────────────────
    /// A heap request could not be satisfied, or would exceed the arena's
    /// configured byte budget. The arena has been rolled back and retired.
    #[error("allocation of {bytes} bytes in the {pool} pool failed")]
    AllocationFailed {
        /// Pool the request was made against.
        pool: PoolKind,
        /// Size of the failed request in bytes.
        bytes: usize,
    },

    /// A handle passed to the arena is not registered in the named pool.
    ///
    /// This is an invariant violation in the caller, not a user error. The
    /// arena has been rolled back and retired.
    #[error("handle is not registered in the {pool} pool")]
    UnknownHandle {
        /// Pool that was searched.
        pool: PoolKind,
    },

    /// The arena was retired by a final release and cannot allocate again.
    #[error("resource arena has been retired")]
    Retired,

    // ── External input ──────────────────────────────────────────────────────
    /// The points file could not be opened or read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the input resource.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line of the points file is not a well-formed point.
    #[error("malformed input at line {line}: {reason}")]
    MalformedInput {
        /// One-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The input contained no points.
    #[error("input contains no points")]
    EmptyInput,

    /// Row-major data handed across the owned-data boundary is ragged or
    /// does not match a related matrix.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A parameter is outside its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// True for errors that were raised by the arena's rollback path.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, Error::AllocationFailed { .. })
    }
}
