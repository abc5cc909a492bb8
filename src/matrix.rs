/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Dense matrices and vectors living inside an [`Arena`].
//!
//! A matrix is three kinds of record:
//!
//! ```text
//! Matrix ──► MatrixHeader (header pool)
//!              └─► row table (row-table pool) ──► row 0 buffer (scalar pool)
//!                                                 row 1 buffer
//!                                                 …
//! ```
//!
//! Handles are `Copy` and carry no data; every read goes through the arena.
//! Dimensions are fixed once a matrix is built, and matrices are never freed
//! individually.

use crate::arena::{Arena, BufferId, HeaderId, TableId};
use crate::error::{Error, Result};

/// Shape and row table of a matrix, stored in the header pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixHeader {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns (length of every row buffer).
    pub columns: usize,
    /// Row buffers, in row order.
    pub table: TableId,
}

/// Handle to a dense `rows × columns` matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Matrix(HeaderId);

/// Handle to a dense vector (a single scalar buffer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Vector(BufferId);

impl Matrix {
    /// The header record backing this matrix.
    pub fn header_id(self) -> HeaderId {
        self.0
    }
}

impl Vector {
    /// The scalar buffer backing this vector.
    pub fn buffer_id(self) -> BufferId {
        self.0
    }
}

impl Arena {
    // ── Construction ────────────────────────────────────────────────────────

    /// Allocate a zero-filled `rows × columns` matrix.
    pub fn alloc_matrix(&mut self, rows: usize, columns: usize) -> Result<Matrix> {
        let table = self.allocate_table(rows)?;
        for _ in 0..rows {
            let row = self.allocate_buffer(columns)?;
            self.table_push(table, row)?;
        }
        self.finish_matrix(table, columns)
    }

    /// Allocate a zero-filled vector of length `len`.
    pub fn alloc_vector(&mut self, len: usize) -> Result<Vector> {
        self.allocate_buffer(len).map(Vector)
    }

    /// Wrap a filled row table in a header. Every row must hold `columns` values.
    pub(crate) fn finish_matrix(&mut self, table: TableId, columns: usize) -> Result<Matrix> {
        let rows = self.table(table).len();
        debug_assert!(self
            .table(table)
            .iter()
            .all(|&row| self.buffer(row).len() == columns));
        let header = self.allocate_header(MatrixHeader {
            rows,
            columns,
            table,
        })?;
        Ok(Matrix(header))
    }

    /// Copy row-major data into a new matrix.
    ///
    /// Rows must all have the same length; an empty slice yields a `0 × 0` matrix.
    pub fn matrix_from_rows(&mut self, data: &[Vec<f64>]) -> Result<Matrix> {
        let columns = data.first().map_or(0, Vec::len);
        if let Some((i, row)) = data.iter().enumerate().find(|(_, r)| r.len() != columns) {
            return Err(Error::ShapeMismatch(format!(
                "row {i} has {} values, expected {columns}",
                row.len()
            )));
        }
        let m = self.alloc_matrix(data.len(), columns)?;
        for (i, values) in data.iter().enumerate() {
            self.row_mut(m, i).copy_from_slice(values);
        }
        Ok(m)
    }

    // ── Shape ───────────────────────────────────────────────────────────────

    /// `(rows, columns)` of a matrix.
    pub fn shape(&self, m: Matrix) -> (usize, usize) {
        let header = self.header(m.0);
        (header.rows, header.columns)
    }

    /// Number of rows of a matrix.
    pub fn rows(&self, m: Matrix) -> usize {
        self.header(m.0).rows
    }

    /// Number of columns of a matrix.
    pub fn columns(&self, m: Matrix) -> usize {
        self.header(m.0).columns
    }

    // ── Element access ──────────────────────────────────────────────────────

    fn row_id(&self, m: Matrix, i: usize) -> BufferId {
        let header = self.header(m.0);
        self.table(header.table)[i]
    }

    /// Row `i` of a matrix.
    ///
    /// # Panics
    /// If `i` is out of range or the handle is stale.
    pub fn row(&self, m: Matrix, i: usize) -> &[f64] {
        self.buffer(self.row_id(m, i))
    }

    /// Mutable row `i` of a matrix.
    pub fn row_mut(&mut self, m: Matrix, i: usize) -> &mut [f64] {
        let id = self.row_id(m, i);
        self.buffer_mut(id)
    }

    /// Element `[i][j]`.
    pub fn get(&self, m: Matrix, i: usize, j: usize) -> f64 {
        self.row(m, i)[j]
    }

    /// Write row `i` of `target` while reading anything else in the arena.
    ///
    /// The row is detached for the duration of `f`; reading it back through
    /// the arena inside `f` sees an empty row.
    pub fn with_row_mut<R>(
        &mut self,
        target: Matrix,
        i: usize,
        f: impl FnOnce(&Arena, &mut [f64]) -> R,
    ) -> R {
        let id = self.row_id(target, i);
        let mut row = self.take_buffer(id);
        let out = f(self, &mut row);
        self.restore_buffer(id, row);
        out
    }

    /// Contents of a vector.
    pub fn vector(&self, v: Vector) -> &[f64] {
        self.buffer(v.0)
    }

    /// Mutable contents of a vector.
    pub fn vector_mut(&mut self, v: Vector) -> &mut [f64] {
        self.buffer_mut(v.0)
    }

    // ── Export ──────────────────────────────────────────────────────────────

    /// Copy a matrix out of the arena as row-major `Vec`s.
    pub fn export_rows(&self, m: Matrix) -> Vec<Vec<f64>> {
        (0..self.rows(m)).map(|i| self.row(m, i).to_vec()).collect()
    }

    /// Copy a vector out of the arena.
    pub fn export_vector(&self, v: Vector) -> Vec<f64> {
        self.vector(v).to_vec()
    }
}
