/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Text rendering of results.
//!
//! One row per line, values comma-separated with exactly four decimals and
//! no trailing comma. NaN renders as `nan` and infinities as `inf`/`-inf`.

use std::io::{self, Write};

use crate::arena::Arena;
use crate::matrix::{Matrix, Vector};

fn write_value(out: &mut impl Write, value: f64) -> io::Result<()> {
    if value.is_nan() {
        out.write_all(b"nan")
    } else if value.is_infinite() {
        out.write_all(if value > 0.0 { "inf" } else { "-inf" }.as_bytes())
    } else {
        write!(out, "{value:.4}")
    }
}

fn write_row(out: &mut impl Write, values: impl IntoIterator<Item = f64>) -> io::Result<()> {
    for (j, value) in values.into_iter().enumerate() {
        if j > 0 {
            out.write_all(b",")?;
        }
        write_value(out, value)?;
    }
    out.write_all(b"\n")
}

/// Write every row of a matrix.
pub fn write_matrix(out: &mut impl Write, arena: &Arena, m: Matrix) -> io::Result<()> {
    for i in 0..arena.rows(m) {
        write_row(out, arena.row(m, i).iter().copied())?;
    }
    Ok(())
}

/// Write a vector as the full `n × n` diagonal matrix it represents.
pub fn write_diagonal(out: &mut impl Write, arena: &Arena, v: Vector) -> io::Result<()> {
    let diag = arena.vector(v);
    for (i, &d) in diag.iter().enumerate() {
        write_row(out, (0..diag.len()).map(|j| if i == j { d } else { 0.0 }))?;
    }
    Ok(())
}
