/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Comma-separated points loader.
//!
//! One point per line, values separated by commas. The dimension is taken
//! from the first non-blank line and every later line must match it.
//! Blank lines are skipped.
//!
//! Everything the loader holds lives in the arena: the open file while it
//! is read, the first row while its length is still unknown, each row
//! buffer and the row table. A failure part-way leaves nothing the next
//! release will not reclaim.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::arena::{Arena, BufferId};
use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Starting length of the first-row buffer; doubled while it fills.
const FIRST_ROW_CAPACITY: usize = 8;

/// Starting capacity of the row table; doubled while it fills.
const ROW_TABLE_CAPACITY: usize = 10;

/// Read a points file into an `n × d` matrix.
pub fn load_points(arena: &mut Arena, path: impl AsRef<Path>) -> Result<Matrix> {
    let path = path.as_ref();
    let io_error = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    arena.attach_file(file)?;
    let mut text = String::new();
    let read = match arena.file_mut() {
        Some(file) => file.read_to_string(&mut text),
        None => Ok(0),
    };
    arena.close_file();
    let bytes = read.map_err(io_error)?;
    debug!(path = %path.display(), bytes, "read points file");

    parse_points(arena, &text)
}

/// Parse comma-separated points from `text` into an `n × d` matrix.
pub fn parse_points(arena: &mut Arena, text: &str) -> Result<Matrix> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (first_line, first) = lines.next().ok_or(Error::EmptyInput)?;
    let first_row = parse_first_row(arena, first_line, first)?;
    let d = arena.buffer(first_row).len();

    let table = arena.allocate_table(ROW_TABLE_CAPACITY)?;
    arena.table_push(table, first_row)?;

    for (line_no, line) in lines {
        let row = arena.allocate_buffer(d)?;
        let mut count = 0;
        for token in line.split(',') {
            let value = parse_value(line_no, token)?;
            if count == d {
                return Err(width_error(line_no, d, line));
            }
            arena.buffer_mut(row)[count] = value;
            count += 1;
        }
        if count != d {
            return Err(width_error(line_no, d, line));
        }
        arena.table_push(table, row)?;
    }

    let points = arena.finish_matrix(table, d)?;
    debug!(n = arena.rows(points), d, "parsed points");
    Ok(points)
}

/// The first row fixes the dimension, so its buffer grows as values arrive.
fn parse_first_row(arena: &mut Arena, line_no: usize, line: &str) -> Result<BufferId> {
    let mut row = arena.allocate_buffer(FIRST_ROW_CAPACITY)?;
    let mut len = 0;
    for token in line.split(',') {
        let value = parse_value(line_no, token)?;
        let capacity = arena.buffer(row).len();
        if len == capacity {
            row = arena.reallocate_buffer(row, capacity * 2)?;
        }
        arena.buffer_mut(row)[len] = value;
        len += 1;
    }
    arena.reallocate_buffer(row, len)
}

fn parse_value(line: usize, token: &str) -> Result<f64> {
    let token = token.trim();
    token.parse::<f64>().map_err(|_| Error::MalformedInput {
        line,
        reason: format!("`{token}` is not a real number"),
    })
}

fn width_error(line: usize, expected: usize, text: &str) -> Error {
    Error::MalformedInput {
        line,
        reason: format!(
            "expected {expected} values, found {}",
            text.split(',').count()
        ),
    }
}
