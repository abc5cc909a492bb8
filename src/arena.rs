/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Resource arena: the single owner of every heap allocation made by a run.
//!
//! The arena partitions its records into three pools by allocation shape:
//!
//! | Pool | Holds |
//! |------|-------|
//! | [`PoolKind::Scalar`] | 1-D `f64` buffers (matrix rows, degree vectors) |
//! | [`PoolKind::RowTable`] | 2-D row tables: the list of row buffers of one matrix |
//! | [`PoolKind::Header`] | matrix headers (shape + row table) |
//!
//! plus at most one open file.
//!
//! Handles are indices into a pool tagged with the pool's epoch, so
//! reallocation is O(1) and a handle that outlives a reset is detected as
//! stale instead of aliasing new data.
//!
//! # Failure model
//!
//! Every allocation goes through `try_reserve_exact`. When a request cannot
//! be satisfied, or would push the tracked bytes past
//! [`ArenaConfig::max_bytes`], the arena releases **every** record it holds
//! (including records of pipeline stages that already finished), closes the
//! tracked file, retires itself and returns [`Error::AllocationFailed`].
//! Callers only ever propagate the error with `?`.
//!
//! # Invariants
//!
//! - Every record appears in exactly one pool exactly once.
//! - Records are never freed piecemeal; only [`Arena::release_all`] (or drop) frees.
//! - Pools reserve [`INITIAL_POOL_CAPACITY`] slots on first use and double when full.

use std::fmt;
use std::fs::File;
use std::mem;
use std::ops::{Index, IndexMut};

use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::matrix::MatrixHeader;

/// Slots reserved by a pool on first use.
pub const INITIAL_POOL_CAPACITY: usize = 500;

const F64_BYTES: usize = mem::size_of::<f64>();

// ─── Pool kinds and handles ─────────────────────────────────────────────────

/// The three allocation pools of an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PoolKind {
    /// 1-D `f64` buffers.
    Scalar,
    /// Row tables of 2-D matrices.
    RowTable,
    /// Matrix headers.
    Header,
}

impl PoolKind {
    /// All pools, in release order.
    pub const ALL: [PoolKind; 3] = [PoolKind::Scalar, PoolKind::RowTable, PoolKind::Header];

    fn index(self) -> usize {
        match self {
            PoolKind::Scalar => 0,
            PoolKind::RowTable => 1,
            PoolKind::Header => 2,
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoolKind::Scalar => "scalar",
            PoolKind::RowTable => "row-table",
            PoolKind::Header => "header",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Slot {
    index: usize,
    epoch: u32,
}

/// Handle to a 1-D buffer in the scalar pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(Slot);

/// Handle to a row table in the row-table pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableId(Slot);

/// Handle to a matrix header in the header pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeaderId(Slot);

/// How far [`Arena::release_all`] goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Release {
    /// Free everything and return to a fresh, reusable state.
    Reset,
    /// Free everything and retire the arena.
    Final,
}

// ─── Configuration and statistics ───────────────────────────────────────────

/// Configuration for an [`Arena`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArenaConfig {
    /// Slots each pool reserves on first use. Default: 500.
    pub initial_pool_capacity: usize,
    /// Upper bound on tracked bytes. A request that would exceed it fails
    /// exactly like an out-of-memory condition. Default: unlimited.
    pub max_bytes: Option<usize>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_pool_capacity: INITIAL_POOL_CAPACITY,
            max_bytes: None,
        }
    }
}

/// Point-in-time accounting of an [`Arena`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArenaStats {
    /// Live records per pool, indexed in [`PoolKind::ALL`] order.
    pub live: [usize; 3],
    /// Reserved slots per pool, indexed in [`PoolKind::ALL`] order.
    pub capacity: [usize; 3],
    /// Bytes currently charged to the arena.
    pub bytes_in_use: usize,
    /// High-water mark of `bytes_in_use` since the last release.
    pub peak_bytes: usize,
    /// Allocations made since the last release.
    pub total_allocations: usize,
}

impl ArenaStats {
    /// Live records in one pool.
    pub fn live_in(&self, pool: PoolKind) -> usize {
        self.live[pool.index()]
    }

    /// Reserved slots in one pool.
    pub fn capacity_of(&self, pool: PoolKind) -> usize {
        self.capacity[pool.index()]
    }
}

// ─── Pool ───────────────────────────────────────────────────────────────────

struct Pool<T> {
    kind: PoolKind,
    slots: Vec<T>,
    epoch: u32,
    initial_capacity: usize,
}

impl<T> Pool<T> {
    fn new(kind: PoolKind, initial_capacity: usize) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            epoch: 0,
            initial_capacity: initial_capacity.max(1),
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Make room for one more record: first use reserves the initial
    /// capacity, a full pool doubles.
    fn grow_if_full(&mut self) -> std::result::Result<(), std::collections::TryReserveError> {
        let len = self.slots.len();
        if len < self.slots.capacity() {
            return Ok(());
        }
        let target = if len == 0 { self.initial_capacity } else { len * 2 };
        self.slots.try_reserve_exact(target - len)?;
        trace!(pool = %self.kind, capacity = self.slots.capacity(), "pool grown");
        Ok(())
    }

    /// Caller must have called `grow_if_full` first.
    fn insert(&mut self, value: T) -> Slot {
        debug_assert!(self.slots.len() < self.slots.capacity());
        let index = self.slots.len();
        self.slots.push(value);
        Slot {
            index,
            epoch: self.epoch,
        }
    }

    fn get(&self, slot: Slot) -> Option<&T> {
        if slot.epoch != self.epoch {
            return None;
        }
        self.slots.get(slot.index)
    }

    fn get_mut(&mut self, slot: Slot) -> Option<&mut T> {
        if slot.epoch != self.epoch {
            return None;
        }
        self.slots.get_mut(slot.index)
    }

    /// Drop every record and invalidate outstanding handles.
    fn release(&mut self) -> usize {
        let released = self.slots.len();
        self.slots = Vec::new();
        self.epoch = self.epoch.wrapping_add(1);
        released
    }
}

impl<T> Index<Slot> for Pool<T> {
    type Output = T;

    fn index(&self, slot: Slot) -> &T {
        match self.get(slot) {
            Some(value) => value,
            None => panic!("stale or foreign {} handle {:?}", self.kind, slot),
        }
    }
}

impl<T> IndexMut<Slot> for Pool<T> {
    fn index_mut(&mut self, slot: Slot) -> &mut T {
        let kind = self.kind;
        match self.get_mut(slot) {
            Some(value) => value,
            None => panic!("stale or foreign {} handle {:?}", kind, slot),
        }
    }
}

// ─── Arena ──────────────────────────────────────────────────────────────────

/// Owner of every allocation made by one logical pipeline run.
///
/// Passed by `&mut` through the call graph; there is no global instance.
/// Dropping the arena performs a final release.
///
/// ```
/// use symnmf::arena::{Arena, PoolKind, Release};
///
/// let mut arena = Arena::new();
/// let m = arena.alloc_matrix(3, 2).unwrap();
/// assert_eq!(arena.shape(m), (3, 2));
/// assert_eq!(arena.stats().live_in(PoolKind::Scalar), 3);
///
/// arena.release_all(Release::Reset);
/// assert_eq!(arena.live_allocations(), 0);
/// ```
pub struct Arena {
    config: ArenaConfig,
    buffers: Pool<Vec<f64>>,
    tables: Pool<Vec<BufferId>>,
    headers: Pool<MatrixHeader>,
    file: Option<File>,
    bytes_in_use: usize,
    peak_bytes: usize,
    total_allocations: usize,
    retired: bool,
}

impl Arena {
    /// Create an arena with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    /// Create an arena with an explicit configuration.
    pub fn with_config(config: ArenaConfig) -> Self {
        let cap = config.initial_pool_capacity;
        Self {
            buffers: Pool::new(PoolKind::Scalar, cap),
            tables: Pool::new(PoolKind::RowTable, cap),
            headers: Pool::new(PoolKind::Header, cap),
            config,
            file: None,
            bytes_in_use: 0,
            peak_bytes: 0,
            total_allocations: 0,
            retired: false,
        }
    }

    /// The configuration this arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// True once a final release (explicit or after a failure) has happened.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Total live records across all pools.
    pub fn live_allocations(&self) -> usize {
        self.buffers.len() + self.tables.len() + self.headers.len()
    }

    /// Snapshot of the arena's accounting.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live: [self.buffers.len(), self.tables.len(), self.headers.len()],
            capacity: [
                self.buffers.capacity(),
                self.tables.capacity(),
                self.headers.capacity(),
            ],
            bytes_in_use: self.bytes_in_use,
            peak_bytes: self.peak_bytes,
            total_allocations: self.total_allocations,
        }
    }

    // ── Allocation ──────────────────────────────────────────────────────────

    /// Allocate a zero-filled buffer of `len` reals in the scalar pool.
    pub fn allocate_buffer(&mut self, len: usize) -> Result<BufferId> {
        self.ensure_live()?;
        let bytes = len.saturating_mul(F64_BYTES);
        self.admit(PoolKind::Scalar, bytes)?;

        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() || self.buffers.grow_if_full().is_err() {
            return Err(self.fail(PoolKind::Scalar, bytes));
        }
        data.resize(len, 0.0);
        let slot = self.buffers.insert(data);
        self.charge(bytes);
        Ok(BufferId(slot))
    }

    /// Allocate an empty row table able to hold `capacity` rows.
    pub fn allocate_table(&mut self, capacity: usize) -> Result<TableId> {
        self.ensure_live()?;
        let bytes = capacity.saturating_mul(mem::size_of::<BufferId>());
        self.admit(PoolKind::RowTable, bytes)?;

        let mut rows = Vec::new();
        if rows.try_reserve_exact(capacity).is_err() || self.tables.grow_if_full().is_err() {
            return Err(self.fail(PoolKind::RowTable, bytes));
        }
        let slot = self.tables.insert(rows);
        self.charge(bytes);
        Ok(TableId(slot))
    }

    /// Register a matrix header in the header pool.
    pub fn allocate_header(&mut self, header: MatrixHeader) -> Result<HeaderId> {
        self.ensure_live()?;
        let bytes = mem::size_of::<MatrixHeader>();
        self.admit(PoolKind::Header, bytes)?;

        if self.headers.grow_if_full().is_err() {
            return Err(self.fail(PoolKind::Header, bytes));
        }
        let slot = self.headers.insert(header);
        self.charge(bytes);
        Ok(HeaderId(slot))
    }

    /// Grow or shrink a scalar buffer in place. New entries are zero.
    ///
    /// The handle stays valid and is returned for symmetry with
    /// [`Arena::allocate_buffer`].
    pub fn reallocate_buffer(&mut self, id: BufferId, new_len: usize) -> Result<BufferId> {
        self.ensure_live()?;
        let old_len = match self.buffers.get(id.0) {
            Some(buf) => buf.len(),
            None => return Err(self.unknown(PoolKind::Scalar)),
        };
        let old_bytes = old_len * F64_BYTES;
        let new_bytes = new_len.saturating_mul(F64_BYTES);

        if new_len > old_len {
            self.admit(PoolKind::Scalar, new_bytes - old_bytes)?;
            let grown = match self.buffers.get_mut(id.0) {
                Some(buf) => {
                    if buf.try_reserve_exact(new_len - old_len).is_ok() {
                        buf.resize(new_len, 0.0);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };
            if !grown {
                return Err(self.fail(PoolKind::Scalar, new_bytes));
            }
            self.charge(new_bytes - old_bytes);
        } else {
            let buf = &mut self.buffers[id.0];
            buf.truncate(new_len);
            buf.shrink_to_fit();
            self.bytes_in_use -= old_bytes - new_bytes;
        }
        trace!(old_len, new_len, "buffer reallocated");
        Ok(id)
    }

    /// Grow a row table so it can hold at least `new_capacity` rows.
    ///
    /// Tables never shrink below their current capacity; smaller requests
    /// are accepted and leave the table unchanged.
    pub fn reallocate_table(&mut self, id: TableId, new_capacity: usize) -> Result<TableId> {
        self.ensure_live()?;
        let (len, old_capacity) = match self.tables.get(id.0) {
            Some(rows) => (rows.len(), rows.capacity()),
            None => return Err(self.unknown(PoolKind::RowTable)),
        };
        if new_capacity <= old_capacity {
            return Ok(id);
        }

        let slot_bytes = mem::size_of::<BufferId>();
        let requested = (new_capacity - old_capacity).saturating_mul(slot_bytes);
        self.admit(PoolKind::RowTable, requested)?;
        let grown = match self.tables.get_mut(id.0) {
            Some(rows) => rows.try_reserve_exact(new_capacity - len).is_ok(),
            None => false,
        };
        if !grown {
            return Err(self.fail(PoolKind::RowTable, new_capacity.saturating_mul(slot_bytes)));
        }
        let added = self.tables[id.0].capacity() - old_capacity;
        self.charge(added * slot_bytes);
        trace!(old_capacity, new_capacity, "row table reallocated");
        Ok(id)
    }

    /// Append a row buffer to a table, doubling the table when it is full.
    pub(crate) fn table_push(&mut self, id: TableId, row: BufferId) -> Result<()> {
        let (len, capacity) = match self.tables.get(id.0) {
            Some(rows) => (rows.len(), rows.capacity()),
            None => return Err(self.unknown(PoolKind::RowTable)),
        };
        if len == capacity {
            self.reallocate_table(id, (capacity * 2).max(1))?;
        }
        self.tables[id.0].push(row);
        Ok(())
    }

    // ── Release ─────────────────────────────────────────────────────────────

    /// Free every record in every pool and close the tracked file.
    ///
    /// [`Release::Reset`] leaves a fresh arena whose earlier handles are
    /// stale; [`Release::Final`] retires it. A retired arena stays retired.
    pub fn release_all(&mut self, mode: Release) {
        let mut released = 0;
        for pool in PoolKind::ALL {
            released += match pool {
                PoolKind::Scalar => self.buffers.release(),
                PoolKind::RowTable => self.tables.release(),
                PoolKind::Header => self.headers.release(),
            };
        }
        let closed_file = self.file.take().is_some();
        self.bytes_in_use = 0;
        self.peak_bytes = 0;
        self.total_allocations = 0;
        if mode == Release::Final {
            self.retired = true;
        }
        debug!(?mode, released, closed_file, "arena released");
    }

    // ── Tracked file ────────────────────────────────────────────────────────

    /// Track an open file so that any release closes it.
    ///
    /// A previously tracked file is closed.
    pub fn attach_file(&mut self, file: File) -> Result<()> {
        self.ensure_live()?;
        self.file = Some(file);
        Ok(())
    }

    /// The tracked file, if one is open.
    pub fn file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    /// Close the tracked file. Returns whether one was open.
    pub fn close_file(&mut self) -> bool {
        self.file.take().is_some()
    }

    // ── Record access ───────────────────────────────────────────────────────

    /// Contents of a scalar buffer.
    ///
    /// # Panics
    /// If the handle is stale or belongs to another arena.
    pub fn buffer(&self, id: BufferId) -> &[f64] {
        &self.buffers[id.0]
    }

    /// Mutable contents of a scalar buffer.
    ///
    /// # Panics
    /// If the handle is stale or belongs to another arena.
    pub fn buffer_mut(&mut self, id: BufferId) -> &mut [f64] {
        &mut self.buffers[id.0]
    }

    /// Row buffers of a table.
    pub fn table(&self, id: TableId) -> &[BufferId] {
        &self.tables[id.0]
    }

    /// A matrix header.
    pub fn header(&self, id: HeaderId) -> &MatrixHeader {
        &self.headers[id.0]
    }

    /// Detach a buffer's storage so the rest of the arena can be borrowed
    /// while it is written. Must be paired with [`Arena::restore_buffer`].
    pub(crate) fn take_buffer(&mut self, id: BufferId) -> Vec<f64> {
        mem::take(&mut self.buffers[id.0])
    }

    pub(crate) fn restore_buffer(&mut self, id: BufferId, data: Vec<f64>) {
        self.buffers[id.0] = data;
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn ensure_live(&self) -> Result<()> {
        if self.retired {
            return Err(Error::Retired);
        }
        Ok(())
    }

    /// Enforce the byte budget before a request is attempted.
    fn admit(&mut self, pool: PoolKind, bytes: usize) -> Result<()> {
        if let Some(limit) = self.config.max_bytes {
            if self.bytes_in_use.saturating_add(bytes) > limit {
                return Err(self.fail(pool, bytes));
            }
        }
        Ok(())
    }

    fn charge(&mut self, bytes: usize) {
        self.bytes_in_use += bytes;
        self.peak_bytes = self.peak_bytes.max(self.bytes_in_use);
        self.total_allocations += 1;
    }

    /// Roll back everything and produce the allocation error.
    fn fail(&mut self, pool: PoolKind, bytes: usize) -> Error {
        error!(
            %pool,
            bytes,
            live = self.live_allocations(),
            bytes_in_use = self.bytes_in_use,
            "allocation failed, releasing every tracked allocation"
        );
        self.release_all(Release::Final);
        Error::AllocationFailed { pool, bytes }
    }

    fn unknown(&mut self, pool: PoolKind) -> Error {
        error!(%pool, "handle not registered, releasing every tracked allocation");
        self.release_all(Release::Final);
        Error::UnknownHandle { pool }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if !self.retired {
            self.release_all(Release::Final);
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("stats", &self.stats())
            .field("file_open", &self.file.is_some())
            .field("retired", &self.retired)
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
