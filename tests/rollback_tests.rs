//! Allocation-failure rollback across the whole pipeline.
//!
//! A counting global allocator tracks live heap bytes per thread. For every
//! byte budget below what a full run needs, the run must fail with an
//! allocation error, leave the arena empty and retired, and return the
//! heap to exactly where it was before the run started.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use symnmf::loader::parse_points;
use symnmf::{ArenaConfig, Error, Goal, GoalOutput, Pipeline, PipelineConfig};

// ─── counting allocator ──────────────────────────────────────────────────────

struct Counting;

thread_local! {
    static LIVE_BYTES: Cell<isize> = const { Cell::new(0) };
}

fn track(delta: isize) {
    let _ = LIVE_BYTES.try_with(|live| live.set(live.get() + delta));
}

fn live_bytes() -> isize {
    LIVE_BYTES.with(Cell::get)
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            track(layout.size() as isize);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            track(layout.size() as isize);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        track(-(layout.size() as isize));
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            track(new_size as isize - layout.size() as isize);
        }
        new_ptr
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

// ─── helpers ─────────────────────────────────────────────────────────────────

const POINTS: &str = "0.0,0.0\n0.2,0.1\n-0.1,0.3\n0.1,-0.2\n6.0,6.0\n6.2,5.9\n5.8,6.1\n6.1,6.2\n";

fn config(max_bytes: Option<usize>) -> PipelineConfig {
    PipelineConfig {
        arena: ArenaConfig {
            max_bytes,
            ..ArenaConfig::default()
        },
        ..PipelineConfig::default()
    }
}

fn run(pipeline: &mut Pipeline, goal: Goal) -> Result<GoalOutput, Error> {
    let points = parse_points(pipeline.arena_mut(), POINTS)?;
    pipeline.run(points, goal, Some(2))
}

/// Bytes the arena holds at the end of a successful run of `goal`.
fn bytes_needed(goal: Goal) -> usize {
    let mut pipeline = Pipeline::new(config(None));
    run(&mut pipeline, goal).unwrap();
    let peak = pipeline.arena().stats().peak_bytes;
    pipeline.finish();
    peak
}

/// Exercise every code path once so lazily initialised globals are in place
/// before any heap baseline is taken.
fn warm_up() {
    for goal in [Goal::Sym, Goal::Ddg, Goal::Norm, Goal::Symnmf] {
        bytes_needed(goal);
    }
    let mut pipeline = Pipeline::new(config(Some(0)));
    assert!(run(&mut pipeline, Goal::Symnmf).is_err());
}

fn assert_every_budget_rolls_back(goal: Goal) {
    warm_up();
    let needed = bytes_needed(goal);
    assert!(needed > 0);

    let mut failures = 0;
    for budget in (0..needed).step_by(4) {
        let baseline = live_bytes();
        let mut pipeline = Pipeline::new(config(Some(budget)));
        let outcome = run(&mut pipeline, goal);

        match outcome {
            Err(err) => assert!(err.is_allocation_failure(), "budget {budget}: {err}"),
            Ok(_) => panic!("budget {budget} below the {needed} bytes {goal} needs succeeded"),
        }
        assert_eq!(pipeline.arena().live_allocations(), 0, "budget {budget}");
        assert!(pipeline.arena().is_retired(), "budget {budget}");
        assert_eq!(live_bytes(), baseline, "budget {budget}: heap bytes leaked");
        failures += 1;
    }
    assert!(failures > 1);

    let baseline = live_bytes();
    let mut pipeline = Pipeline::new(config(Some(needed)));
    assert!(run(&mut pipeline, goal).is_ok(), "exact budget must suffice");
    pipeline.finish();
    assert_eq!(live_bytes(), baseline);
}

// ─── tests ───────────────────────────────────────────────────────────────────

#[test]
fn test_symnmf_rollback_at_every_stage() {
    assert_every_budget_rolls_back(Goal::Symnmf);
}

#[test]
fn test_norm_rollback_at_every_stage() {
    assert_every_budget_rolls_back(Goal::Norm);
}

#[test]
fn test_ddg_rollback_at_every_stage() {
    assert_every_budget_rolls_back(Goal::Ddg);
}

#[test]
fn test_failure_after_successful_stages_frees_their_outputs() {
    warm_up();
    // Enough for everything up to the normalized matrix but not the
    // factorization working set.
    let norm_bytes = bytes_needed(Goal::Norm);
    let baseline = live_bytes();

    let mut pipeline = Pipeline::new(config(Some(norm_bytes)));
    let err = run(&mut pipeline, Goal::Symnmf).unwrap_err();
    assert!(matches!(err, Error::AllocationFailed { .. }));
    assert_eq!(pipeline.arena().stats().bytes_in_use, 0);
    assert_eq!(live_bytes(), baseline);
}

#[test]
fn test_retired_arena_refuses_further_work() {
    let mut pipeline = Pipeline::new(config(Some(0)));
    assert!(run(&mut pipeline, Goal::Sym).unwrap_err().is_allocation_failure());
    assert!(matches!(run(&mut pipeline, Goal::Sym), Err(Error::Retired)));
}

#[test]
fn test_reset_returns_heap_to_baseline() {
    warm_up();
    let mut pipeline = Pipeline::new(config(None));
    let baseline = live_bytes();
    run(&mut pipeline, Goal::Symnmf).unwrap();
    assert!(live_bytes() > baseline);
    pipeline.reset();
    assert_eq!(live_bytes(), baseline);
    run(&mut pipeline, Goal::Norm).unwrap();
    pipeline.finish();
    assert_eq!(live_bytes(), baseline);
}
