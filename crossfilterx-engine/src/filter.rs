//! Filter Engine (§4.6): range-diff delta updates, cleared-filter handling,
//! and the full recompute fallback. This module is the only caller of the
//! Row Activator and the only place that mutates `refcount` or a
//! dimension's `filter`/`csr` fields.

use tracing::{trace, warn};

use crate::activator;
use crate::common::{BinRange, DimId, RawRange};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::histogram::{choose_strategy, WriteStrategy};
use crate::planner::{ClearStrategy, PlannerContext};

/// `setFilter(d, new)` (§4.6). `new = None` clamps to [`clear_filter`]; a
/// `rangeMin > rangeMax` request is the documented "clamp and possibly
/// no-op" policy (§4.6/§7), implemented here by clamping both bounds into
/// `[0, B)` and then, if the range is still inverted, leaving the filter
/// untouched.
pub fn set_filter(engine: &mut Engine, dim_id: DimId, new: Option<RawRange>) -> EngineResult<()> {
    let max_bin = (engine.dimension(dim_id)?.bin_count() - 1) as u16;
    let new = match new {
        None => return clear_filter(engine, dim_id),
        Some(raw) => {
            let lo = raw.range_min.min(max_bin);
            let hi = raw.range_max.min(max_bin);
            if lo > hi {
                warn!(dim = dim_id.0, range_min = raw.range_min, range_max = raw.range_max, "ill-formed range, no-op");
                return Ok(());
            }
            BinRange::new(lo, hi)
        }
    };

    let idx = dim_id.index();
    let prev = engine.dimensions[idx].filter;

    if prev == Some(new) {
        return Ok(());
    }

    let Some(prev) = prev else {
        engine.dimensions[idx].filter = Some(new);
        trace!(dim = dim_id.0, lo = new.lo, hi = new.hi, "first filter on dimension, full recompute");
        full_recompute(engine);
        return Ok(());
    };

    let diff = diff_ranges(prev, new);
    let Some(diff) = diff else {
        return Ok(());
    };

    engine.dimensions[idx].filter = Some(new);
    ensure_csr(engine, dim_id)?;

    let csr = engine.dimensions[idx].csr.as_ref().expect("csr ensured above");
    let estimated_touched: u64 = diff
        .removed
        .iter()
        .chain(diff.added.iter())
        .map(|&[lo, hi]| u64::from(csr.count_in_range(lo, hi)))
        .sum();
    let strategy = choose_strategy(engine.config.histogram_mode, estimated_touched, engine.dimensions.len() as u32);

    let required = engine.active_filter_count();
    let mut touched = 0u64;
    for &[lo, hi] in &diff.removed {
        touched += apply_range_delta(engine, idx, lo, hi, -1, required, strategy);
    }
    for &[lo, hi] in &diff.added {
        touched += apply_range_delta(engine, idx, lo, hi, 1, required, strategy);
    }
    activator::flush(engine, strategy);

    trace!(dim = dim_id.0, touched, ?strategy, "delta setFilter applied");
    Ok(())
}

/// `clearFilter(d)` (§4.6). A dimension with no filter is a degenerate case
/// that falls straight through to full recompute.
pub fn clear_filter(engine: &mut Engine, dim_id: DimId) -> EngineResult<()> {
    let idx = dim_id.index();
    let Some(prev) = engine.dimension(dim_id)?.filter else {
        trace!(dim = dim_id.0, "clearFilter on unfiltered dimension, full recompute");
        full_recompute(engine);
        return Ok(());
    };

    ensure_csr(engine, dim_id)?;
    let max_bin = (engine.dimensions[idx].bin_count() - 1) as u16;
    let rmin = prev.lo.min(max_bin);
    let rmax = prev.hi.min(max_bin);

    let csr = engine.dimensions[idx].csr.as_ref().expect("csr ensured above");
    let inside = u64::from(csr.count_in_range(rmin, rmax));
    let outside = engine.row_count as u64 - inside;

    let other_filters = engine
        .dimensions
        .iter()
        .enumerate()
        .filter(|(i, d)| *i != idx && d.filter.is_some())
        .count() as u32;

    let ctx = PlannerContext {
        inside_count: inside,
        outside_count: outside,
        total_rows: engine.row_count as u64,
        histogram_count: engine.dimensions.len() as u32,
        other_filters,
        active_count: engine.active_count,
    };
    let strategy = engine.planner.choose(ctx);

    let start = std::time::Instant::now();
    engine.dimensions[idx].filter = None;

    let (inside_ms, outside_ms, buffered) = match strategy {
        ClearStrategy::Recompute => {
            full_recompute(engine);
            (0.0, 0.0, false)
        }
        ClearStrategy::Delta => {
            let required = engine.active_filter_count();
            let write_strategy = choose_strategy(
                engine.config.histogram_mode,
                inside + outside,
                engine.dimensions.len() as u32,
            );

            let inside_start = std::time::Instant::now();
            apply_clear_delta_inside(engine, idx, rmin, rmax, required, write_strategy);
            let inside_ms = inside_start.elapsed().as_secs_f64() * 1000.0;

            let outside_start = std::time::Instant::now();
            apply_clear_delta_outside(engine, idx, rmin, rmax, max_bin, required, write_strategy);
            let outside_ms = outside_start.elapsed().as_secs_f64() * 1000.0;

            activator::flush(engine, write_strategy);
            (inside_ms, outside_ms, write_strategy != WriteStrategy::Direct)
        }
    };

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    engine.planner.record(strategy, elapsed_ms, inside + outside);
    engine.last_clear = Some(crate::profile::ClearProfile {
        fallback: strategy == ClearStrategy::Recompute,
        inside_rows: inside,
        outside_rows: outside,
        inside_ms,
        outside_ms,
        total_ms: elapsed_ms,
        outside_fraction: outside as f64 / (engine.row_count.max(1) as f64),
        range_bins: u32::from(rmax - rmin) + 1,
        buffered,
    });
    trace!(dim = dim_id.0, ?strategy, inside, outside, elapsed_ms, "clearFilter applied");
    Ok(())
}

/// Scans `[lo, hi]` via the dimension's CSR index, applying `delta` to each
/// visited row's refcount and activating/deactivating it when its refcount
/// crosses `required`. Used by the delta leg of `setFilter`.
fn apply_range_delta(
    engine: &mut Engine,
    dim_idx: usize,
    lo: u16,
    hi: u16,
    delta: i32,
    required: u32,
    strategy: WriteStrategy,
) -> u64 {
    let rows: Vec<u32> = engine.dimensions[dim_idx]
        .csr
        .as_ref()
        .expect("csr ensured by caller")
        .rows_in_range(lo, hi)
        .to_vec();
    for &row in &rows {
        let r = row as usize;
        let was_active = engine.active_mask.get(r);
        if delta >= 0 {
            engine.refcount[r] += delta as u32;
        } else {
            engine.refcount[r] -= (-delta) as u32;
        }
        let is_active = engine.refcount[r] == required;
        toggle_if_needed(engine, row, was_active, is_active, strategy);
    }
    rows.len() as u64
}

/// The clear-filter delta path's inside-range leg (§4.6): rows within the
/// lifted range lose a satisfied filter (`delta = -1`).
fn apply_clear_delta_inside(
    engine: &mut Engine,
    dim_idx: usize,
    rmin: u16,
    rmax: u16,
    required_after: u32,
    strategy: WriteStrategy,
) {
    let csr = engine.dimensions[dim_idx].csr.as_ref().expect("csr ensured by caller");
    let inside_rows: Vec<u32> = csr.rows_in_range(rmin, rmax).to_vec();

    for &row in &inside_rows {
        let r = row as usize;
        let was_active = engine.active_mask.get(r);
        let next = engine.refcount[r].saturating_sub(1);
        engine.refcount[r] = next;
        let is_active = next == required_after;
        toggle_if_needed(engine, row, was_active, is_active, strategy);
    }
}

/// The clear-filter delta path's outside-range leg (§4.6): rows outside the
/// lifted range keep their refcount but may newly qualify now that one fewer
/// filter is required.
fn apply_clear_delta_outside(
    engine: &mut Engine,
    dim_idx: usize,
    rmin: u16,
    rmax: u16,
    max_bin: u16,
    required_after: u32,
    strategy: WriteStrategy,
) {
    let mut outside_ranges: Vec<(u16, u16)> = Vec::with_capacity(2);
    if rmin > 0 {
        outside_ranges.push((0, rmin - 1));
    }
    if rmax < max_bin {
        outside_ranges.push((rmax + 1, max_bin));
    }
    for (lo, hi) in outside_ranges {
        let csr = engine.dimensions[dim_idx].csr.as_ref().expect("csr ensured by caller");
        let rows: Vec<u32> = csr.rows_in_range(lo, hi).to_vec();
        for &row in &rows {
            let r = row as usize;
            let was_active = engine.active_mask.get(r);
            let next = engine.refcount[r];
            let is_active = next == required_after;
            toggle_if_needed(engine, row, was_active, is_active, strategy);
        }
    }
}

#[inline]
fn toggle_if_needed(engine: &mut Engine, row: u32, was_active: bool, is_active: bool, strategy: WriteStrategy) {
    if !was_active && is_active {
        activator::activate(engine, row, strategy);
    } else if was_active && !is_active {
        activator::deactivate(engine, row, strategy);
    }
}

/// Full Recompute (§4.7): zero every histogram, coarse histogram, reduction,
/// refcount, and active-mask bit, then re-derive everything by scanning
/// every row against every active filter once.
pub fn full_recompute(engine: &mut Engine) {
    for dim in engine.dimensions.iter_mut() {
        dim.histogram.zero();
        if let Some(reduction) = &mut dim.reduction {
            reduction.zero();
        }
    }
    engine.active_mask.clear_all();
    engine.refcount.iter_mut().for_each(|r| *r = 0);
    engine.active_count = 0;

    let required = engine.active_filter_count();
    let filters: Vec<Option<BinRange>> = engine.dimensions.iter().map(|d| d.filter).collect();
    let columns: Vec<&[u16]> = engine.dimensions.iter().map(|d| d.column.as_slice()).collect();

    let row_count = engine.row_count;
    let mut satisfied_per_row = vec![0u32; row_count];
    for row in 0..row_count {
        let mut satisfied = 0u32;
        for (dim_idx, filter) in filters.iter().enumerate() {
            if let Some(range) = filter {
                let bin = columns[dim_idx][row];
                if bin >= range.lo && bin <= range.hi {
                    satisfied += 1;
                }
            }
        }
        satisfied_per_row[row] = satisfied;
    }

    for row in 0..row_count {
        engine.refcount[row] = satisfied_per_row[row];
        if satisfied_per_row[row] == required {
            activator::activate(engine, row as u32, WriteStrategy::Direct);
        }
    }

    trace!(row_count, active = engine.active_count, "full recompute complete");
}

fn ensure_csr(engine: &mut Engine, dim_id: DimId) -> EngineResult<()> {
    engine.ensure_csr(dim_id).map(|_| ())
}

/// Up to two `[lo, hi]` sub-ranges on the bin axis.
#[derive(Debug, Clone, Default)]
pub struct RangeDiff {
    pub added: Vec<[u16; 2]>,
    pub removed: Vec<[u16; 2]>,
}

/// Symmetric difference of two inclusive intervals (§4.6). Returns `None`
/// iff `prev == next`.
pub fn diff_ranges(prev: BinRange, next: BinRange) -> Option<RangeDiff> {
    if prev == next {
        return None;
    }
    let mut diff = RangeDiff::default();

    // Portion of `prev` not covered by `next` is removed; portion of `next`
    // not covered by `prev` is added. Each side of a one-dimensional
    // interval subtraction yields at most two surviving sub-intervals: the
    // part below the overlap and the part above it.
    subtract_into(prev, next, &mut diff.removed);
    subtract_into(next, prev, &mut diff.added);

    Some(diff)
}

/// Pushes the sub-ranges of `a` that fall outside `b` into `out`.
fn subtract_into(a: BinRange, b: BinRange, out: &mut Vec<[u16; 2]>) {
    if a.hi < b.lo || a.lo > b.hi {
        out.push([a.lo, a.hi]);
        return;
    }
    if a.lo < b.lo {
        out.push([a.lo, b.lo - 1]);
    }
    if a.hi > b.hi {
        out.push([b.hi + 1, a.hi]);
    }
}
