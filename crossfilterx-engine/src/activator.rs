//! Row Activator (§4.5): the single writer of the active mask, every
//! dimension's histogram, and every configured reduction. Nothing else in
//! the crate is allowed to flip a mask bit or touch a histogram counter
//! directly.

use crate::engine::Engine;
use crate::histogram::WriteStrategy;

pub fn activate(engine: &mut Engine, row: u32, strategy: WriteStrategy) {
    toggle(engine, row, 1, strategy);
}

pub fn deactivate(engine: &mut Engine, row: u32, strategy: WriteStrategy) {
    toggle(engine, row, -1, strategy);
}

fn toggle(engine: &mut Engine, row: u32, sign: i32, strategy: WriteStrategy) {
    let r = row as usize;
    debug_assert!(
        engine.active_mask.get(r) != (sign > 0),
        "activator asked to move a row into the state it is already in"
    );
    engine.active_mask.set(r, sign > 0);

    if strategy == WriteStrategy::Buffered || strategy == WriteStrategy::Simd {
        let accumulators = engine.ensure_accumulators();
        for (dim, acc) in engine.dimensions.iter().zip(accumulators.iter_mut()) {
            acc.add(dim.column[r], sign);
        }
    } else {
        for dim in engine.dimensions.iter_mut() {
            let bin = dim.column[r];
            dim.histogram.apply_direct(bin, sign);
        }
    }

    for dim in engine.dimensions.iter_mut() {
        if let Some(reduction) = &mut dim.reduction {
            let bin = dim.column[r];
            reduction.apply(bin, r, sign);
        }
    }

    if sign > 0 {
        engine.active_count += 1;
    } else {
        engine.active_count -= 1;
    }
}

/// Flushes any pending buffered/SIMD deltas into the real histograms. A
/// no-op when the last operation used the direct strategy (the accumulator
/// pool is never even allocated in that case).
pub fn flush(engine: &mut Engine, strategy: WriteStrategy) {
    if strategy == WriteStrategy::Direct {
        return;
    }
    if let Some(accumulators) = engine.accumulators.as_mut() {
        for (dim, acc) in engine.dimensions.iter_mut().zip(accumulators.iter_mut()) {
            match strategy {
                WriteStrategy::Simd => acc.flush_into_simd(&mut dim.histogram),
                _ => acc.flush_into(&mut dim.histogram),
            }
        }
    }
}
