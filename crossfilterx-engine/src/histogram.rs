//! Per-dimension histogram storage and the direct/buffered/SIMD update
//! strategies that keep it in sync with row activation (§4.4).

/// A dimension's fine histogram, with an optional low-resolution coarse
/// companion. `back` mirrors `front` exactly; the spec (§9) permits dropping
/// it, but keeps it here to preserve the front/back shape for a future
/// atomic-swap protocol.
#[derive(Debug, Clone)]
pub struct Histogram {
    pub front: Vec<u32>,
    pub back: Vec<u32>,
    coarse: Option<CoarseHistogram>,
}

#[derive(Debug, Clone)]
struct CoarseHistogram {
    front: Vec<u32>,
    back: Vec<u32>,
    fine_bins: u32,
    coarse_bins: u32,
}

impl CoarseHistogram {
    /// §8 invariant 3 defines the mapping as `floor(b * Bc / B)`, which
    /// disagrees with §3's informal `b / ceil(B/Bc)` sketch whenever `B` is
    /// not a multiple of `Bc`. The testable invariant wins; see DESIGN.md.
    #[inline]
    fn coarse_index(&self, bin: u16) -> usize {
        (u64::from(bin) * u64::from(self.coarse_bins) / u64::from(self.fine_bins)) as usize
    }
}

impl Histogram {
    pub fn new(bin_count: usize, coarse_bins: Option<usize>) -> Self {
        let coarse = coarse_bins.map(|bc| CoarseHistogram {
            front: vec![0; bc],
            back: vec![0; bc],
            fine_bins: bin_count as u32,
            coarse_bins: bc as u32,
        });
        Self {
            front: vec![0; bin_count],
            back: vec![0; bin_count],
            coarse,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.front.len()
    }

    pub fn coarse_front(&self) -> Option<&[u32]> {
        self.coarse.as_ref().map(|c| c.front.as_slice())
    }

    pub fn coarse_bin_count(&self) -> Option<usize> {
        self.coarse.as_ref().map(|c| c.front.len())
    }

    pub fn zero(&mut self) {
        self.front.iter_mut().for_each(|c| *c = 0);
        self.back.iter_mut().for_each(|c| *c = 0);
        if let Some(coarse) = &mut self.coarse {
            coarse.front.iter_mut().for_each(|c| *c = 0);
            coarse.back.iter_mut().for_each(|c| *c = 0);
        }
    }

    pub fn active_count(&self) -> u64 {
        self.front.iter().map(|&c| u64::from(c)).sum()
    }

    /// Applies `delta` (`+1`/`-1`, but not restricted to unit steps) to
    /// `bin` in front, back, and the coarse companion, all in one step, as
    /// the Direct updater (§4.4).
    #[inline]
    pub fn apply_direct(&mut self, bin: u16, delta: i32) {
        apply_delta(&mut self.front[bin as usize], delta);
        apply_delta(&mut self.back[bin as usize], delta);
        if let Some(coarse) = &mut self.coarse {
            let c = coarse.coarse_index(bin);
            apply_delta(&mut coarse.front[c], delta);
            apply_delta(&mut coarse.back[c], delta);
        }
    }
}

#[inline]
fn apply_delta(counter: &mut u32, delta: i32) {
    if delta >= 0 {
        *counter += delta as u32;
    } else {
        *counter -= (-delta) as u32;
    }
}

/// Per-dimension local accumulator used by the Buffered and SIMD updater
/// variants: rows stream `+1`/`-1` into it, and a single flush pass later
/// folds the nonzero entries into the histogram.
#[derive(Debug, Clone)]
pub struct BufferedAccumulator {
    deltas: Vec<i32>,
}

impl BufferedAccumulator {
    pub fn new(bin_count: usize) -> Self {
        Self {
            deltas: vec![0; bin_count],
        }
    }

    #[inline]
    pub fn add(&mut self, bin: u16, delta: i32) {
        self.deltas[bin as usize] += delta;
    }

    /// Scalar flush, used for the Buffered strategy.
    pub fn flush_into(&mut self, histogram: &mut Histogram) {
        for (bin, d) in self.deltas.iter_mut().enumerate() {
            if *d != 0 {
                histogram.apply_direct(bin as u16, *d);
                *d = 0;
            }
        }
    }

    /// Chunked flush for the SIMD strategy. Processes four bins per
    /// iteration so the compiler has a straightforward loop to
    /// auto-vectorize; the observable result is identical to
    /// [`Self::flush_into`] (§9: "the observable result is mode-independent").
    pub fn flush_into_simd(&mut self, histogram: &mut Histogram) {
        let mut chunks = self.deltas.chunks_exact_mut(4);
        let mut bin = 0u16;
        for chunk in &mut chunks {
            for (offset, d) in chunk.iter_mut().enumerate() {
                if *d != 0 {
                    histogram.apply_direct(bin + offset as u16, *d);
                    *d = 0;
                }
            }
            bin += 4;
        }
        for d in chunks.into_remainder() {
            if *d != 0 {
                histogram.apply_direct(bin, *d);
                *d = 0;
            }
            bin += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramMode {
    Direct,
    Buffered,
    Auto,
    Simd,
}

impl Default for HistogramMode {
    fn default() -> Self {
        HistogramMode::Auto
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    Direct,
    Buffered,
    Simd,
}

/// Row-count threshold past which `Auto` mode buffers (§4.4).
pub const ROW_THRESH: u64 = 2_000_000;
/// Row·dimension work threshold past which `Auto` mode buffers (§4.4).
pub const WORK_THRESH: u64 = 12_000_000;

/// `shouldBuffer(mode, toggled, D)` (§4.4): true iff `mode` is `Buffered`, or
/// `mode` is `Auto` and either threshold is exceeded. Always false for
/// `Direct` or `Simd` — those modes have a fixed, not threshold-driven,
/// write strategy (see [`choose_strategy`]).
pub fn should_buffer(mode: HistogramMode, toggled: u64, dimension_count: u32) -> bool {
    match mode {
        HistogramMode::Buffered => true,
        HistogramMode::Direct | HistogramMode::Simd => false,
        HistogramMode::Auto => {
            toggled >= ROW_THRESH || toggled.saturating_mul(u64::from(dimension_count.max(1))) >= WORK_THRESH
        }
    }
}

/// Resolves a histogram mode and estimated operation size to a concrete
/// write strategy for one filter operation.
pub fn choose_strategy(mode: HistogramMode, toggled: u64, dimension_count: u32) -> WriteStrategy {
    if mode == HistogramMode::Simd {
        return WriteStrategy::Simd;
    }
    if should_buffer(mode, toggled, dimension_count) {
        WriteStrategy::Buffered
    } else {
        WriteStrategy::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_update_keeps_front_and_back_in_sync() {
        let mut h = Histogram::new(4, None);
        h.apply_direct(1, 3);
        h.apply_direct(1, -1);
        assert_eq!(h.front[1], 2);
        assert_eq!(h.back[1], 2);
    }

    #[test]
    fn coarse_mapping_follows_the_testable_invariant() {
        // B=8, Bc=4: floor(b*4/8) groups bins {0,1}->0 {2,3}->1 {4,5}->2 {6,7}->3
        let mut h = Histogram::new(8, Some(4));
        h.apply_direct(3, 1);
        h.apply_direct(5, 1);
        assert_eq!(h.coarse_front().unwrap(), &[0, 1, 1, 0]);
    }

    #[test]
    fn buffered_flush_matches_direct_result() {
        let mut direct = Histogram::new(6, None);
        direct.apply_direct(2, 1);
        direct.apply_direct(2, 1);
        direct.apply_direct(4, -1);

        let mut buffered_hist = Histogram::new(6, None);
        let mut acc = BufferedAccumulator::new(6);
        acc.add(2, 1);
        acc.add(2, 1);
        acc.add(4, -1);
        acc.flush_into(&mut buffered_hist);

        assert_eq!(direct.front, buffered_hist.front);
    }

    #[test]
    fn simd_flush_matches_scalar_flush() {
        let mut scalar_hist = Histogram::new(10, None);
        let mut simd_hist = Histogram::new(10, None);
        let mut acc_a = BufferedAccumulator::new(10);
        let mut acc_b = BufferedAccumulator::new(10);
        for (bin, delta) in [(0, 1), (3, 2), (7, -1), (9, 4)] {
            acc_a.add(bin, delta);
            acc_b.add(bin, delta);
        }
        acc_a.flush_into(&mut scalar_hist);
        acc_b.flush_into_simd(&mut simd_hist);
        assert_eq!(scalar_hist.front, simd_hist.front);
    }

    #[test]
    fn should_buffer_policy_matches_spec_contract() {
        assert!(!should_buffer(HistogramMode::Direct, u64::MAX, 64));
        assert!(!should_buffer(HistogramMode::Simd, u64::MAX, 64));
        assert!(should_buffer(HistogramMode::Buffered, 1, 1));
        assert!(should_buffer(HistogramMode::Auto, ROW_THRESH, 1));
        assert!(!should_buffer(HistogramMode::Auto, ROW_THRESH - 1, 1));
        assert!(should_buffer(HistogramMode::Auto, WORK_THRESH, 1));
    }

    #[test]
    fn choose_strategy_respects_simd_even_under_threshold() {
        assert_eq!(choose_strategy(HistogramMode::Simd, 1, 1), WriteStrategy::Simd);
        assert_eq!(choose_strategy(HistogramMode::Direct, u64::MAX, 64), WriteStrategy::Direct);
        assert_eq!(choose_strategy(HistogramMode::Auto, ROW_THRESH, 1), WriteStrategy::Buffered);
    }
}
