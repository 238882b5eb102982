//! Bounded-heap Top-K over a histogram (§4.10).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::dimension::{Dimension, ValueLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKEntry {
    pub bin: u16,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopKResultEntry {
    pub bin: u16,
    pub count: u32,
    pub label: ValueLabel,
}

/// One O(B log k) pass through a size-`k` bounded heap. Ties between equal
/// counts are broken by bin index, in the same direction as the primary
/// sort (ascending keeps the lower bin first, descending keeps the higher
/// bin first) — this is the ordering `top`/`bottom` must produce per §8.S6.
pub fn top_k(histogram: &[u32], k: usize, ascending: bool) -> Vec<TopKEntry> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<HeapItem> = BinaryHeap::with_capacity(k + 1);
    for (bin, &count) in histogram.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let candidate = (count, bin as u16);
        if heap.len() < k {
            heap.push(HeapItem { key: candidate, ascending });
        } else if let Some(worst) = heap.peek() {
            let keep_new = if ascending {
                candidate < worst.key
            } else {
                candidate > worst.key
            };
            if keep_new {
                heap.pop();
                heap.push(HeapItem { key: candidate, ascending });
            }
        }
    }

    let mut out: Vec<TopKEntry> = heap
        .into_iter()
        .map(|item| TopKEntry {
            bin: item.key.1,
            count: item.key.0,
        })
        .collect();

    if ascending {
        out.sort_by_key(|e| (e.count, e.bin));
    } else {
        out.sort_by_key(|e| std::cmp::Reverse((e.count, e.bin)));
    }
    out
}

/// Resolves each bin to a human-meaningful label using the owning
/// dimension's quantizer, per §4.10's "emits ... the dimension's numeric
/// value ... or category labels" requirement.
pub fn top_k_labelled(dimension: &Dimension, k: usize, ascending: bool) -> Vec<TopKResultEntry> {
    top_k(&dimension.histogram.front, k, ascending)
        .into_iter()
        .map(|entry| TopKResultEntry {
            bin: entry.bin,
            count: entry.count,
            label: dimension.value_label(entry.bin),
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct HeapItem {
    key: (u32, u16),
    ascending: bool,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // `BinaryHeap` is a max-heap; we want `peek`/`pop` to surface the
        // "worst currently kept" item so it can be evicted in favor of a
        // better candidate. For bottom-k (ascending) the worst kept is the
        // largest key, so natural ordering works. For top-k (descending)
        // the worst kept is the smallest key, so the comparison is flipped.
        if self.ascending {
            self.key.cmp(&other.key)
        } else {
            other.key.cmp(&self.key)
        }
    }
}
