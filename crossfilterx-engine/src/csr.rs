//! Compressed Sparse Row index over one dimension's quantized column,
//! giving O(touched) range scans instead of O(N) per filter change (§4.3).

/// `{rowIdsByBin, binOffsets}` built by a two-pass counting sort. Built
/// lazily on first use and never rebuilt (§3 "Lifecycles").
#[derive(Debug, Clone)]
pub struct CsrIndex {
    row_ids_by_bin: Vec<u32>,
    bin_offsets: Vec<u32>,
}

impl CsrIndex {
    /// O(N+B): count occurrences per bin, prefix-sum into offsets, then
    /// scatter row ids using a per-bin write cursor.
    pub fn build(column: &[u16], bin_count: usize) -> Self {
        let mut offsets = vec![0u32; bin_count + 1];
        for &bin in column {
            offsets[bin as usize + 1] += 1;
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }

        let mut cursor = offsets.clone();
        let mut row_ids_by_bin = vec![0u32; column.len()];
        for (row, &bin) in column.iter().enumerate() {
            let pos = &mut cursor[bin as usize];
            row_ids_by_bin[*pos as usize] = row as u32;
            *pos += 1;
        }

        Self {
            row_ids_by_bin,
            bin_offsets: offsets,
        }
    }

    pub fn bin_offsets(&self) -> &[u32] {
        &self.bin_offsets
    }

    /// Count of rows whose bin falls in `[lo, hi]`, read directly off
    /// `binOffsets` without touching `rowIdsByBin`.
    pub fn count_in_range(&self, lo: u16, hi: u16) -> u32 {
        self.bin_offsets[hi as usize + 1] - self.bin_offsets[lo as usize]
    }

    /// Row ids whose bin falls in `[lo, hi]`. Rows within a bin are
    /// contiguous in `rowIdsByBin` by construction, and bins are laid out in
    /// ascending order, so a range of bins is itself one contiguous slice.
    pub fn rows_in_range(&self, lo: u16, hi: u16) -> &[u32] {
        let start = self.bin_offsets[lo as usize] as usize;
        let end = self.bin_offsets[hi as usize + 1] as usize;
        &self.row_ids_by_bin[start..end]
    }
}
