//! Maps raw numeric or categorical values to fixed-width bin indices (§4.1).

use ahash::RandomState;
use hashbrown::HashMap;

pub const MAX_BITS: u8 = 16;

/// Affine min/max scale for a numeric dimension.
///
/// `quantize(v) = round((clamp(v, min, max) - min) * invSpan)`. A degenerate
/// span (`min == max`, or either bound non-finite) falls back to the
/// `{0, binCount}` domain described in §4.1 and always quantizes to bin 0.
#[derive(Debug, Clone, Copy)]
pub struct QuantizeScale {
    min: f64,
    max: f64,
    bits: u8,
    range: f64,
    inv_span: f64,
    degenerate: bool,
}

impl QuantizeScale {
    pub fn new(min: f64, max: f64, bits: u8) -> Self {
        let bits = bits.clamp(1, MAX_BITS);
        let range = f64::from((1u32 << bits) - 1);
        let span = max - min;
        let degenerate = !min.is_finite() || !max.is_finite() || span <= 0.0;
        let (min, max, inv_span) = if degenerate {
            (0.0, f64::from(1u32 << bits), 0.0)
        } else {
            (min, max, range / span)
        };
        Self {
            min,
            max,
            bits,
            range,
            inv_span,
            degenerate,
        }
    }

    /// Infers a scale from one pass over `values`, skipping non-finite
    /// entries, per §4.1.
    pub fn infer(values: impl IntoIterator<Item = f64>, bits: u8) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
        Self::new(min, max, bits)
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn bin_count(&self) -> usize {
        1usize << self.bits
    }

    pub fn quantize(&self, v: f64) -> u16 {
        if self.degenerate {
            return 0;
        }
        let clamped = v.clamp(self.min, self.max);
        let scaled = (clamped - self.min) * self.inv_span;
        scaled.round().clamp(0.0, self.range) as u16
    }

    /// Reconstructs the approximate value represented by `bin`, for Top-K
    /// labelling (§4.10).
    pub fn value_at(&self, bin: u16) -> f64 {
        if self.degenerate || self.inv_span == 0.0 {
            return self.min;
        }
        self.min + f64::from(bin) / self.inv_span
    }
}

/// Dictionary mapping distinct labels to codes in `[0, B)`, built
/// progressively as labels are interned. The last code, `B-1`, is the
/// overflow/fallback bin.
#[derive(Debug, Clone)]
pub struct Dictionary {
    codes: HashMap<Box<str>, u16, RandomState>,
    labels: Vec<Box<str>>,
    bin_count: usize,
    fallback_bin: u16,
}

impl Dictionary {
    pub fn new(bits: u8) -> Self {
        let bits = bits.clamp(1, MAX_BITS);
        let bin_count = 1usize << bits;
        Self {
            codes: HashMap::with_hasher(RandomState::new()),
            labels: Vec::new(),
            bin_count,
            fallback_bin: (bin_count - 1) as u16,
        }
    }

    /// Interns `label`, returning its code. Known labels return their
    /// existing code; new labels are assigned the next free code until the
    /// dictionary is full, after which they collapse into the fallback bin.
    pub fn intern(&mut self, label: &str) -> u16 {
        if let Some(&code) = self.codes.get(label) {
            return code;
        }
        if self.labels.len() >= self.bin_count - 1 {
            self.codes.insert(label.into(), self.fallback_bin);
            return self.fallback_bin;
        }
        let code = self.labels.len() as u16;
        self.labels.push(label.into());
        self.codes.insert(label.into(), code);
        code
    }

    /// Looks up a label without interning it; unknown labels map to the
    /// fallback bin.
    pub fn lookup(&self, label: &str) -> u16 {
        self.codes.get(label).copied().unwrap_or(self.fallback_bin)
    }

    pub fn label_for(&self, bin: u16) -> Option<&str> {
        self.labels.get(bin as usize).map(Box::as_ref)
    }

    pub fn fallback_bin(&self) -> u16 {
        self.fallback_bin
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Rebuilds a dictionary from a known label list, in code order, for
    /// `ADD_DIMENSION` messages that supply pre-computed codes alongside
    /// their labels (§6 `ADD_DIMENSION { labels?, fallback }`).
    pub fn from_labels(labels: Vec<String>, bits: u8) -> Self {
        let mut dict = Self::new(bits);
        for label in labels {
            let code = dict.labels.len() as u16;
            if code >= dict.fallback_bin {
                break;
            }
            dict.codes.insert(label.clone().into_boxed_str(), code);
            dict.labels.push(label.into_boxed_str());
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_matches_scenario_s1() {
        let scale = QuantizeScale::infer([1.0, 2.0, 3.0, 4.0], 4);
        assert_eq!(scale.quantize(1.0), 0);
        assert_eq!(scale.quantize(2.0), 5);
        assert_eq!(scale.quantize(3.0), 10);
        assert_eq!(scale.quantize(4.0), 15);
    }

    #[test]
    fn quantize_clamps_out_of_domain_values() {
        let scale = QuantizeScale::new(0.0, 10.0, 4);
        assert_eq!(scale.quantize(-5.0), scale.quantize(0.0));
        assert_eq!(scale.quantize(50.0), scale.quantize(10.0));
    }

    #[test]
    fn degenerate_span_quantizes_to_zero() {
        let scale = QuantizeScale::new(5.0, 5.0, 4);
        assert_eq!(scale.quantize(5.0), 0);
        assert_eq!(scale.quantize(100.0), 0);

        let nan_scale = QuantizeScale::new(f64::NAN, 1.0, 4);
        assert_eq!(nan_scale.quantize(1.0), 0);
    }

    #[test]
    fn dictionary_overflow_collapses_to_fallback() {
        let mut dict = Dictionary::new(1); // bin_count = 2, one real code + fallback
        let a = dict.intern("a");
        let b = dict.intern("b");
        assert_eq!(a, 0);
        assert_eq!(b, dict.fallback_bin());
        assert_eq!(dict.lookup("unseen"), dict.fallback_bin());
        assert_eq!(dict.intern("a"), a);
    }

    #[test]
    fn label_for_round_trips_interned_labels() {
        let mut dict = Dictionary::new(4);
        let code = dict.intern("red");
        assert_eq!(dict.label_for(code), Some("red"));
    }

    #[test]
    fn from_labels_preserves_code_order() {
        let dict = Dictionary::from_labels(vec!["red".into(), "green".into(), "blue".into()], 4);
        assert_eq!(dict.lookup("red"), 0);
        assert_eq!(dict.lookup("green"), 1);
        assert_eq!(dict.lookup("blue"), 2);
        assert_eq!(dict.label_for(0), Some("red"));
    }
}
