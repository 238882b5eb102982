//! A single dimension: its quantizer, quantized column, histogram, filter
//! state, lazily-built CSR index, and optional reduction (§3, §4.11).

use crate::common::{BinRange, DimId};
use crate::csr::CsrIndex;
use crate::histogram::Histogram;
use crate::quantizer::{Dictionary, QuantizeScale};
use crate::reduction::Reduction;

/// §4.11: `Unindexed -> Indexed` is a one-way transition taken the first
/// time a range operation touches the dimension (or on explicit
/// `BUILD_INDEX`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionState {
    Unindexed,
    Indexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimKind {
    Numeric,
    Categorical,
}

/// How a dimension maps raw values to bin indices.
#[derive(Debug, Clone)]
pub enum Quantizer {
    Numeric(QuantizeScale),
    Categorical(Dictionary),
}

impl Quantizer {
    pub fn kind(&self) -> DimKind {
        match self {
            Quantizer::Numeric(_) => DimKind::Numeric,
            Quantizer::Categorical(_) => DimKind::Categorical,
        }
    }
}

/// Dimension declaration at ingest or `ADD_DIMENSION` time (§6 `DimSpec`).
#[derive(Debug, Clone)]
pub struct DimSpec {
    pub name: String,
    pub kind: DimKind,
    pub bits: u8,
    pub coarse_target_bins: Option<u16>,
}

pub struct Dimension {
    pub id: DimId,
    pub name: String,
    pub column: Vec<u16>,
    pub quantizer: Quantizer,
    pub histogram: Histogram,
    pub filter: Option<BinRange>,
    pub csr: Option<CsrIndex>,
    pub state: DimensionState,
    pub reduction: Option<Reduction>,
}

impl Dimension {
    pub fn bin_count(&self) -> usize {
        match &self.quantizer {
            Quantizer::Numeric(scale) => scale.bin_count(),
            Quantizer::Categorical(dict) => dict.bin_count(),
        }
    }

    pub fn kind(&self) -> DimKind {
        self.quantizer.kind()
    }

    /// §4.10: reconstructs a human-meaningful label for a bin, used by the
    /// Top-K engine's output.
    pub fn value_label(&self, bin: u16) -> ValueLabel {
        match &self.quantizer {
            Quantizer::Numeric(scale) => ValueLabel::Numeric(scale.value_at(bin)),
            Quantizer::Categorical(dict) => match dict.label_for(bin) {
                Some(label) => ValueLabel::Category(label.to_string()),
                None => ValueLabel::Index(bin),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueLabel {
    Index(u16),
    Numeric(f64),
    Category(String),
}
