//! The single-worker multi-dimensional filter/histogram engine.
//!
//! This crate owns the quantized columnar data model, the CSR range index,
//! the delta-vs-recompute filter engine and its adaptive clear planner, the
//! histogram update machinery, and the per-group sum reduction. It has no
//! knowledge of wire formats or message framing — see `crossfilterx-worker`
//! for the protocol boundary that wraps an [`Engine`].

pub mod activator;
pub mod common;
pub mod csr;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod filter;
pub mod histogram;
pub mod layout;
pub mod planner;
pub mod profile;
pub mod quantizer;
pub mod reduction;
pub mod topk;

pub use common::{BinRange, DimId, RawRange};
pub use dimension::{DimKind, DimSpec, Dimension, Quantizer, ValueLabel};
pub use engine::{Engine, EngineConfig, RawColumn};
pub use error::{EngineError, EngineResult};
pub use filter::{clear_filter, diff_ranges, full_recompute, set_filter, RangeDiff};
pub use histogram::HistogramMode;
pub use planner::{ClearStrategy, PlannerSnapshot};
pub use profile::ClearProfile;
pub use quantizer::{Dictionary, QuantizeScale};
pub use topk::{top_k, top_k_labelled, TopKEntry, TopKResultEntry};
