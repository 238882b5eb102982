//! The wire message protocol (§6): what crosses the boundary between the
//! orchestrating thread and this worker. Every inbound/outbound shape here
//! is `serde`-derived so the worker can sit behind any transport the
//! embedding application chooses (a channel, a socket, a WASM
//! `postMessage` bridge) without this crate knowing which.

use serde::{Deserialize, Serialize};

/// `DimSpec` (§6): a dimension declaration at ingest or `ADD_DIMENSION`
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDimSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WireDimKind,
    pub bits: u8,
    pub coarse_target_bins: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireDimKind {
    Number,
    String,
}

/// `ADD_DIMENSION { scale? }` (§6): an explicit numeric domain for a
/// pre-quantized column, bypassing the one-pass min/max inference §4.1
/// normally performs at ingest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireScale {
    pub min: f64,
    pub max: f64,
}

/// One column of an ingest payload: raw, not-yet-quantized values. Numeric
/// columns carry `f64`; categorical columns carry their raw labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireColumnData {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireColumn {
    pub name: String,
    pub data: WireColumnData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCategory {
    pub name: String,
    pub labels: Vec<String>,
}

/// `ColumnarPayload` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnarPayload {
    pub row_count: usize,
    pub columns: Vec<WireColumn>,
    #[serde(default)]
    pub categories: Option<Vec<WireCategory>>,
}

/// One row of a row-oriented ingest payload: a flat map from dimension name
/// to raw value.
pub type WireRow = std::collections::BTreeMap<String, serde_json::Value>;

/// `INGEST { rows: RowOriented | ColumnarPayload }` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngestRows {
    RowOriented(Vec<WireRow>),
    Columnar(ColumnarPayload),
}

/// `GroupSnapshot` (§6). `bins`/`coarse_bins`/`sum` are owned copies of the
/// engine's current front buffers at the moment the frame was built; see
/// DESIGN.md for why this crate renders §5's "stable shared-buffer
/// reference" as an owned snapshot rather than a literal shared-memory
/// handle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    pub id: u32,
    pub bins: Vec<u32>,
    pub bin_count: usize,
    pub count: u64,
    pub coarse_bins: Option<Vec<u32>>,
    pub coarse_bin_count: Option<usize>,
    pub sum: Option<Vec<f64>>,
}

/// `FRAME.profile.clear` (§6 CLI/env surface: profiling flag).
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearProfile {
    pub fallback: bool,
    pub inside_rows: u64,
    pub outside_rows: u64,
    pub inside_ms: f64,
    pub outside_ms: f64,
    pub total_ms: f64,
    pub outside_fraction: f64,
    pub range_bins: u32,
    pub buffered: bool,
}

/// `PLANNER { snapshot }` (§6, §4.8).
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerSnapshotWire {
    pub delta_cost_per_row: Option<f64>,
    pub recompute_cost_per_row: Option<f64>,
    pub delta_count: u64,
    pub recompute_count: u64,
    pub delta_total_ms: f64,
    pub recompute_total_ms: f64,
}

impl From<crossfilterx_engine::PlannerSnapshot> for PlannerSnapshotWire {
    fn from(s: crossfilterx_engine::PlannerSnapshot) -> Self {
        Self {
            delta_cost_per_row: s.delta_cost_per_row,
            recompute_cost_per_row: s.recompute_cost_per_row,
            delta_count: s.delta_count,
            recompute_count: s.recompute_count,
            delta_total_ms: s.delta_total_ms,
            recompute_total_ms: s.recompute_total_ms,
        }
    }
}

/// `TOP_K_RESULT` entry (§4.10): a bin's count plus its human-meaningful
/// label, which is either the reconstructed numeric value or a category
/// label.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "labelKind")]
pub enum WireValueLabel {
    Index { bin: u16 },
    Numeric { value: f64 },
    Category { label: String },
}

impl From<crossfilterx_engine::ValueLabel> for WireValueLabel {
    fn from(label: crossfilterx_engine::ValueLabel) -> Self {
        match label {
            crossfilterx_engine::ValueLabel::Index(bin) => WireValueLabel::Index { bin },
            crossfilterx_engine::ValueLabel::Numeric(value) => WireValueLabel::Numeric { value },
            crossfilterx_engine::ValueLabel::Category(label) => WireValueLabel::Category { label },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopKEntryWire {
    pub bin: u16,
    pub count: u32,
    pub label: WireValueLabel,
}

/// Inbound messages (§6), tagged on `type` exactly as the wire protocol
/// names them.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    Ingest {
        schema: Vec<WireDimSpec>,
        rows: IngestRows,
        #[serde(default, rename = "valueColumnNames")]
        value_column_names: Option<Vec<String>>,
    },
    BuildIndex {
        #[serde(rename = "dimId")]
        dim_id: u32,
    },
    FilterSet {
        #[serde(rename = "dimId")]
        dim_id: u32,
        #[serde(rename = "rangeMin")]
        range_min: u16,
        #[serde(rename = "rangeMax")]
        range_max: u16,
        seq: u64,
    },
    FilterClear {
        #[serde(rename = "dimId")]
        dim_id: u32,
        seq: u64,
    },
    AddDimension {
        name: String,
        kind: WireDimKind,
        bits: u8,
        column: Vec<u16>,
        scale: Option<WireScale>,
        labels: Option<Vec<String>>,
        #[serde(default)]
        fallback: Option<u16>,
        #[serde(default, rename = "coarseTargetBins")]
        coarse_target_bins: Option<u16>,
    },
    GroupSetReduction {
        #[serde(rename = "dimId")]
        dim_id: u32,
        reduction: ReductionKind,
        #[serde(rename = "valueColumn")]
        value_column: Vec<f32>,
        seq: u64,
    },
    GroupTopK {
        #[serde(rename = "dimId")]
        dim_id: u32,
        k: usize,
        #[serde(rename = "isBottom")]
        is_bottom: bool,
        seq: u64,
    },
    RequestPlanner,
    Estimate,
    Swap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionKind {
    Sum,
}

/// Outbound messages (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    Ready {
        #[serde(rename = "rowCount")]
        row_count: usize,
        groups: Vec<GroupSnapshot>,
    },
    Frame {
        seq: u64,
        #[serde(rename = "activeCount")]
        active_count: u64,
        groups: Vec<GroupSnapshot>,
        profile: Option<ClearProfile>,
    },
    IndexBuilt {
        #[serde(rename = "dimId")]
        dim_id: u32,
        ms: f64,
        bytes: usize,
    },
    DimensionAdded {
        #[serde(rename = "dimId")]
        dim_id: u32,
    },
    TopKResult {
        seq: u64,
        #[serde(rename = "dimId")]
        dim_id: u32,
        entries: Vec<TopKEntryWire>,
    },
    Planner {
        snapshot: PlannerSnapshotWire,
    },
    Progress {
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
}
