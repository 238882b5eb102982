//! The Protocol Dispatcher (§2 component #11, §6): translates one
//! [`InboundMessage`] into one [`OutboundMessage`], driving a single
//! [`Engine`] underneath. `Worker` is synchronous and owns no threads itself
//! — see `lib.rs` for the `crossbeam-channel` loop that wraps it.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{error, trace};

use crossfilterx_engine::{
    clear_filter, set_filter, top_k_labelled, DimId, DimKind, DimSpec, Dimension, Engine, Quantizer, QuantizeScale,
    RawColumn, RawRange,
};
use crossfilterx_engine::{Dictionary, EngineError};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::protocol::{
    ClearProfile, ColumnarPayload, GroupSnapshot, InboundMessage, IngestRows, OutboundMessage, PlannerSnapshotWire,
    TopKEntryWire, WireColumn, WireColumnData, WireDimKind, WireDimSpec, WireRow, WireValueLabel,
};

/// Owns the engine instance across its lifetime, from `INGEST` (which
/// creates it) through every later message. `value_columns` is a convenience
/// cache of the raw f32 columns named by `INGEST`'s `valueColumnNames`, so a
/// later `GROUP_SET_REDUCTION` does not have to re-transmit data the
/// orchestrator already sent once; an explicit non-empty `valueColumn` on
/// that message always takes precedence over the cache. See DESIGN.md.
pub struct Worker {
    config: WorkerConfig,
    engine: Option<Engine>,
    value_columns: BTreeMap<String, Vec<f32>>,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            engine: None,
            value_columns: BTreeMap::new(),
        }
    }

    /// Dispatches one inbound message, returning the single outbound reply
    /// it produces (§6: every message yields exactly one typed reply). When
    /// the worker's debug-logging flag is on, a `tracing::Span` carrying the
    /// message's `seq` (for the messages that carry one) is entered around
    /// the dispatch, so structured log output can be correlated back to a
    /// particular `FRAME`/`TOP_K_RESULT` reply without re-deriving it from
    /// the reply payload. The flag never gates whether `tracing` events fire
    /// at all — that is `tracing`'s own level filter's job (§1).
    pub fn handle(&mut self, message: InboundMessage) -> OutboundMessage {
        if self.config.is_debug_logging() {
            if let Some(seq) = message_seq(&message) {
                let span = tracing::debug_span!("dispatch", seq);
                let _enter = span.enter();
                return self.handle_inner(message);
            }
        }
        self.handle_inner(message)
    }

    /// Decodes a raw JSON message and dispatches it (§6: the protocol is
    /// transport-agnostic; this is the entry point for callers that hold raw
    /// bytes rather than an already-typed [`InboundMessage`], e.g. an
    /// orchestrator on the far side of a socket or a WASM `postMessage`
    /// bridge). A message whose `type` tag is unrecognized, whose fields
    /// don't match its variant's shape, or that tries to smuggle a
    /// function-based dimension in where only a pre-computed `column: u16[]`
    /// is accepted (§7), fails to deserialize at all and is reported as a
    /// `DECODE_ERROR` before ever reaching the engine.
    pub fn handle_json(&mut self, bytes: &[u8]) -> OutboundMessage {
        match serde_json::from_slice::<InboundMessage>(bytes) {
            Ok(message) => self.handle(message),
            Err(err) => {
                let err = WorkerError::from(err);
                error!(error = %err, "failed to decode inbound message");
                OutboundMessage::Error { code: error_code(&err), message: err.to_string() }
            }
        }
    }

    fn handle_inner(&mut self, message: InboundMessage) -> OutboundMessage {
        match self.dispatch(message) {
            Ok(reply) => reply,
            Err(err) => {
                error!(error = %err, "dispatch failed");
                OutboundMessage::Error {
                    code: error_code(&err),
                    message: err.to_string(),
                }
            }
        }
    }

    fn dispatch(&mut self, message: InboundMessage) -> WorkerResult<OutboundMessage> {
        match message {
            InboundMessage::Ingest { schema, rows, value_column_names } => self.handle_ingest(schema, rows, value_column_names),
            InboundMessage::BuildIndex { dim_id } => self.handle_build_index(dim_id),
            InboundMessage::FilterSet { dim_id, range_min, range_max, seq } => {
                self.handle_filter_set(dim_id, range_min, range_max, seq)
            }
            InboundMessage::FilterClear { dim_id, seq } => self.handle_filter_clear(dim_id, seq),
            InboundMessage::AddDimension {
                name,
                kind,
                bits,
                column,
                scale,
                labels,
                fallback,
                coarse_target_bins,
            } => self.handle_add_dimension(name, kind, bits, column, scale, labels, fallback, coarse_target_bins),
            InboundMessage::GroupSetReduction { dim_id, reduction: _, value_column, seq } => {
                self.handle_group_set_reduction(dim_id, value_column, seq)
            }
            InboundMessage::GroupTopK { dim_id, k, is_bottom, seq } => self.handle_group_top_k(dim_id, k, is_bottom, seq),
            InboundMessage::RequestPlanner => self.handle_request_planner(),
            InboundMessage::Estimate | InboundMessage::Swap => {
                Ok(OutboundMessage::Progress { message: "reserved, not yet implemented".to_string() })
            }
        }
    }

    fn engine_mut(&mut self) -> WorkerResult<&mut Engine> {
        self.engine.as_mut().ok_or(WorkerError::NotIngested)
    }

    fn handle_ingest(
        &mut self,
        schema: Vec<WireDimSpec>,
        rows: IngestRows,
        value_column_names: Option<Vec<String>>,
    ) -> WorkerResult<OutboundMessage> {
        let value_names = value_column_names.unwrap_or_default();
        let (specs, columns, value_columns) = decode_ingest_rows(&schema, rows, &value_names)?;

        let engine = Engine::ingest(specs, columns, self.config.engine_config())?;
        trace!(row_count = engine.row_count(), "worker ingest complete");
        let row_count = engine.row_count();
        self.value_columns = value_columns;
        let groups = build_groups(&engine);
        self.engine = Some(engine);

        Ok(OutboundMessage::Ready { row_count, groups })
    }

    fn handle_build_index(&mut self, dim_id: u32) -> WorkerResult<OutboundMessage> {
        let engine = self.engine_mut()?;
        let start = Instant::now();
        let built = engine.ensure_csr(DimId(dim_id))?;
        let (_rows, bytes) = built.unwrap_or((0, 0));
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(OutboundMessage::IndexBuilt { dim_id, ms, bytes })
    }

    fn handle_filter_set(&mut self, dim_id: u32, range_min: u16, range_max: u16, seq: u64) -> WorkerResult<OutboundMessage> {
        let engine = self.engine_mut()?;
        set_filter(engine, DimId(dim_id), Some(RawRange { range_min, range_max }))?;
        Ok(self.frame(seq))
    }

    fn handle_filter_clear(&mut self, dim_id: u32, seq: u64) -> WorkerResult<OutboundMessage> {
        let engine = self.engine_mut()?;
        clear_filter(engine, DimId(dim_id))?;
        Ok(self.frame(seq))
    }

    fn handle_add_dimension(
        &mut self,
        name: String,
        kind: WireDimKind,
        bits: u8,
        column: Vec<u16>,
        scale: Option<crate::protocol::WireScale>,
        labels: Option<Vec<String>>,
        fallback: Option<u16>,
        coarse_target_bins: Option<u16>,
    ) -> WorkerResult<OutboundMessage> {
        let quantizer = match kind {
            WireDimKind::Number => {
                let scale = scale.ok_or_else(|| WorkerError::MalformedPayload {
                    reason: format!("numeric dimension '{name}' requires a scale"),
                })?;
                Quantizer::Numeric(QuantizeScale::new(scale.min, scale.max, bits))
            }
            WireDimKind::String => {
                let dict = Dictionary::from_labels(labels.unwrap_or_default(), bits);
                if let Some(fallback) = fallback {
                    if fallback != dict.fallback_bin() {
                        tracing::warn!(
                            name = %name,
                            requested = fallback,
                            computed = dict.fallback_bin(),
                            "ignoring ADD_DIMENSION fallback override, dictionary fallback is fixed by bits"
                        );
                    }
                }
                Quantizer::Categorical(dict)
            }
        };

        let engine = self.engine_mut()?;
        let dim_id = engine.add_quantized_dimension(name, quantizer, column, coarse_target_bins)?;
        Ok(OutboundMessage::DimensionAdded { dim_id: dim_id.0 })
    }

    fn handle_group_set_reduction(&mut self, dim_id: u32, value_column: Vec<f32>, seq: u64) -> WorkerResult<OutboundMessage> {
        let name_lookup = self
            .engine
            .as_ref()
            .map(|e| e.dimension(DimId(dim_id)).ok().map(|d| d.name.clone()));
        let value_column = if !value_column.is_empty() {
            value_column
        } else {
            name_lookup
                .flatten()
                .and_then(|name| self.value_columns.get(&name).cloned())
                .unwrap_or_default()
        };

        let engine = self.engine_mut()?;
        engine.set_reduction(DimId(dim_id), value_column)?;
        Ok(self.frame(seq))
    }

    fn handle_group_top_k(&mut self, dim_id: u32, k: usize, is_bottom: bool, seq: u64) -> WorkerResult<OutboundMessage> {
        let engine = self.engine_mut()?;
        let dimension = engine.dimension(DimId(dim_id))?;
        let entries = top_k_labelled(dimension, k, is_bottom)
            .into_iter()
            .map(|entry| TopKEntryWire {
                bin: entry.bin,
                count: entry.count,
                label: WireValueLabel::from(entry.label),
            })
            .collect();
        Ok(OutboundMessage::TopKResult { seq, dim_id, entries })
    }

    fn handle_request_planner(&mut self) -> WorkerResult<OutboundMessage> {
        let engine = self.engine_mut()?;
        let snapshot = PlannerSnapshotWire::from(engine.planner_snapshot());
        Ok(OutboundMessage::Planner { snapshot })
    }

    /// Builds the `FRAME` reply for a mutating, `seq`-bearing message,
    /// reflecting engine state immediately after that message was applied
    /// (§5 "Ordering guarantees").
    fn frame(&self, seq: u64) -> OutboundMessage {
        let engine = self.engine.as_ref().expect("frame built only after engine exists");
        let profile = if self.config.is_profiling() {
            engine.last_clear_profile().map(|p| ClearProfile {
                fallback: p.fallback,
                inside_rows: p.inside_rows,
                outside_rows: p.outside_rows,
                inside_ms: p.inside_ms,
                outside_ms: p.outside_ms,
                total_ms: p.total_ms,
                outside_fraction: p.outside_fraction,
                range_bins: p.range_bins,
                buffered: p.buffered,
            })
        } else {
            None
        };
        OutboundMessage::Frame {
            seq,
            active_count: engine.active_count(),
            groups: build_groups(engine),
            profile,
        }
    }
}

fn build_groups(engine: &Engine) -> Vec<GroupSnapshot> {
    (0..engine.dimension_count())
        .map(|idx| {
            let dimension = engine.dimension(DimId(idx as u32)).expect("index within dimension_count");
            snapshot_dimension(idx as u32, dimension)
        })
        .collect()
}

fn snapshot_dimension(dim_id: u32, dimension: &Dimension) -> GroupSnapshot {
    GroupSnapshot {
        id: dim_id,
        bins: dimension.histogram.front.clone(),
        bin_count: dimension.histogram.bin_count(),
        count: dimension.histogram.active_count(),
        coarse_bins: dimension.histogram.coarse_front().map(<[u32]>::to_vec),
        coarse_bin_count: dimension.histogram.coarse_bin_count(),
        sum: dimension.reduction.as_ref().map(|r| r.front.clone()),
    }
}

/// Converts a wire `INGEST` payload into the engine's `(DimSpec, RawColumn)`
/// pairs, in schema declaration order, plus any named raw value columns
/// that are not dimensions (§6 `valueColumnNames`).
fn decode_ingest_rows(
    schema: &[WireDimSpec],
    rows: IngestRows,
    value_names: &[String],
) -> WorkerResult<(Vec<DimSpec>, Vec<RawColumn>, BTreeMap<String, Vec<f32>>)> {
    let specs: Vec<DimSpec> = schema
        .iter()
        .map(|s| DimSpec {
            name: s.name.clone(),
            kind: match s.kind {
                WireDimKind::Number => DimKind::Numeric,
                WireDimKind::String => DimKind::Categorical,
            },
            bits: s.bits,
            coarse_target_bins: s.coarse_target_bins,
        })
        .collect();

    match rows {
        IngestRows::RowOriented(rows) => decode_row_oriented(specs, &rows, value_names),
        IngestRows::Columnar(payload) => decode_columnar(specs, payload, value_names),
    }
}

fn decode_row_oriented(
    specs: Vec<DimSpec>,
    rows: &[WireRow],
    value_names: &[String],
) -> WorkerResult<(Vec<DimSpec>, Vec<RawColumn>, BTreeMap<String, Vec<f32>>)> {
    let mut columns = Vec::with_capacity(specs.len());
    for spec in &specs {
        let column = match spec.kind {
            DimKind::Numeric => {
                let values = rows.iter().map(|row| row_number(row, &spec.name)).collect();
                RawColumn::Numeric(values)
            }
            DimKind::Categorical => {
                let labels = rows.iter().map(|row| row_label(row, &spec.name)).collect();
                RawColumn::Categorical(labels)
            }
        };
        columns.push(column);
    }

    let mut value_columns = BTreeMap::new();
    for name in value_names {
        let values = rows.iter().map(|row| row_number(row, name) as f32).collect();
        value_columns.insert(name.clone(), values);
    }

    Ok((specs, columns, value_columns))
}

fn row_number(row: &WireRow, name: &str) -> f64 {
    row.get(name).and_then(serde_json::Value::as_f64).unwrap_or(f64::NAN)
}

fn row_label(row: &WireRow, name: &str) -> String {
    row.get(name).and_then(serde_json::Value::as_str).unwrap_or_default().to_string()
}

fn decode_columnar(
    specs: Vec<DimSpec>,
    payload: ColumnarPayload,
    value_names: &[String],
) -> WorkerResult<(Vec<DimSpec>, Vec<RawColumn>, BTreeMap<String, Vec<f32>>)> {
    let mut by_name: BTreeMap<String, WireColumn> = payload.columns.into_iter().map(|c| (c.name.clone(), c)).collect();

    let mut columns = Vec::with_capacity(specs.len());
    for spec in &specs {
        let wire = by_name
            .remove(&spec.name)
            .ok_or_else(|| WorkerError::MalformedPayload { reason: format!("missing column '{}'", spec.name) })?;
        let column = match (spec.kind, wire.data) {
            (DimKind::Numeric, WireColumnData::Numeric(values)) => RawColumn::Numeric(values),
            (DimKind::Categorical, WireColumnData::Categorical(labels)) => RawColumn::Categorical(labels),
            _ => {
                return Err(WorkerError::MalformedPayload {
                    reason: format!("column '{}' data does not match its declared kind", spec.name),
                })
            }
        };
        let len = match &column {
            RawColumn::Numeric(values) => values.len(),
            RawColumn::Categorical(labels) => labels.len(),
        };
        if len != payload.row_count {
            return Err(WorkerError::MalformedPayload {
                reason: format!("column '{}' has {len} rows, expected {}", spec.name, payload.row_count),
            });
        }
        columns.push(column);
    }

    let mut value_columns = BTreeMap::new();
    for name in value_names {
        let wire = by_name
            .remove(name)
            .ok_or_else(|| WorkerError::MalformedPayload { reason: format!("missing value column '{name}'") })?;
        match wire.data {
            WireColumnData::Numeric(values) => {
                value_columns.insert(name.clone(), values.into_iter().map(|v| v as f32).collect());
            }
            WireColumnData::Categorical(_) => {
                return Err(WorkerError::MalformedPayload { reason: format!("value column '{name}' must be numeric") })
            }
        }
    }

    Ok((specs, columns, value_columns))
}

/// The `seq` carried by messages that have one (§5: `FILTER_SET`,
/// `FILTER_CLEAR`, `GROUP_SET_REDUCTION` each carry a monotonically
/// increasing `seq`; `GROUP_TOP_K` carries one too so its `TOP_K_RESULT`
/// reply can be correlated the same way). `None` for `INGEST`, `BUILD_INDEX`,
/// and the reserved messages, which yield their own typed reply instead of a
/// `seq`-echoing `FRAME`.
fn message_seq(message: &InboundMessage) -> Option<u64> {
    match message {
        InboundMessage::FilterSet { seq, .. }
        | InboundMessage::FilterClear { seq, .. }
        | InboundMessage::GroupSetReduction { seq, .. }
        | InboundMessage::GroupTopK { seq, .. } => Some(*seq),
        _ => None,
    }
}

fn error_code(err: &WorkerError) -> String {
    match err {
        WorkerError::Engine(EngineError::SchemaMismatch { .. }) => "SCHEMA_MISMATCH",
        WorkerError::Engine(EngineError::UnknownDimension { .. }) => "UNKNOWN_DIMENSION",
        WorkerError::MalformedPayload { .. } => "MALFORMED_PAYLOAD",
        WorkerError::NotIngested => "NOT_INGESTED",
        WorkerError::Decode(_) => "DECODE_ERROR",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_spec(name: &str, bits: u8) -> WireDimSpec {
        WireDimSpec { name: name.to_string(), kind: WireDimKind::Number, bits, coarse_target_bins: None }
    }

    fn ingest_row_oriented(worker: &mut Worker, rows: Vec<WireRow>) {
        let row_count = rows.len();
        let reply = worker.handle(InboundMessage::Ingest {
            schema: vec![numeric_spec("value", 4)],
            rows: IngestRows::RowOriented(rows),
            value_column_names: None,
        });
        assert!(matches!(reply, OutboundMessage::Ready { row_count: rc, .. } if rc == row_count));
    }

    fn row(pairs: &[(&str, serde_json::Value)]) -> WireRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn scenario_s1_ingest_then_filter_set_emits_frame() {
        let mut worker = Worker::new(WorkerConfig::new());
        ingest_row_oriented(
            &mut worker,
            vec![
                row(&[("value", serde_json::json!(1.0))]),
                row(&[("value", serde_json::json!(2.0))]),
                row(&[("value", serde_json::json!(3.0))]),
                row(&[("value", serde_json::json!(4.0))]),
            ],
        );

        let reply = worker.handle(InboundMessage::FilterSet { dim_id: 0, range_min: 5, range_max: 10, seq: 1 });
        match reply {
            OutboundMessage::Frame { seq, active_count, .. } => {
                assert_eq!(seq, 1);
                assert_eq!(active_count, 2);
            }
            other => panic!("expected FRAME, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dimension_surfaces_as_error_message() {
        let mut worker = Worker::new(WorkerConfig::new());
        ingest_row_oriented(&mut worker, vec![row(&[("value", serde_json::json!(1.0))])]);

        let reply = worker.handle(InboundMessage::FilterSet { dim_id: 9, range_min: 0, range_max: 1, seq: 1 });
        match reply {
            OutboundMessage::Error { code, .. } => assert_eq!(code, "UNKNOWN_DIMENSION"),
            other => panic!("expected ERROR, got {other:?}"),
        }
    }

    #[test]
    fn message_before_ingest_is_not_ingested_error() {
        let mut worker = Worker::new(WorkerConfig::new());
        let reply = worker.handle(InboundMessage::RequestPlanner);
        match reply {
            OutboundMessage::Error { code, .. } => assert_eq!(code, "NOT_INGESTED"),
            other => panic!("expected ERROR, got {other:?}"),
        }
    }

    #[test]
    fn scenario_s5_group_set_reduction_end_to_end() {
        let mut worker = Worker::new(WorkerConfig::new());
        ingest_row_oriented(
            &mut worker,
            vec![
                row(&[("value", serde_json::json!(1.0))]),
                row(&[("value", serde_json::json!(2.0))]),
                row(&[("value", serde_json::json!(3.0))]),
                row(&[("value", serde_json::json!(4.0))]),
            ],
        );

        let reply = worker.handle(InboundMessage::GroupSetReduction {
            dim_id: 0,
            reduction: crate::protocol::ReductionKind::Sum,
            value_column: vec![10.0, 20.0, 30.0, 40.0],
            seq: 2,
        });
        match reply {
            OutboundMessage::Frame { seq, groups, .. } => {
                assert_eq!(seq, 2);
                let sum = groups[0].sum.as_ref().expect("reduction installed");
                assert_eq!(sum[0], 10.0);
                assert_eq!(sum[15], 40.0);
            }
            other => panic!("expected FRAME, got {other:?}"),
        }
    }

    #[test]
    fn scenario_s6_group_top_k_end_to_end() {
        let mut worker = Worker::new(WorkerConfig::new());
        ingest_row_oriented(
            &mut worker,
            vec![
                row(&[("value", serde_json::json!(1.0))]),
                row(&[("value", serde_json::json!(2.0))]),
                row(&[("value", serde_json::json!(3.0))]),
                row(&[("value", serde_json::json!(4.0))]),
            ],
        );

        let reply = worker.handle(InboundMessage::GroupTopK { dim_id: 0, k: 2, is_bottom: false, seq: 3 });
        match reply {
            OutboundMessage::TopKResult { seq, entries, .. } => {
                assert_eq!(seq, 3);
                assert_eq!(entries.len(), 2);
            }
            other => panic!("expected TOP_K_RESULT, got {other:?}"),
        }
    }

    #[test]
    fn add_dimension_with_labels_builds_fixed_vocabulary() {
        let mut worker = Worker::new(WorkerConfig::new());
        ingest_row_oriented(
            &mut worker,
            vec![
                row(&[("value", serde_json::json!(1.0))]),
                row(&[("value", serde_json::json!(2.0))]),
            ],
        );

        let reply = worker.handle(InboundMessage::AddDimension {
            name: "color".to_string(),
            kind: WireDimKind::String,
            bits: 4,
            column: vec![0, 1],
            scale: None,
            labels: Some(vec!["red".to_string(), "green".to_string()]),
            fallback: None,
            coarse_target_bins: None,
        });
        assert!(matches!(reply, OutboundMessage::DimensionAdded { dim_id: 1 }));
    }

    #[test]
    fn build_index_reports_ms_and_bytes() {
        let mut worker = Worker::new(WorkerConfig::new());
        ingest_row_oriented(
            &mut worker,
            vec![
                row(&[("value", serde_json::json!(1.0))]),
                row(&[("value", serde_json::json!(2.0))]),
            ],
        );

        let reply = worker.handle(InboundMessage::BuildIndex { dim_id: 0 });
        match reply {
            OutboundMessage::IndexBuilt { dim_id, bytes, .. } => {
                assert_eq!(dim_id, 0);
                assert!(bytes > 0);
            }
            other => panic!("expected INDEX_BUILT, got {other:?}"),
        }
    }

    #[test]
    fn columnar_ingest_with_mismatched_row_count_is_malformed() {
        let mut worker = Worker::new(WorkerConfig::new());
        let reply = worker.handle(InboundMessage::Ingest {
            schema: vec![numeric_spec("value", 4)],
            rows: IngestRows::Columnar(ColumnarPayload {
                row_count: 3,
                columns: vec![WireColumn { name: "value".to_string(), data: WireColumnData::Numeric(vec![1.0, 2.0]) }],
                categories: None,
            }),
            value_column_names: None,
        });
        assert!(matches!(reply, OutboundMessage::Error { .. }));
    }

    #[test]
    fn handle_json_round_trips_a_well_formed_message() {
        let mut worker = Worker::new(WorkerConfig::new());
        let ingest = serde_json::json!({
            "type": "INGEST",
            "schema": [{"name": "value", "type": "number", "bits": 4}],
            "rows": [{"value": 1.0}, {"value": 2.0}]
        });
        let reply = worker.handle_json(ingest.to_string().as_bytes());
        assert!(matches!(reply, OutboundMessage::Ready { row_count: 2, .. }));
    }

    #[test]
    fn handle_json_reports_decode_error_for_unknown_message_type() {
        let mut worker = Worker::new(WorkerConfig::new());
        let reply = worker.handle_json(br#"{"type": "NOT_A_REAL_MESSAGE"}"#);
        match reply {
            OutboundMessage::Error { code, .. } => assert_eq!(code, "DECODE_ERROR"),
            other => panic!("expected ERROR, got {other:?}"),
        }
    }

    #[test]
    fn handle_json_reports_decode_error_for_truncated_json() {
        let mut worker = Worker::new(WorkerConfig::new());
        let reply = worker.handle_json(br#"{"type": "FILTER_SET", "dimId": 0"#);
        assert!(matches!(reply, OutboundMessage::Error { .. }));
    }

    /// Exercises the debug-logging span (§1, §6 CLI/env surface): with the
    /// flag on, a subscriber should observe a `dispatch` span carrying the
    /// message's `seq` around every `seq`-bearing dispatch.
    #[test]
    fn debug_logging_enters_a_seq_carrying_span() {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone, Default)]
        struct CapturingWriter(Arc<Mutex<Vec<u8>>>);
        impl std::io::Write for CapturingWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        impl<'a> MakeWriter<'a> for CapturingWriter {
            type Writer = Self;
            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let writer = CapturingWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::ENTER)
            .finish();

        let mut worker = Worker::new(WorkerConfig::new().debug_logging(true));
        tracing::subscriber::with_default(subscriber, || {
            ingest_row_oriented(&mut worker, vec![row(&[("value", serde_json::json!(1.0))])]);
            worker.handle(InboundMessage::FilterSet { dim_id: 0, range_min: 0, range_max: 1, seq: 42 });
        });

        let output = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("dispatch"), "expected a dispatch span in: {output}");
        assert!(output.contains("seq=42") || output.contains("seq: 42"), "expected seq=42 in: {output}");
    }
}
