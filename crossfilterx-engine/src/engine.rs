//! The top-level engine value: owns every buffer and wires the components
//! together (§3 "Ownership", §9 "Class-based internals ... replaced by
//! explicit data structures ... owned by a top-level engine value").

use tracing::debug;

use crate::common::DimId;
use crate::csr::CsrIndex;
use crate::dimension::{DimKind, DimSpec, Dimension, DimensionState, Quantizer};
use crate::error::{EngineError, EngineResult};
use crate::histogram::{BufferedAccumulator, Histogram, HistogramMode};
use crate::layout::ActiveMask;
use crate::planner::ClearPlanner;
use crate::profile::ClearProfile;
use crate::quantizer::{Dictionary, QuantizeScale};
use crate::reduction::Reduction;

/// A freshly-ingested or appended column, prior to quantization.
pub enum RawColumn {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl RawColumn {
    fn len(&self) -> usize {
        match self {
            RawColumn::Numeric(v) => v.len(),
            RawColumn::Categorical(v) => v.len(),
        }
    }

    fn kind(&self) -> DimKind {
        match self {
            RawColumn::Numeric(_) => DimKind::Numeric,
            RawColumn::Categorical(_) => DimKind::Categorical,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub histogram_mode: HistogramMode,
    pub legacy_guard: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            histogram_mode: HistogramMode::Auto,
            legacy_guard: true,
        }
    }
}

pub struct Engine {
    pub(crate) dimensions: Vec<Dimension>,
    pub(crate) active_mask: ActiveMask,
    pub(crate) refcount: Vec<u32>,
    pub(crate) active_count: u64,
    pub(crate) row_count: usize,
    pub(crate) accumulators: Option<Vec<BufferedAccumulator>>,
    pub(crate) planner: ClearPlanner,
    pub(crate) config: EngineConfig,
    pub(crate) last_clear: Option<ClearProfile>,
}

impl Engine {
    /// INGEST (§6): builds every dimension's quantizer and column, then
    /// activates every row (there are no filters yet, so all `F=0`
    /// constraints are vacuously satisfied).
    pub fn ingest(specs: Vec<DimSpec>, columns: Vec<RawColumn>, config: EngineConfig) -> EngineResult<Self> {
        if specs.len() != columns.len() {
            return Err(EngineError::SchemaMismatch {
                reason: format!("{} dimension specs but {} columns", specs.len(), columns.len()),
            });
        }
        let row_count = columns.first().map(RawColumn::len).unwrap_or(0);
        for (spec, column) in specs.iter().zip(&columns) {
            if column.len() != row_count {
                return Err(EngineError::SchemaMismatch {
                    reason: format!(
                        "dimension '{}' has {} rows, expected {row_count}",
                        spec.name,
                        column.len()
                    ),
                });
            }
            if column.kind() != spec.kind {
                return Err(EngineError::SchemaMismatch {
                    reason: format!("dimension '{}' kind does not match its column", spec.name),
                });
            }
        }

        let mut dimensions = Vec::with_capacity(specs.len());
        for (index, (spec, column)) in specs.into_iter().zip(columns).enumerate() {
            dimensions.push(build_dimension(DimId(index as u32), spec, column)?);
        }

        let mut engine = Self {
            dimensions,
            active_mask: ActiveMask::new(row_count),
            refcount: vec![0; row_count],
            active_count: 0,
            row_count,
            accumulators: None,
            planner: ClearPlanner::new(config.legacy_guard),
            config,
            last_clear: None,
        };

        debug!(
            row_count,
            dimension_count = engine.dimensions.len(),
            "ingest complete"
        );

        crate::filter::full_recompute(&mut engine);
        Ok(engine)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn active_count(&self) -> u64 {
        self.active_count
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    pub fn dimension(&self, dim_id: DimId) -> EngineResult<&Dimension> {
        self.dimensions
            .get(dim_id.index())
            .ok_or(EngineError::UnknownDimension { dim_id })
    }

    pub fn active_filter_count(&self) -> u32 {
        self.dimensions.iter().filter(|d| d.filter.is_some()).count() as u32
    }

    /// Whether `row` currently satisfies every installed filter (§3 "Active
    /// Mask"). Exposed as a stable read-only view; only the Row Activator
    /// ever flips this bit.
    pub fn is_row_active(&self, row: usize) -> bool {
        self.active_mask.get(row)
    }

    /// The number of currently-active filters `row` satisfies (§3
    /// "Refcount").
    pub fn row_refcount(&self, row: usize) -> u32 {
        self.refcount[row]
    }

    /// `ADD_DIMENSION` (§6): appends a dimension and back-fills its
    /// histogram from the currently active rows, without touching any
    /// other dimension's state or the active mask.
    pub fn add_dimension(&mut self, spec: DimSpec, column: RawColumn) -> EngineResult<DimId> {
        if column.len() != self.row_count {
            return Err(EngineError::SchemaMismatch {
                reason: format!(
                    "appended dimension '{}' has {} rows, expected {}",
                    spec.name,
                    column.len(),
                    self.row_count
                ),
            });
        }
        let id = DimId(self.dimensions.len() as u32);
        let dim = build_dimension(id, spec, column)?;
        self.push_backfilled_dimension(dim);
        Ok(id)
    }

    /// `ADD_DIMENSION` over an already-quantized wire column (§6: the
    /// message carries `column: u16[]` directly, not raw values), used when
    /// the orchestrator has pre-computed bins client-side. `quantizer` must
    /// already agree with `column`'s codomain.
    pub fn add_quantized_dimension(
        &mut self,
        name: String,
        quantizer: Quantizer,
        column: Vec<u16>,
        coarse_target_bins: Option<u16>,
    ) -> EngineResult<DimId> {
        if column.len() != self.row_count {
            return Err(EngineError::SchemaMismatch {
                reason: format!("appended dimension '{name}' has {} rows, expected {}", column.len(), self.row_count),
            });
        }
        let bin_count = match &quantizer {
            Quantizer::Numeric(scale) => scale.bin_count(),
            Quantizer::Categorical(dict) => dict.bin_count(),
        };
        let coarse_bins = coarse_target_bins.map(|bc| bc as usize).filter(|&bc| bc > 0 && bc <= bin_count);

        let id = DimId(self.dimensions.len() as u32);
        let dim = Dimension {
            id,
            name,
            column,
            quantizer,
            histogram: Histogram::new(bin_count, coarse_bins),
            filter: None,
            csr: None,
            state: DimensionState::Unindexed,
            reduction: None,
        };
        self.push_backfilled_dimension(dim);
        Ok(id)
    }

    fn push_backfilled_dimension(&mut self, mut dim: Dimension) {
        for row in 0..self.row_count {
            if self.active_mask.get(row) {
                let bin = dim.column[row];
                dim.histogram.apply_direct(bin, 1);
                if let Some(reduction) = &mut dim.reduction {
                    reduction.apply(bin, row, 1);
                }
            }
        }
        self.dimensions.push(dim);
        self.accumulators = None;
    }

    /// Ensures the dimension's CSR index exists, building it on first use
    /// (§4.3, §4.11). Returns `(rows, bytes)` when a build actually
    /// happened, for `BUILD_INDEX`'s reply.
    pub fn ensure_csr(&mut self, dim_id: DimId) -> EngineResult<Option<(usize, usize)>> {
        let idx = dim_id.index();
        if idx >= self.dimensions.len() {
            return Err(EngineError::UnknownDimension { dim_id });
        }
        if self.dimensions[idx].csr.is_some() {
            return Ok(None);
        }
        let bin_count = self.dimensions[idx].bin_count();
        let csr = CsrIndex::build(&self.dimensions[idx].column, bin_count);
        let bytes = (self.row_count + bin_count + 1) * std::mem::size_of::<u32>();
        self.dimensions[idx].csr = Some(csr);
        self.dimensions[idx].state = DimensionState::Indexed;
        Ok(Some((self.row_count, bytes)))
    }

    /// `GROUP_SET_REDUCTION` (§6, §4.9): installs a sum reduction and
    /// triggers a full recompute to populate it.
    pub fn set_reduction(&mut self, dim_id: DimId, value_column: Vec<f32>) -> EngineResult<()> {
        let idx = dim_id.index();
        if idx >= self.dimensions.len() {
            return Err(EngineError::UnknownDimension { dim_id });
        }
        if value_column.len() != self.row_count {
            return Err(EngineError::SchemaMismatch {
                reason: format!(
                    "reduction value column has {} rows, expected {}",
                    value_column.len(),
                    self.row_count
                ),
            });
        }
        let bin_count = self.dimensions[idx].bin_count();
        self.dimensions[idx].reduction = Some(Reduction::new(value_column, bin_count));
        crate::filter::full_recompute(self);
        Ok(())
    }

    pub fn planner_snapshot(&self) -> crate::planner::PlannerSnapshot {
        self.planner.snapshot()
    }

    /// The most recent `clearFilter` call's measured cost breakdown, if
    /// profiling has ever been exercised (§2 component #12, §6
    /// `FRAME.profile.clear`). `None` before the first `clearFilter`.
    pub fn last_clear_profile(&self) -> Option<ClearProfile> {
        self.last_clear
    }

    pub(crate) fn ensure_accumulators(&mut self) -> &mut Vec<BufferedAccumulator> {
        if self.accumulators.is_none() {
            let accs = self
                .dimensions
                .iter()
                .map(|d| BufferedAccumulator::new(d.bin_count()))
                .collect();
            self.accumulators = Some(accs);
        }
        self.accumulators.as_mut().unwrap()
    }
}

fn build_dimension(id: DimId, spec: DimSpec, column: RawColumn) -> EngineResult<Dimension> {
    let coarse_bins = spec.coarse_target_bins.map(|bc| bc as usize);
    let (quantizer, quantized): (Quantizer, Vec<u16>) = match column {
        RawColumn::Numeric(values) => {
            let scale = QuantizeScale::infer(values.iter().copied(), spec.bits);
            let quantized = values.iter().map(|v| scale.quantize(*v)).collect();
            (Quantizer::Numeric(scale), quantized)
        }
        RawColumn::Categorical(labels) => {
            let mut dict = Dictionary::new(spec.bits);
            let quantized = labels.iter().map(|label| dict.intern(label)).collect();
            (Quantizer::Categorical(dict), quantized)
        }
    };

    let bin_count = match &quantizer {
        Quantizer::Numeric(scale) => scale.bin_count(),
        Quantizer::Categorical(dict) => dict.bin_count(),
    };
    let coarse_bins = coarse_bins.filter(|&bc| bc > 0 && bc <= bin_count);

    Ok(Dimension {
        id,
        name: spec.name,
        column: quantized,
        quantizer,
        histogram: Histogram::new(bin_count, coarse_bins),
        filter: None,
        csr: None,
        state: DimensionState::Unindexed,
        reduction: None,
    })
}
