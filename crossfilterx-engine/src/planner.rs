//! Adaptive EWMA cost model choosing delta vs. recompute for the
//! clear-filter path only (§4.8).

const ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearStrategy {
    Delta,
    Recompute,
}

/// Inputs to one `choose` call, gathered by the Filter Engine before
/// deciding how to apply a `clearFilter`.
#[derive(Debug, Clone, Copy)]
pub struct PlannerContext {
    pub inside_count: u64,
    pub outside_count: u64,
    pub total_rows: u64,
    pub histogram_count: u32,
    pub other_filters: u32,
    pub active_count: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct CostEstimate {
    ewma_cost_per_row: Option<f64>,
    total_ms: f64,
    total_rows: u64,
    samples: u64,
}

impl CostEstimate {
    fn record(&mut self, ms: f64, rows: u64) {
        if ms <= 0.0 || rows == 0 {
            return;
        }
        let cost_per_row = ms / rows as f64;
        self.ewma_cost_per_row = Some(match self.ewma_cost_per_row {
            Some(prev) => ALPHA * cost_per_row + (1.0 - ALPHA) * prev,
            None => cost_per_row,
        });
        self.total_ms += ms;
        self.total_rows += rows;
        self.samples += 1;
    }
}

/// Snapshot of the planner's current estimates, as returned to the
/// `REQUEST_PLANNER` protocol message.
#[derive(Debug, Clone, Copy)]
pub struct PlannerSnapshot {
    pub delta_cost_per_row: Option<f64>,
    pub recompute_cost_per_row: Option<f64>,
    pub delta_count: u64,
    pub recompute_count: u64,
    pub delta_total_ms: f64,
    pub recompute_total_ms: f64,
}

pub struct ClearPlanner {
    delta: CostEstimate,
    recompute: CostEstimate,
    legacy_guard: bool,
}

impl ClearPlanner {
    pub fn new(legacy_guard: bool) -> Self {
        Self {
            delta: CostEstimate::default(),
            recompute: CostEstimate::default(),
            legacy_guard,
        }
    }

    pub fn choose(&self, ctx: PlannerContext) -> ClearStrategy {
        let total = (ctx.total_rows.max(1)) as f64;
        let h = f64::from(ctx.histogram_count.max(1));
        let outside_weight = 1.1 + 0.15 * f64::from(ctx.other_filters.min(4));
        let outside_fraction = ctx.outside_count as f64 / total;
        let inside_fraction = ctx.inside_count as f64 / total;
        let active_fraction = (ctx.active_count as f64 / total).clamp(0.0, 1.0);

        let baseline_delta = (ctx.inside_count as f64 + ctx.outside_count as f64 * outside_weight) * h;

        let recompute_rows = if ctx.other_filters > 0 {
            (ctx.active_count.max(1) as f64).max((total * active_fraction.max(0.01).powf(0.85)).round())
        } else {
            total
        };
        let recompute_weight = if ctx.other_filters > 0 {
            0.9 + active_fraction * 0.6
        } else {
            1.1
        };
        let baseline_recompute = recompute_rows * recompute_weight;

        let delta_estimate = self
            .delta
            .ewma_cost_per_row
            .map(|cost| cost * (ctx.inside_count + ctx.outside_count) as f64)
            .unwrap_or(baseline_delta);
        let recompute_estimate = self
            .recompute
            .ewma_cost_per_row
            .map(|cost| cost * recompute_rows)
            .unwrap_or(baseline_recompute);

        let calibrated = self.delta.ewma_cost_per_row.is_some() || self.recompute.ewma_cost_per_row.is_some();
        if !calibrated && self.legacy_guard {
            if let Some(strategy) = legacy_guard_heuristic(inside_fraction, outside_fraction, active_fraction) {
                return strategy;
            }
        }

        if delta_estimate <= recompute_estimate {
            ClearStrategy::Delta
        } else {
            ClearStrategy::Recompute
        }
    }

    pub fn record(&mut self, strategy: ClearStrategy, ms: f64, rows: u64) {
        match strategy {
            ClearStrategy::Delta => self.delta.record(ms, rows),
            ClearStrategy::Recompute => self.recompute.record(ms, rows),
        }
    }

    pub fn snapshot(&self) -> PlannerSnapshot {
        PlannerSnapshot {
            delta_cost_per_row: self.delta.ewma_cost_per_row,
            recompute_cost_per_row: self.recompute.ewma_cost_per_row,
            delta_count: self.delta.samples,
            recompute_count: self.recompute.samples,
            delta_total_ms: self.delta.total_ms,
            recompute_total_ms: self.recompute.total_ms,
        }
    }
}

/// Three hand-tuned bands (§9: "legacy-guard bands `0.35-0.65`, `0.2/0.6`,
/// `0.05/0.5`"), applied only before either cost estimate has a real
/// sample. They exist to keep §8.S4 satisfied: the plain cost-per-row
/// comparison above under-counts how much a narrow clear reactivates, so an
/// uncalibrated planner is nudged toward recompute in those regimes.
fn legacy_guard_heuristic(inside_fraction: f64, outside_fraction: f64, active_fraction: f64) -> Option<ClearStrategy> {
    if (0.35..=0.65).contains(&outside_fraction) {
        return Some(ClearStrategy::Recompute);
    }
    if active_fraction < 0.2 && outside_fraction > 0.6 {
        return Some(ClearStrategy::Recompute);
    }
    if inside_fraction < 0.05 && outside_fraction > 0.5 {
        return Some(ClearStrategy::Recompute);
    }
    None
}
