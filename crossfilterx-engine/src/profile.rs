//! Profiling (§2 component #12, §6 CLI/env surface): optional per-clear
//! timing/strategy capture. The engine always measures this data (it needs
//! the wall-clock numbers for the Clear Planner's own calibration anyway);
//! whether it is surfaced to a caller is purely a reporting choice made by
//! whoever wraps this crate — `crossfilterx-worker`'s `profiling` flag
//! gates whether `FRAME.profile.clear` is populated from it, not whether
//! the engine bothers to compute it.

/// One `clearFilter` call's measured cost breakdown, keyed to
/// `FRAME.profile.clear` (§6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearProfile {
    /// True when the planner chose full recompute over the delta path.
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
