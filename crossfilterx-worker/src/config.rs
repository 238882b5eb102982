//! Worker configuration (§9: "Global mutable flags for histogram mode /
//! profiling ... specified as explicit worker configuration set at
//! construction time"). Shaped like
//! `metrics_exporter_prometheus::PrometheusBuilder`: private fields, a
//! `new()` with documented defaults, and chained `fn foo(mut self, ..) ->
//! Self` setters, consumed once to build the worker.

use std::env;

use crossfilterx_engine::{EngineConfig, HistogramMode};

/// Builder for a [`crate::dispatcher::Worker`]'s construction-time
/// configuration. Every field here is read once, when the worker is built;
/// nothing in this crate consults global or mid-session mutable state for
/// these toggles (§9).
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    histogram_mode: HistogramMode,
    profiling: bool,
    debug_logging: bool,
    legacy_guard: bool,
}

impl WorkerConfig {
    /// Defaults: `histogram_mode = Auto`, `profiling = false`,
    /// `debug_logging = false`, `legacy_guard = true` (§6, §9).
    pub fn new() -> Self {
        Self {
            histogram_mode: HistogramMode::Auto,
            profiling: false,
            debug_logging: false,
            legacy_guard: true,
        }
    }

    pub fn histogram_mode(mut self, mode: HistogramMode) -> Self {
        self.histogram_mode = mode;
        self
    }

    pub fn profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }

    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn legacy_guard(mut self, enabled: bool) -> Self {
        self.legacy_guard = enabled;
        self
    }

    /// Reads `CROSSFILTERX_HISTOGRAM_MODE`, `CROSSFILTERX_PROFILE`,
    /// `CROSSFILTERX_DEBUG_LOG`, and `CROSSFILTERX_LEGACY_GUARD` over the
    /// defaults. Never consulted automatically — callers opt in explicitly
    /// by calling this instead of [`WorkerConfig::new`].
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(mode) = env::var("CROSSFILTERX_HISTOGRAM_MODE") {
            if let Some(parsed) = parse_histogram_mode(&mode) {
                config.histogram_mode = parsed;
            }
        }
        if let Ok(flag) = env::var("CROSSFILTERX_PROFILE") {
            config.profiling = parse_bool_flag(&flag);
        }
        if let Ok(flag) = env::var("CROSSFILTERX_DEBUG_LOG") {
            config.debug_logging = parse_bool_flag(&flag);
        }
        if let Ok(flag) = env::var("CROSSFILTERX_LEGACY_GUARD") {
            config.legacy_guard = parse_bool_flag(&flag);
        }
        config
    }

    pub fn is_profiling(&self) -> bool {
        self.profiling
    }

    pub fn is_debug_logging(&self) -> bool {
        self.debug_logging
    }

    pub(crate) fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            histogram_mode: self.histogram_mode,
            legacy_guard: self.legacy_guard,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_histogram_mode(raw: &str) -> Option<HistogramMode> {
    match raw.to_ascii_lowercase().as_str() {
        "direct" => Some(HistogramMode::Direct),
        "buffered" => Some(HistogramMode::Buffered),
        "auto" => Some(HistogramMode::Auto),
        "simd" => Some(HistogramMode::Simd),
        _ => None,
    }
}

fn parse_bool_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_contract() {
        let config = WorkerConfig::new();
        assert!(!config.is_profiling());
        assert!(!config.is_debug_logging());
        assert_eq!(config.engine_config().histogram_mode, HistogramMode::Auto);
        assert!(config.engine_config().legacy_guard);
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = WorkerConfig::new().histogram_mode(HistogramMode::Direct).profiling(true).legacy_guard(false);
        assert_eq!(config.engine_config().histogram_mode, HistogramMode::Direct);
        assert!(config.is_profiling());
        assert!(!config.engine_config().legacy_guard);
    }

    #[test]
    fn parse_histogram_mode_rejects_unknown_values() {
        assert!(parse_histogram_mode("quantum").is_none());
        assert_eq!(parse_histogram_mode("SIMD"), Some(HistogramMode::Simd));
    }
}
