//! Zero-cost-by-default tracing (§2.1/§4.8).
//!
//! [`EngineTracer`] is a plain trait with no-op default methods; with
//! [`NoopTracer`] (the default a `Bundle` is built with) the compiler
//! monomorphizes every call site down to nothing. [`DiagnosticsTracer`] is the
//! opt-in implementation that actually accumulates a report, for callers
//! building an admin/debug surface on top of this crate.
//!
//! | Tracer              | Cost            | Use |
//! |----------------------|-----------------|-----|
//! | `NoopTracer`         | zero (inlined away) | production hot path |
//! | `DiagnosticsTracer`  | one mutex lock per event | debugging, load testing |

use std::{
    collections::BTreeMap,
    fmt,
    sync::Mutex,
    time::Duration,
};

/// Hooks the resolver and cache call on notable events. All methods have
/// no-op default bodies, so implementers only override what they care about.
pub trait EngineTracer: fmt::Debug + Send + Sync {
    fn on_format_start(&self, _entry_id: &str) {}
    fn on_format_end(&self, _entry_id: &str, _duration: Duration, _cache_hit: bool) {}
    fn on_depth_exceeded(&self, _entry_id: &str, _depth: usize) {}
    fn on_expansion_exceeded(&self, _entry_id: &str, _bytes: usize) {}
    fn on_cache_eviction(&self, _entry_id: &str) {}
}

/// The tracer every `Bundle` uses unless a caller opts into something else.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl EngineTracer for NoopTracer {}

#[derive(Debug, Default)]
struct DiagnosticsState {
    iterations: u64,
    pattern_histogram: BTreeMap<String, u64>,
    wall_times: Vec<Duration>,
    rss_samples: Vec<u64>,
}

/// Accumulates call counts, per-entry hit counts, and wall-time samples for a
/// JSON-serializable [`DiagnosticsReport`].
#[derive(Debug, Default)]
pub struct DiagnosticsTracer {
    state: Mutex<DiagnosticsState>,
}

impl DiagnosticsTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a caller-supplied resident-set-size sample (bytes). Reading
    /// RSS is platform-specific and out of scope for this crate; callers
    /// feed it whatever their own process-monitoring stack reports.
    pub fn record_rss_sample(&self, bytes: u64) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.rss_samples.push(bytes);
    }

    #[must_use]
    pub fn report(&self) -> DiagnosticsReport {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut sorted: Vec<f64> = state.wall_times.iter().map(Duration::as_secs_f64).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        DiagnosticsReport {
            iterations: state.iterations,
            pattern_histogram: state.pattern_histogram.clone(),
            wall_time_percentiles: WallTimePercentiles {
                p50: percentile(&sorted, 0.50),
                p90: percentile(&sorted, 0.90),
                p99: percentile(&sorted, 0.99),
            },
            rss_samples: state.rss_samples.clone(),
        }
    }
}

fn percentile(sorted_seconds: &[f64], fraction: f64) -> f64 {
    if sorted_seconds.is_empty() {
        return 0.0;
    }
    let rank = ((sorted_seconds.len() - 1) as f64 * fraction).round() as usize;
    sorted_seconds[rank.min(sorted_seconds.len() - 1)]
}

impl EngineTracer for DiagnosticsTracer {
    fn on_format_start(&self, _entry_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.iterations += 1;
    }

    fn on_format_end(&self, entry_id: &str, duration: Duration, _cache_hit: bool) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.wall_times.push(duration);
        *state.pattern_histogram.entry(entry_id.to_string()).or_insert(0) += 1;
    }

    fn on_depth_exceeded(&self, _entry_id: &str, _depth: usize) {}

    fn on_expansion_exceeded(&self, _entry_id: &str, _bytes: usize) {}

    fn on_cache_eviction(&self, _entry_id: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WallTimePercentiles {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

/// JSON-serializable diagnostics snapshot (§2.1/§4.8).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticsReport {
    pub iterations: u64,
    pub pattern_histogram: BTreeMap<String, u64>,
    pub wall_time_percentiles: WallTimePercentiles,
    pub rss_samples: Vec<u64>,
}

impl DiagnosticsReport {
    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error only if `serde_json` itself fails to serialize, which
    /// does not happen for this plain-data struct; kept fallible to match
    /// `serde_json::to_string_pretty`'s signature.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_tracer_has_no_observable_state() {
        let tracer = NoopTracer;
        tracer.on_format_start("msg:a");
        tracer.on_format_end("msg:a", Duration::from_millis(1), true);
    }

    #[test]
    fn diagnostics_tracer_accumulates_histogram() {
        let tracer = DiagnosticsTracer::new();
        tracer.on_format_start("msg:a");
        tracer.on_format_end("msg:a", Duration::from_millis(2), false);
        tracer.on_format_start("msg:a");
        tracer.on_format_end("msg:a", Duration::from_millis(4), true);
        let report = tracer.report();
        assert_eq!(report.iterations, 2);
        assert_eq!(report.pattern_histogram.get("msg:a"), Some(&2));
        assert!(report.wall_time_percentiles.p50 > 0.0);
    }

    #[test]
    fn report_serializes_to_json() {
        let tracer = DiagnosticsTracer::new();
        tracer.on_format_start("msg:a");
        tracer.on_format_end("msg:a", Duration::from_millis(1), true);
        let json = tracer.report().to_json().unwrap();
        assert!(json.contains("\"iterations\""));
    }
}
