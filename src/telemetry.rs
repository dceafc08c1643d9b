//! Telemetry metric name constants.
//!
//! Centralised metric names for forseti operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `forseti_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `tier` — cache tier that served a lookup ("memory" | "local" | "remote")
//! - `operation` — cache operation ("get" | "put" | "delete")
//! - `status` — outcome: "ok" or "error"

/// Total analyses dispatched to the external analyzer.
///
/// Labels: `status` ("ok" | "error").
pub const ANALYSES_TOTAL: &str = "forseti_analyses_total";

/// Analyzer call duration in seconds.
pub const ANALYSIS_DURATION_SECONDS: &str = "forseti_analysis_duration_seconds";

/// Total cache hits across all tiers.
///
/// Labels: `tier`.
pub const CACHE_HITS_TOTAL: &str = "forseti_cache_hits_total";

/// Total cache misses (every tier missed and the analyzer ran).
pub const CACHE_MISSES_TOTAL: &str = "forseti_cache_misses_total";

/// Total entries evicted from the in-memory cache for capacity.
pub const CACHE_EVICTIONS_TOTAL: &str = "forseti_cache_evictions_total";

/// Total stored entries that failed to decode and were treated as misses.
///
/// Labels: `tier`.
pub const CACHE_DECODE_ERRORS_TOTAL: &str = "forseti_cache_decode_errors_total";

/// Total best-effort tiered-cache operations swallowed rather than
/// surfaced: remote put/delete broadcasts and local warms.
///
/// Labels: `operation` ("put" | "delete" | "warm").
pub const FAIL_OPEN_TOTAL: &str = "forseti_fail_open_total";

/// Total debounce flushes (batches handed to the trigger callback).
pub const DEBOUNCE_FLUSHES_TOTAL: &str = "forseti_debounce_flushes_total";

/// Total findings produced by completed analyses.
pub const FINDINGS_TOTAL: &str = "forseti_findings_total";

/// Total tokens consumed by analyzer calls.
///
/// Labels: `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "forseti_tokens_total";
