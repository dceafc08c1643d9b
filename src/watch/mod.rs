//! File-change watching: debounced batching and path filtering.

pub mod debounce;
pub mod patterns;

pub use debounce::{DebounceConfig, Debouncer, TriggerFn};
pub use patterns::{DEFAULT_IGNORE_PATTERNS, PathFilter, normalize_path};
