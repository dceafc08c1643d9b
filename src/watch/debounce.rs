//! Quiet-window coalescing of file-change events.
//!
//! Editors emit bursts of change notifications — every keystroke, save,
//! and formatter pass. [`Debouncer`] collapses a burst into one batch: each
//! event pushes the flush deadline out by the configured window, and when
//! the stream goes quiet the accumulated paths are handed to the trigger
//! callback, each path once no matter how often it was notified.
//!
//! The trigger runs on the timer task (or a bounded fan-out of tasks for
//! large batches), never under the debouncer's lock, and each flush runs
//! on its own task — a slow or panicking callback cannot block the next
//! window. `file_changed` itself is synchronous and cheap: normalize,
//! filter, insert, push the deadline.
//!
//! # Panics
//!
//! Spawning the flush timer requires a tokio runtime context.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, join_all};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::telemetry;
use crate::watch::patterns::{DEFAULT_IGNORE_PATTERNS, PathFilter, normalize_path};

/// Default quiet window.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Default per-batch parallelism.
const DEFAULT_PARALLEL_FILES: usize = 3;

/// Configuration for a [`Debouncer`]. Updatable at runtime via
/// [`Debouncer::update_config`]; changes take effect on the next flush
/// (the pattern filter applies at enqueue time by construction).
///
/// ```rust
/// # use forseti::watch::DebounceConfig;
/// # use std::time::Duration;
/// let config = DebounceConfig::new()
///     .duration(Duration::from_millis(500))
///     .watch_patterns(vec!["**/*.go".into()]);
/// ```
#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// Quiet window after the last event before a flush. Default: 300 ms.
    pub duration: Duration,
    /// Max concurrent trigger invocations for one large batch. Default: 3.
    pub parallel_files: usize,
    /// Paths must match one of these (empty = watch everything).
    pub watch_patterns: Vec<String>,
    /// Paths matching any of these are dropped at enqueue time.
    pub ignore_patterns: Vec<String>,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DEBOUNCE,
            parallel_files: DEFAULT_PARALLEL_FILES,
            watch_patterns: Vec::new(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DebounceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn parallel_files(mut self, n: usize) -> Self {
        self.parallel_files = n.max(1);
        self
    }

    pub fn watch_patterns(mut self, patterns: Vec<String>) -> Self {
        self.watch_patterns = patterns;
        self
    }

    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    fn filter(&self) -> PathFilter {
        PathFilter::new(self.watch_patterns.clone(), self.ignore_patterns.clone())
    }
}

/// Batch callback invoked on each flush.
pub type TriggerFn = Arc<dyn Fn(Vec<String>) -> BoxFuture<'static, ()> + Send + Sync>;

struct State {
    config: DebounceConfig,
    filter: PathFilter,
    pending: HashSet<String>,
    deadline: Option<Instant>,
    timer_running: bool,
    stopped: bool,
}

/// Coalesces path-change events into batched trigger invocations.
pub struct Debouncer {
    state: Arc<Mutex<State>>,
    on_trigger: TriggerFn,
}

impl Debouncer {
    /// Create a debouncer with the given trigger callback.
    pub fn new<F, Fut>(config: DebounceConfig, on_trigger: F) -> Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let filter = config.filter();
        Self {
            state: Arc::new(Mutex::new(State {
                config,
                filter,
                pending: HashSet::new(),
                deadline: None,
                timer_running: false,
                stopped: false,
            })),
            on_trigger: Arc::new(move |batch| -> BoxFuture<'static, ()> {
                Box::pin(on_trigger(batch))
            }),
        }
    }

    /// Record a change notification.
    ///
    /// Non-blocking: filtered paths are dropped here, accepted paths join
    /// the pending set and push the flush deadline out by the configured
    /// window. No-op after [`stop()`](Self::stop).
    pub fn file_changed(&self, raw_path: &str) {
        let mut state = self.state.lock().expect("debouncer lock poisoned");
        if state.stopped {
            return;
        }
        if !state.filter.is_watched(raw_path) {
            debug!(path = raw_path, "change ignored by pattern filter");
            return;
        }
        state.pending.insert(normalize_path(raw_path));
        state.deadline = Some(Instant::now() + state.config.duration);
        if !state.timer_running {
            state.timer_running = true;
            tokio::spawn(run_timer(
                Arc::clone(&self.state),
                Arc::clone(&self.on_trigger),
            ));
        }
    }

    /// Replace the configuration atomically. Takes effect on the next
    /// flush; events already pending keep their current deadline.
    pub fn update_config(&self, config: DebounceConfig) {
        let mut state = self.state.lock().expect("debouncer lock poisoned");
        state.filter = config.filter();
        state.config = config;
    }

    /// Stop the debouncer: pending events are discarded, no further
    /// callbacks fire, later `file_changed` calls are no-ops. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("debouncer lock poisoned");
        state.stopped = true;
        state.pending.clear();
        state.deadline = None;
    }

    /// Number of paths waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .expect("debouncer lock poisoned")
            .pending
            .len()
    }
}

/// One flush cycle: sleep until the deadline stops moving, drain the
/// pending set, dispatch. Exits after its flush (or when stopped); the
/// next event spawns a fresh timer.
async fn run_timer(state: Arc<Mutex<State>>, trigger: TriggerFn) {
    loop {
        let deadline = {
            let mut s = state.lock().expect("debouncer lock poisoned");
            match (s.stopped, s.deadline) {
                (false, Some(d)) => d,
                _ => {
                    s.timer_running = false;
                    return;
                }
            }
        };

        tokio::time::sleep_until(deadline.into()).await;

        let flush = {
            let mut s = state.lock().expect("debouncer lock poisoned");
            if s.stopped {
                s.timer_running = false;
                return;
            }
            match s.deadline {
                // Another event moved the deadline while we slept.
                Some(d) if Instant::now() < d => None,
                Some(_) => {
                    let batch: Vec<String> = s.pending.drain().collect();
                    s.deadline = None;
                    s.timer_running = false;
                    Some((batch, s.config.parallel_files))
                }
                None => {
                    s.timer_running = false;
                    return;
                }
            }
        };

        if let Some((batch, parallel)) = flush {
            if !batch.is_empty() {
                metrics::counter!(telemetry::DEBOUNCE_FLUSHES_TOTAL).increment(1);
                dispatch(batch, parallel, trigger).await;
            }
            return;
        }
    }
}

/// Hand a batch to the trigger. Small batches go as one invocation; large
/// ones fan out per path under a semaphore, and the flush waits for every
/// partition.
async fn dispatch(batch: Vec<String>, parallel: usize, trigger: TriggerFn) {
    let parallel = parallel.max(1);
    if batch.len() <= parallel {
        trigger(batch).await;
        return;
    }
    let semaphore = Arc::new(Semaphore::new(parallel));
    let partitions = batch.into_iter().map(|path| {
        let semaphore = Arc::clone(&semaphore);
        let trigger = Arc::clone(&trigger);
        async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            trigger(vec![path]).await;
        }
    });
    join_all(partitions).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = DebounceConfig::default();
        assert_eq!(config.duration, Duration::from_millis(300));
        assert_eq!(config.parallel_files, 3);
        assert!(config.watch_patterns.is_empty());
        assert!(config.ignore_patterns.contains(&"**/node_modules/**".to_string()));
    }

    #[test]
    fn parallel_files_floor_is_one() {
        let config = DebounceConfig::new().parallel_files(0);
        assert_eq!(config.parallel_files, 1);
    }

    #[tokio::test]
    async fn ignored_paths_never_join_the_pending_set() {
        let debouncer = Debouncer::new(DebounceConfig::default(), |_| async {});
        debouncer.file_changed("/proj/vendor/x.go");
        debouncer.file_changed("/proj/src/x.go");
        assert_eq!(debouncer.pending_count(), 1);
        debouncer.stop();
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_drops_pending() {
        let debouncer = Debouncer::new(DebounceConfig::default(), |_| async {});
        debouncer.file_changed("/proj/src/x.go");
        debouncer.stop();
        debouncer.stop();
        assert_eq!(debouncer.pending_count(), 0);
        debouncer.file_changed("/proj/src/y.go");
        assert_eq!(debouncer.pending_count(), 0, "events after stop are no-ops");
    }
}
