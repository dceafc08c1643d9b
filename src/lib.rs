//! Forseti - cached analysis core for LLM-backed code review
//!
//! Every analyzer call costs seconds and real money, so this crate is built
//! around not making them: a content-addressed result cache with local and
//! remote tiers, a debounced file-change batcher, a deduplicating worker
//! pipeline with single-flight semantics, and a stats collector that keeps
//! the whole thing observable.
//!
//! The LLM client itself stays outside — implement [`Analyzer`] over
//! whatever backend you use and the pipeline treats it as an opaque
//! `(content, policies, persona) → findings` function.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use forseti::{
//!     AnalysisPipeline, Analyzer, AnalyzerResponse, Finding, LocalStore,
//!     PipelineConfig, PolicySet, TieredCache, WorkItem,
//! };
//!
//! struct MyAnalyzer;
//!
//! #[async_trait::async_trait]
//! impl Analyzer for MyAnalyzer {
//!     fn provider(&self) -> &str { "anthropic" }
//!     fn model(&self) -> &str { "claude-sonnet-4" }
//!     fn version(&self) -> &str { "v3" }
//!
//!     async fn analyze(
//!         &self,
//!         content: &str,
//!         _policies: &PolicySet,
//!         _persona: &str,
//!     ) -> forseti::Result<AnalyzerResponse> {
//!         // Call your LLM here.
//!         let _ = content;
//!         Ok(AnalyzerResponse::new(vec![Finding::new("demo", "looks fine")]))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(TieredCache::local_only(Arc::new(LocalStore::new(
//!         LocalStore::default_dir(),
//!     ))));
//!     let pipeline = AnalysisPipeline::new(Arc::new(MyAnalyzer), cache, PipelineConfig::new());
//!
//!     let rx = pipeline
//!         .submit(WorkItem::new("req-1", "/proj/main.go", "package main\n"))
//!         .await;
//!     let result = rx.await.expect("pipeline delivers exactly once");
//!     println!("{} findings (cached: {})", result.findings().map_or(0, |f| f.len()), result.from_cache);
//!
//!     pipeline.stop().await;
//! }
//! ```

pub mod analyzer;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod stats;
pub mod telemetry;
pub mod types;
pub mod watch;

// Re-export main types at crate root
pub use analyzer::{Analyzer, AnalyzerResponse, Usage};
pub use cache::{
    CacheManager, CacheStats, CacheTier, Entry, LocalStore, MemoryCache, MemoryConfig,
    RemoteConfig, RemoteStore, TieredCache, TieredConfig,
};
pub use error::{ForsetiError, Result};
pub use fingerprint::Fingerprint;
pub use pipeline::{AnalysisPipeline, PipelineConfig, PipelineStats};
pub use stats::{AnalysisEvent, CollectorConfig, MetricsCollector, StatsReport};
pub use types::{Finding, Policy, PolicySet, Severity, WorkItem, WorkResult};
pub use watch::{DebounceConfig, Debouncer};
