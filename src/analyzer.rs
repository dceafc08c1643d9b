//! The analyzer seam.
//!
//! The LLM client is an external collaborator: the pipeline consumes it as
//! an opaque `(content, policies, persona) → findings` function that may
//! fail or block for seconds. [`Analyzer`] is that seam. Implementations
//! also expose their backend identity (provider, model, prompt-schema
//! version), which participates in every fingerprint — swapping the model
//! must invalidate the cache.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Finding, PolicySet};

/// Token accounting for one analyzer call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// The analyzer's reply: findings plus token accounting.
///
/// Only the findings are cached; usage feeds the stats collector of the
/// invocation that actually paid for the call.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerResponse {
    pub findings: Vec<Finding>,
    pub usage: Usage,
}

impl AnalyzerResponse {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            usage: Usage::default(),
        }
    }

    pub fn usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// An LLM-backed code analyzer.
///
/// `analyze` is expected to be expensive — the whole point of this crate is
/// to call it as rarely as possible. Errors are propagated verbatim to every
/// waiter of the request and never cached.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable provider identifier (e.g. "anthropic").
    fn provider(&self) -> &str;

    /// Stable model identifier.
    fn model(&self) -> &str;

    /// Opaque version tag of the analyzer prompt/schema.
    fn version(&self) -> &str;

    /// Run the analysis.
    async fn analyze(
        &self,
        content: &str,
        policies: &PolicySet,
        persona: &str,
    ) -> Result<AnalyzerResponse>;
}
