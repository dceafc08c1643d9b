//! Pipeline work items and results.

use std::time::Duration;

use crate::error::{ForsetiError, Result};
use crate::types::{Finding, PolicySet};

/// A submission to the analysis pipeline.
///
/// The `id` exists for observability — callers correlate results and log
/// lines by it. It is never part of the cache key: two items with different
/// ids but identical content, path, policies, and persona share one analysis.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Client-supplied correlation id.
    pub id: String,
    /// Logical file identifier (participates in the fingerprint).
    pub path: String,
    /// Exact bytes to analyze.
    pub content: String,
    pub policies: PolicySet,
    /// Reviewer persona instruction. Empty means no persona.
    pub persona: String,
}

impl WorkItem {
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            content: content.into(),
            policies: PolicySet::new(),
            persona: String::new(),
        }
    }

    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    pub fn persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }
}

/// The outcome of one pipeline submission.
#[derive(Debug, Clone)]
pub struct WorkResult {
    /// The submitting item's correlation id.
    pub id: String,
    /// Findings on success; the analyzer or pipeline error otherwise.
    pub outcome: Result<Vec<Finding>>,
    /// Whether the result was served from cache without an analyzer call.
    pub from_cache: bool,
    /// Wall time from submission to delivery.
    pub elapsed: Duration,
}

impl WorkResult {
    /// A cancellation result, delivered when the pipeline shuts down or the
    /// caller's context fires before completion.
    pub fn cancelled(id: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            id: id.into(),
            outcome: Err(ForsetiError::Cancelled),
            from_cache: false,
            elapsed,
        }
    }

    /// The findings, if the submission succeeded.
    pub fn findings(&self) -> Option<&[Finding]> {
        self.outcome.as_deref().ok()
    }
}
