//! Analysis policies.
//!
//! A [`Policy`] is a named natural-language instruction handed to the
//! analyzer ("flag TODO comments older than a sprint", "no unwrap in
//! handlers"). Only enabled policies participate in analysis, and only
//! enabled policies contribute to the request fingerprint — toggling a
//! policy changes what gets analyzed, so it must change the cache key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One named instruction for the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    /// Natural-language instruction text. Hashed (never stored verbatim)
    /// in fingerprints and cache entries.
    pub instruction: String,
    pub enabled: bool,
}

impl Policy {
    /// Create an enabled policy.
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            enabled: true,
        }
    }

    /// Set the enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Hex SHA-256 of the instruction text.
    pub fn instruction_hash(&self) -> String {
        hex::encode(Sha256::digest(self.instruction.as_bytes()))
    }
}

/// An ordered collection of policies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy, builder-style.
    pub fn with(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Add a policy in place.
    pub fn push(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    /// Iterate over the enabled policies, in insertion order.
    pub fn enabled(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter().filter(|p| p.enabled)
    }

    /// All policies, enabled or not.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Map of enabled policy names to instruction hashes.
    ///
    /// This is the `policies` sub-object of the fingerprint: disabled
    /// policies contribute nothing, and the `BTreeMap` keeps the keys
    /// sorted for canonical serialization.
    pub fn enabled_hashes(&self) -> BTreeMap<String, String> {
        self.enabled()
            .map(|p| (p.name.clone(), p.instruction_hash()))
            .collect()
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<I: IntoIterator<Item = Policy>>(iter: I) -> Self {
        Self {
            policies: iter.into_iter().collect(),
        }
    }
}
