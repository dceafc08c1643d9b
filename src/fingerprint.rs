//! Content-addressed identity for analysis requests.
//!
//! A [`Fingerprint`] pins down everything that can change the outcome of an
//! analysis: the exact content bytes, the document path (the analyzer may use
//! path-derived hints, so identical content under two paths caches twice),
//! the backend identity (provider, model, prompt-schema version), and the
//! hashes of every enabled instruction. Its [`hash()`](Fingerprint::hash) is
//! the stable hex string used in file names, URLs, and telemetry.
//!
//! # Canonical form
//!
//! The hash is the SHA-256 of the fingerprint's canonical JSON: object keys
//! sorted lexicographically at every nesting level, no insignificant
//! whitespace. Serializing through [`serde_json::Value`] guarantees sorted
//! keys (its object map is ordered by key), so the same fingerprint hashes
//! byte-identically across processes and architectures.
//!
//! # One key, everywhere
//!
//! The fingerprint is the *only* cache key in the crate. The pipeline's
//! in-memory cache and single-flight map key on the hex hash string; the
//! durable tiers key on the fingerprint itself. The reviewer persona — a
//! natural-language instruction like any policy — is folded into the
//! instruction-hash map under the reserved name `persona`, so it shifts the
//! key without widening the persisted format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::PolicySet;

/// Reserved instruction-hash slot for the reviewer persona.
pub const PERSONA_POLICY_NAME: &str = "persona";

/// Deterministic identifier of an analysis request.
///
/// Field names on the wire and on disk are fixed by the persisted entry
/// format (`file_hash`, `file_path`, `baml_version`), independent of the
/// in-code names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Hex SHA-256 of the exact bytes submitted for analysis.
    #[serde(rename = "file_hash")]
    pub content_hash: String,
    /// Logical file identifier.
    #[serde(rename = "file_path")]
    pub path: String,
    /// Analyzer backend provider (e.g. "anthropic").
    pub provider: String,
    /// Analyzer model identifier.
    pub model: String,
    /// Opaque version tag of the analyzer prompt/schema.
    #[serde(rename = "baml_version")]
    pub analyzer_version: String,
    /// Enabled policy name → hex SHA-256 of its instruction text.
    pub policies: BTreeMap<String, String>,
}

impl Fingerprint {
    /// Build the fingerprint for one analysis request.
    ///
    /// `policies` contributes only its enabled members; a non-empty
    /// `persona` occupies the reserved [`PERSONA_POLICY_NAME`] slot.
    pub fn for_request(
        content: &str,
        path: &str,
        provider: &str,
        model: &str,
        analyzer_version: &str,
        policies: &PolicySet,
        persona: &str,
    ) -> Self {
        let mut hashes = policies.enabled_hashes();
        if !persona.is_empty() {
            hashes.insert(PERSONA_POLICY_NAME.to_string(), sha256_hex(persona));
        }
        Self {
            content_hash: sha256_hex(content),
            path: path.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            analyzer_version: analyzer_version.to_string(),
            policies: hashes,
        }
    }

    /// Hex SHA-256 of the canonical JSON encoding.
    ///
    /// This string is the stable boundary identifier: local file names,
    /// remote URLs, the in-memory cache key, and telemetry all use it.
    pub fn hash(&self) -> String {
        // Value's object map is key-ordered, which makes the encoding
        // canonical regardless of struct field declaration order.
        let canonical = serde_json::to_value(self)
            .expect("fingerprint serialization is infallible")
            .to_string();
        sha256_hex(&canonical)
    }
}

/// Hex SHA-256 of a string's bytes.
pub(crate) fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
