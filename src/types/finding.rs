//! Analysis findings.
//!
//! A [`Finding`] is one issue the analyzer raised against a file. The cache
//! treats findings as opaque payload — it serializes them verbatim and never
//! inspects their contents. Interpretation (diagnostic conversion, review UI)
//! happens in outer layers.

use serde::{Deserialize, Serialize};

/// Severity of a finding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    #[default]
    Warning,
    Info,
    Hint,
}

/// One issue raised by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Identifier of the policy or rule that produced this finding.
    pub rule: String,
    /// Human-readable explanation.
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    /// Document the finding applies to. `None` when the analyzer did not
    /// attribute it to a specific file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// First line of the affected range (1-based; 0 = whole file).
    #[serde(default)]
    pub start_line: u32,
    /// Last line of the affected range, inclusive.
    #[serde(default)]
    pub end_line: u32,
}

impl Finding {
    /// Create a finding with default severity and no location.
    pub fn new(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            severity: Severity::default(),
            uri: None,
            start_line: 0,
            end_line: 0,
        }
    }

    /// Set the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the document URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the affected line range (1-based, inclusive).
    pub fn lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = start;
        self.end_line = end;
        self
    }

    /// Identity used to deduplicate findings.
    ///
    /// Two findings for the same rule on the same range of the same document
    /// are the same finding; same-rule findings on disjoint ranges are not.
    pub fn dedup_key(&self) -> (&str, Option<&str>, u32, u32) {
        (
            &self.rule,
            self.uri.as_deref(),
            self.start_line,
            self.end_line,
        )
    }
}

/// Remove duplicate findings, keeping the first occurrence of each
/// [`dedup_key`](Finding::dedup_key).
///
/// Order of surviving findings is preserved.
pub fn dedup_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen = std::collections::HashSet::new();
    findings
        .into_iter()
        .filter(|f| {
            let (rule, uri, start, end) = f.dedup_key();
            seen.insert((rule.to_owned(), uri.map(str::to_owned), start, end))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_removes_exact_duplicates() {
        let findings = vec![
            Finding::new("no-panic", "don't panic").uri("a.rs").lines(3, 5),
            Finding::new("no-panic", "don't panic").uri("a.rs").lines(3, 5),
        ];
        assert_eq!(dedup_findings(findings).len(), 1);
    }

    #[test]
    fn dedup_keeps_same_rule_on_different_ranges() {
        let findings = vec![
            Finding::new("no-panic", "here").uri("a.rs").lines(3, 5),
            Finding::new("no-panic", "and here").uri("a.rs").lines(9, 9),
        ];
        assert_eq!(dedup_findings(findings).len(), 2);
    }

    #[test]
    fn dedup_keeps_same_range_on_different_files() {
        let findings = vec![
            Finding::new("no-panic", "a").uri("a.rs").lines(1, 1),
            Finding::new("no-panic", "b").uri("b.rs").lines(1, 1),
        ];
        assert_eq!(dedup_findings(findings).len(), 2);
    }

    #[test]
    fn dedup_preserves_order() {
        let findings = vec![
            Finding::new("r1", "first"),
            Finding::new("r2", "second"),
            Finding::new("r1", "first again"),
        ];
        let deduped = dedup_findings(findings);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].rule, "r1");
        assert_eq!(deduped[1].rule, "r2");
    }

    #[test]
    fn serde_round_trip() {
        let finding = Finding::new("unused-var", "`x` is never read")
            .severity(Severity::Info)
            .uri("file:///proj/src/main.rs")
            .lines(12, 12);
        let json = serde_json::to_string(&finding).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, finding);
    }

    #[test]
    fn minimal_json_deserializes_with_defaults() {
        let back: Finding =
            serde_json::from_str(r#"{"rule": "x", "message": "m"}"#).unwrap();
        assert_eq!(back.severity, Severity::Warning);
        assert_eq!(back.uri, None);
        assert_eq!(back.start_line, 0);
    }
}
