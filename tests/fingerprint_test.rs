//! Property-style tests for [`Fingerprint`] determinism.

use forseti::{Fingerprint, Policy, PolicySet};

fn fp(content: &str, policies: &PolicySet, persona: &str) -> String {
    Fingerprint::for_request(
        content,
        "/proj/src/main.go",
        "anthropic",
        "claude-sonnet-4",
        "v3",
        policies,
        persona,
    )
    .hash()
}

#[test]
fn hash_invariant_under_all_policy_permutations() {
    let names = ["alpha", "bravo", "charlie", "delta"];
    let reference: PolicySet = names
        .iter()
        .map(|n| Policy::new(*n, format!("instruction for {n}")))
        .collect();
    let expected = fp("content", &reference, "p");

    // Every rotation and the full reversal must hash identically.
    for start in 0..names.len() {
        let rotated: PolicySet = (0..names.len())
            .map(|i| {
                let n = names[(start + i) % names.len()];
                Policy::new(n, format!("instruction for {n}"))
            })
            .collect();
        assert_eq!(fp("content", &rotated, "p"), expected);
    }
    let reversed: PolicySet = names
        .iter()
        .rev()
        .map(|n| Policy::new(*n, format!("instruction for {n}")))
        .collect();
    assert_eq!(fp("content", &reversed, "p"), expected);
}

#[test]
fn hash_depends_only_on_the_enabled_set() {
    // Disable/re-enable in alternate orders; only the final enabled set
    // matters.
    let ab_enabled = PolicySet::new()
        .with(Policy::new("a", "ia"))
        .with(Policy::new("b", "ib"))
        .with(Policy::new("c", "ic").enabled(false));
    let ab_enabled_other_route = PolicySet::new()
        .with(Policy::new("c", "ic").enabled(true).enabled(false))
        .with(Policy::new("b", "ib").enabled(false).enabled(true))
        .with(Policy::new("a", "ia"));

    assert_eq!(
        fp("content", &ab_enabled, ""),
        fp("content", &ab_enabled_other_route, "")
    );
}

#[test]
fn every_input_field_shifts_the_hash() {
    let policies = PolicySet::new().with(Policy::new("a", "ia"));
    let base = Fingerprint::for_request("content", "/p", "prov", "model", "v1", &policies, "p");

    let variants = [
        Fingerprint::for_request("content!", "/p", "prov", "model", "v1", &policies, "p"),
        Fingerprint::for_request("content", "/q", "prov", "model", "v1", &policies, "p"),
        Fingerprint::for_request("content", "/p", "other", "model", "v1", &policies, "p"),
        Fingerprint::for_request("content", "/p", "prov", "bigger", "v1", &policies, "p"),
        Fingerprint::for_request("content", "/p", "prov", "model", "v2", &policies, "p"),
        Fingerprint::for_request("content", "/p", "prov", "model", "v1", &PolicySet::new(), "p"),
        Fingerprint::for_request("content", "/p", "prov", "model", "v1", &policies, "q"),
    ];
    for variant in &variants {
        assert_ne!(variant.hash(), base.hash());
    }
}

#[test]
fn changed_instruction_text_shifts_the_hash() {
    let v1 = PolicySet::new().with(Policy::new("a", "flag TODOs"));
    let v2 = PolicySet::new().with(Policy::new("a", "flag FIXMEs"));
    assert_ne!(fp("content", &v1, ""), fp("content", &v2, ""));
}

#[test]
fn hash_is_hex_sha256_shaped() {
    let hash = fp("content", &PolicySet::new(), "");
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(hash, hash.to_lowercase());
}

#[test]
fn repeated_computation_is_byte_identical() {
    let policies = PolicySet::new()
        .with(Policy::new("z-last", "zz"))
        .with(Policy::new("a-first", "aa"));
    let hashes: Vec<String> = (0..10).map(|_| fp("same", &policies, "same")).collect();
    assert!(hashes.iter().all(|h| h == &hashes[0]));
}
