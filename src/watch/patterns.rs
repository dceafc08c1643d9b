//! Path normalization and glob filtering for the debouncer.
//!
//! The filter understands the three pattern shapes the watcher
//! configuration uses, nothing more:
//!
//! - `**/name/**` — the path crosses a directory called `name`, anywhere
//! - `**/*.ext`  — suffix match
//! - `*.ext`     — bare suffix match
//!
//! plus literal equality as a fallback. General-purpose glob engines
//! disagree about `**` on absolute paths, and the watcher only ever needs
//! these shapes, so they are matched directly.

/// Ignore patterns applied when a config does not supply its own:
/// dependency trees, VCS metadata, and the tool's own state directory.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/vendor/**",
    "**/.forseti/**",
];

/// Normalize a raw path for matching: backslashes become slashes and a
/// `file://` scheme prefix is stripped.
pub fn normalize_path(raw: &str) -> String {
    let slashed = raw.replace('\\', "/");
    match slashed.strip_prefix("file://") {
        Some(rest) => rest.to_string(),
        None => slashed,
    }
}

/// An ignore-then-watch pattern filter.
///
/// A path passes iff it matches no ignore pattern AND (the watch set is
/// empty OR it matches at least one watch pattern).
#[derive(Debug, Clone)]
pub struct PathFilter {
    watch: Vec<String>,
    ignore: Vec<String>,
}

impl PathFilter {
    pub fn new(watch: Vec<String>, ignore: Vec<String>) -> Self {
        Self { watch, ignore }
    }

    /// Whether a (raw, unnormalized) path should be queued.
    pub fn is_watched(&self, raw: &str) -> bool {
        let path = normalize_path(raw);
        if self.ignore.iter().any(|p| matches_pattern(&path, p)) {
            return false;
        }
        self.watch.is_empty() || self.watch.iter().any(|p| matches_pattern(&path, p))
    }
}

impl Default for PathFilter {
    /// Watch everything except the default ignores.
    fn default() -> Self {
        Self::new(
            Vec::new(),
            DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

/// Match one normalized path against one pattern.
fn matches_pattern(path: &str, pattern: &str) -> bool {
    // **/name/** — a directory called `name` anywhere in the path.
    if let Some(dir) = pattern
        .strip_prefix("**/")
        .and_then(|rest| rest.strip_suffix("/**"))
    {
        return path.contains(&format!("/{dir}/")) || path.starts_with(&format!("{dir}/"));
    }
    // **/*.ext — suffix.
    if let Some(suffix) = pattern.strip_prefix("**/*") {
        return path.ends_with(suffix);
    }
    // *.ext — bare suffix.
    if let Some(suffix) = pattern.strip_prefix('*') {
        return path.ends_with(suffix);
    }
    path == pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_file_scheme() {
        assert_eq!(normalize_path("file:///proj/a.go"), "/proj/a.go");
    }

    #[test]
    fn normalize_converts_backslashes() {
        assert_eq!(normalize_path(r"C:\proj\a.go"), "C:/proj/a.go");
    }

    #[test]
    fn directory_anywhere_pattern() {
        assert!(matches_pattern("/proj/vendor/x.go", "**/vendor/**"));
        assert!(matches_pattern("vendor/x.go", "**/vendor/**"));
        assert!(!matches_pattern("/proj/src/vendored.go", "**/vendor/**"));
    }

    #[test]
    fn suffix_patterns() {
        assert!(matches_pattern("/proj/src/x.go", "**/*.go"));
        assert!(matches_pattern("/proj/src/x.go", "*.go"));
        assert!(!matches_pattern("/proj/src/x.rs", "**/*.go"));
    }

    #[test]
    fn literal_pattern() {
        assert!(matches_pattern("/proj/Makefile", "/proj/Makefile"));
        assert!(!matches_pattern("/proj/Makefile.bak", "/proj/Makefile"));
    }

    #[test]
    fn default_ignores_exclude_vendor_via_file_uri() {
        let filter = PathFilter::default();
        assert!(!filter.is_watched("file:///proj/vendor/x.go"));
        assert!(!filter.is_watched("/proj/node_modules/pkg/index.js"));
        assert!(!filter.is_watched("/proj/.git/HEAD"));
        assert!(!filter.is_watched("/proj/.forseti/state.json"));
        assert!(filter.is_watched("/proj/src/x.go"));
    }

    #[test]
    fn watch_set_restricts() {
        let filter = PathFilter::new(
            vec!["**/*.go".into()],
            DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
        );
        assert!(filter.is_watched("/proj/src/x.go"));
        assert!(!filter.is_watched("/proj/src/x.rs"));
        // Ignore wins over watch.
        assert!(!filter.is_watched("/proj/vendor/x.go"));
    }

    #[test]
    fn empty_watch_set_watches_everything() {
        let filter = PathFilter::new(vec![], vec![]);
        assert!(filter.is_watched("/anything/at/all.txt"));
    }
}
