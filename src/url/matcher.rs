/// Checks if a host matches a wildcard pattern
///
/// Two kinds of patterns are supported:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches "example.com" and any subdomain of it
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::matches_wildcard;
///
/// assert!(matches_wildcard("fonts.gstatic.com", "fonts.gstatic.com"));
/// assert!(matches_wildcard("*.typekit.net", "use.typekit.net"));
/// assert!(!matches_wildcard("*.typekit.net", "typekit.net.evil.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || (candidate.len() > base.len()
                    && candidate.ends_with(base)
                    && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.')
        }
        None => candidate == pattern,
    }
}

/// A set of host patterns matched case-insensitively
#[derive(Debug, Clone, Default)]
pub struct HostPatterns {
    patterns: Vec<String>,
}

impl HostPatterns {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.patterns.iter().any(|p| matches_wildcard(p, &host))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
