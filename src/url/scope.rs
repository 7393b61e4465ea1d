use url::Url;

/// Checks if a host matches a domain pattern
///
/// Patterns are either exact hosts ("immobiliare.it") or wildcards
/// ("*.immobiliare.it") that match the bare domain and any subdomain.
/// Comparison is case-insensitive.
///
/// ```
/// use immo_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.immobiliare.it", "www.immobiliare.it"));
/// assert!(matches_wildcard("*.immobiliare.it", "immobiliare.it"));
/// assert!(!matches_wildcard("immobiliare.it", "www.immobiliare.it"));
/// ```
pub fn matches_wildcard(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == pattern,
    }
}

/// The set of hosts a seed's traversal may follow links to
#[derive(Debug, Clone)]
pub struct HostScope {
    patterns: Vec<String>,
}

impl HostScope {
    /// Builds a scope from configured patterns, or from the seed hosts when none are given
    pub fn new(allowed_domains: &[String], seeds: &[String]) -> Self {
        let patterns = if allowed_domains.is_empty() {
            seeds
                .iter()
                .filter_map(|seed| Url::parse(seed).ok())
                .filter_map(|url| url.host_str().map(|h| h.to_ascii_lowercase()))
                .collect()
        } else {
            allowed_domains.to_vec()
        };

        Self { patterns }
    }

    /// Returns true if the URL's host is inside the scope
    pub fn allows(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.patterns.iter().any(|p| matches_wildcard(p, host)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("immobiliare.it", "immobiliare.it"));
        assert!(!matches_wildcard("immobiliare.it", "casa.it"));
    }

    #[test]
    fn test_wildcard_matches_subdomains() {
        assert!(matches_wildcard("*.immobiliare.it", "immobiliare.it"));
        assert!(matches_wildcard("*.immobiliare.it", "www.immobiliare.it"));
        assert!(matches_wildcard("*.immobiliare.it", "img.cdn.immobiliare.it"));
    }

    #[test]
    fn test_wildcard_rejects_lookalikes() {
        assert!(!matches_wildcard("*.immobiliare.it", "notimmobiliare.it"));
        assert!(!matches_wildcard("*.immobiliare.it", "immobiliare.it.evil.com"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_wildcard("Immobiliare.IT", "immobiliare.it"));
        assert!(matches_wildcard("*.immobiliare.it", "WWW.IMMOBILIARE.IT"));
    }

    #[test]
    fn test_scope_defaults_to_seed_hosts() {
        let scope = HostScope::new(
            &[],
            &["https://www.immobiliare.it/affitto-case/savona/".to_string()],
        );
        assert!(scope.allows(&Url::parse("https://www.immobiliare.it/annunci/1").unwrap()));
        assert!(!scope.allows(&Url::parse("https://ads.tracker.com/annunci/1").unwrap()));
    }

    #[test]
    fn test_scope_uses_configured_patterns() {
        let scope = HostScope::new(
            &["*.immobiliare.it".to_string()],
            &["https://www.immobiliare.it/".to_string()],
        );
        assert!(scope.allows(&Url::parse("https://immobiliare.it/annunci/1").unwrap()));
        assert!(scope.allows(&Url::parse("https://m.immobiliare.it/annunci/1").unwrap()));
    }
}
