//! Host normalization and rule matching.
//!
//! A rule `example.com` covers `example.com` itself and any host that ends in
//! `.example.com`. Matching is a suffix check on a label boundary, never a
//! substring check, so `notexample.com` is not covered.

/// Lower-cases a host or URL and strips the scheme, credentials, port, path,
/// query, fragment and a leading `www.`.
///
/// The same function is used for user input in the control surface and for
/// the location of the tab being attached, so both sides compare equal forms.
pub fn normalize_host(input: &str) -> String {
    let mut rest = input.trim();

    if let Some(idx) = rest.find("://") {
        rest = &rest[idx + 3..];
    }

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    rest = &rest[..end];

    if let Some(idx) = rest.rfind('@') {
        rest = &rest[idx + 1..];
    }

    if let Some(idx) = rest.rfind(':') {
        if rest[idx + 1..].chars().all(|c| c.is_ascii_digit()) {
            rest = &rest[..idx];
        }
    }

    let host = rest.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    host.trim_end_matches('.').to_string()
}

/// True when `candidate` is `rule` or a subdomain of it. Both sides must
/// already be normalized.
pub fn matches(candidate: &str, rule: &str) -> bool {
    if rule.is_empty() {
        return false;
    }
    if candidate == rule {
        return true;
    }
    candidate.len() > rule.len() + 1
        && candidate.ends_with(rule)
        && candidate.as_bytes()[candidate.len() - rule.len() - 1] == b'.'
}

/// Picks the rule that covers `candidate`. When several overlap, the longest
/// (most specific) rule wins; ties cannot happen because rules are unique.
pub fn best_match<'a, I>(candidate: &str, rules: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    rules
        .into_iter()
        .filter(|rule| matches(candidate, rule))
        .max_by_key(|rule| rule.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_matches_on_label_boundary() {
        assert!(matches("a.b.example.com", "example.com"));
        assert!(matches("example.com", "example.com"));
        assert!(!matches("notexample.com", "example.com"));
        assert!(!matches("example.com", "a.example.com"));
        assert!(!matches("example.com", ""));
    }

    #[test]
    fn normalize_strips_scheme_www_port_and_path() {
        assert_eq!(normalize_host("https://WWW.Example.com/feed?x=1"), "example.com");
        assert_eq!(normalize_host("example.com:8080/path"), "example.com");
        assert_eq!(normalize_host("  m.Reddit.com  "), "m.reddit.com");
        assert_eq!(normalize_host("http://user@news.site.org#top"), "news.site.org");
        assert_eq!(normalize_host("www."), "");
    }

    #[test]
    fn longest_rule_wins_when_rules_overlap() {
        let rules = ["example.com", "sub.example.com", "other.org"];
        assert_eq!(
            best_match("a.sub.example.com", rules.iter().copied()),
            Some("sub.example.com")
        );
        assert_eq!(best_match("x.example.com", rules.iter().copied()), Some("example.com"));
        assert_eq!(best_match("unrelated.net", rules.iter().copied()), None);
    }
}
