/// Markers identifying automated pushes.
pub const DEFAULT_IGNORED_MARKERS: &[&str] = &["renovate[bot]", "dependabot[bot]", "snyk.io", "github@users.noreply.github.com"];

/// Filter for pushes and commits that are not community work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseFilter {
    markers: Vec<String>,
    authors: Vec<String>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_MARKERS.iter().copied(), core::iter::empty::<String>())
    }
}

impl NoiseFilter {
    #[must_use]
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>, authors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let keep = |s: &String| !s.trim().is_empty();
        Self {
            markers: markers.into_iter().map(Into::into).filter(keep).collect(),
            authors: authors.into_iter().map(Into::into).filter(keep).collect(),
        }
    }

    /// Whether a raw event payload mentions any ignored marker.
    #[must_use]
    pub fn is_noisy_payload(&self, raw: &str) -> bool {
        self.markers.iter().any(|m| raw.contains(m.as_str()))
    }

    /// Whether any of the given identities (name, email, login) is an ignored author.
    #[must_use]
    pub fn is_ignored_author<'a>(&self, identities: impl IntoIterator<Item = &'a str>) -> bool {
        identities
            .into_iter()
            .any(|id| self.authors.iter().any(|a| a.eq_ignore_ascii_case(id.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_markers() {
        let filter = NoiseFilter::default();
        assert!(filter.is_noisy_payload(r#"{"author":{"name":"renovate[bot]"}}"#));
        assert!(filter.is_noisy_payload(r#"{"message":"fix: upgrade lodash (snyk.io)"}"#));
        assert!(filter.is_noisy_payload(r#"{"email":"github@users.noreply.github.com"}"#));
        assert!(!filter.is_noisy_payload(r#"{"author":{"name":"Jane Doe"}}"#));
    }

    #[test]
    fn test_ignored_authors() {
        let filter = NoiseFilter::new(DEFAULT_IGNORED_MARKERS.iter().copied(), ["Jane Doe", "jane@example.com"]);
        assert!(filter.is_ignored_author(["jane doe"]));
        assert!(filter.is_ignored_author(["someone", "JANE@example.com"]));
        assert!(!filter.is_ignored_author(["John Doe", "john@example.com"]));
    }

    #[test]
    fn test_blank_entries_are_dropped() {
        let filter = NoiseFilter::new(["", "  "], [""]);
        assert!(!filter.is_noisy_payload("anything"));
        assert!(!filter.is_ignored_author([""]));
    }
}
