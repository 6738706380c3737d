use serde::{Deserialize, Serialize};

/// The feeds sift ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    HackerNews,
    Lobsters,
}

impl Source {
    /// Id prefix used in the canonical `{source}-{native_id}` scheme.
    pub fn prefix(self) -> &'static str {
        match self {
            Source::HackerNews => "hn",
            Source::Lobsters => "lobsters",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Ranked list of source prefixes; earlier entries rank before later ones
/// in the liked/disliked tabs. Unknown prefixes tier last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePriority {
    prefixes: Vec<String>,
}

impl SourcePriority {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Lobsters produces far fewer, higher-signal items per day than HN,
    /// so it ranks first by default.
    pub fn default_order() -> Self {
        Self::new(vec!["lobsters".into(), "hn".into()])
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Tier for an item id; ids whose prefix is not in the ranked list
    /// sort after every ranked tier.
    pub fn tier_of(&self, item_id: &str) -> usize {
        self.prefixes
            .iter()
            .position(|p| {
                item_id
                    .strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.starts_with('-'))
            })
            .unwrap_or(self.prefixes.len())
    }
}

impl Default for SourcePriority {
    fn default() -> Self {
        Self::default_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(Source::HackerNews.prefix(), "hn");
        assert_eq!(Source::Lobsters.prefix(), "lobsters");
    }

    #[test]
    fn test_default_priority_ranks_lobsters_first() {
        let priority = SourcePriority::default_order();
        assert!(priority.tier_of("lobsters-abc") < priority.tier_of("hn-123"));
    }

    #[test]
    fn test_unknown_prefix_tiers_last() {
        let priority = SourcePriority::default_order();
        assert_eq!(priority.tier_of("reddit-xyz"), 2);
    }

    #[test]
    fn test_prefix_must_be_followed_by_dash() {
        let priority = SourcePriority::new(vec!["hn".into()]);
        assert_eq!(priority.tier_of("hnx-1"), 1);
        assert_eq!(priority.tier_of("hn-1"), 0);
    }

    #[test]
    fn test_custom_order() {
        let priority = SourcePriority::new(vec!["hn".into(), "lobsters".into()]);
        assert!(priority.tier_of("hn-1") < priority.tier_of("lobsters-a"));
    }
}
