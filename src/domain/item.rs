use serde::{Deserialize, Serialize};

use crate::domain::Source;

/// A single news item, keyed by `{source}-{native_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub source_url: String,
    pub created_at: i64,
    pub category: Option<Category>,
    pub sorted_at: Option<i64>,
}

impl Item {
    pub fn new(source: Source, native_id: &str) -> Self {
        Self {
            id: Self::make_id(source, native_id),
            title: String::new(),
            url: String::new(),
            description: String::new(),
            tags: Vec::new(),
            source_url: String::new(),
            created_at: 0,
            category: None,
            sorted_at: None,
        }
    }

    /// Canonical item identifier: `{source}-{native_id}`.
    pub fn make_id(source: Source, native_id: &str) -> String {
        format!("{}-{}", source.prefix(), native_id)
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }
}

/// Binary classification, stored as integer 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Disliked,
    Liked,
}

impl Category {
    pub fn to_i64(self) -> i64 {
        match self {
            Category::Disliked => 0,
            Category::Liked => 1,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Category::Disliked),
            1 => Some(Category::Liked),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Disliked => "disliked",
            Category::Liked => "liked",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" | "liked" => Ok(Category::Liked),
            "dislike" | "disliked" => Ok(Category::Disliked),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// The three client-facing views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Liked,
    Disliked,
    All,
}

impl std::str::FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "liked" => Ok(Tab::Liked),
            "disliked" => Ok(Tab::Disliked),
            "all" => Ok(Tab::All),
            other => Err(format!("unknown tab: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id_format() {
        assert_eq!(Item::make_id(Source::HackerNews, "42"), "hn-42");
        assert_eq!(Item::make_id(Source::Lobsters, "abc123"), "lobsters-abc123");
    }

    #[test]
    fn test_make_id_deterministic() {
        let a = Item::make_id(Source::HackerNews, "123");
        let b = Item::make_id(Source::HackerNews, "123");
        assert_eq!(a, b);
    }

    #[test]
    fn test_category_roundtrip() {
        assert_eq!(Category::from_i64(0), Some(Category::Disliked));
        assert_eq!(Category::from_i64(1), Some(Category::Liked));
        assert_eq!(Category::from_i64(7), None);
        assert_eq!(Category::Liked.to_i64(), 1);
        assert_eq!(Category::Disliked.to_i64(), 0);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("like".parse::<Category>().unwrap(), Category::Liked);
        assert_eq!("disliked".parse::<Category>().unwrap(), Category::Disliked);
        assert!("meh".parse::<Category>().is_err());
    }

    #[test]
    fn test_tab_parse() {
        assert_eq!("all".parse::<Tab>().unwrap(), Tab::All);
        assert_eq!("liked".parse::<Tab>().unwrap(), Tab::Liked);
        assert!("starred".parse::<Tab>().is_err());
    }

    #[test]
    fn test_display_title_fallback() {
        let mut item = Item::new(Source::HackerNews, "1");
        assert_eq!(item.display_title(), "(Untitled)");
        item.title = "A headline".into();
        assert_eq!(item.display_title(), "A headline");
    }
}
