use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;

use crate::app::{Result, SiftError};
use crate::domain::{Item, Source};
use crate::fetcher::{http_client, SourceFetcher};

const DEFAULT_BASE_URL: &str = "https://lobste.rs";
const MAX_PAGES: usize = 5;

pub struct LobstersFetcher {
    client: Client,
    base_url: String,
    first_page_only: bool,
}

#[derive(Debug, Deserialize)]
struct LobstersStory {
    short_id: String,
    #[serde(default)]
    short_id_url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description_plain: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    created_at: String,
}

impl LobstersFetcher {
    pub fn new(first_page_only: bool) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), first_page_only)
    }

    pub fn with_base_url(base_url: String, first_page_only: bool) -> Self {
        Self {
            client: http_client(),
            base_url,
            first_page_only,
        }
    }

    async fn hottest_page(&self, page: usize) -> Result<Vec<LobstersStory>> {
        let url = if page <= 1 {
            format!("{}/hottest.json", self.base_url)
        } else {
            format!("{}/hottest.json?page={}", self.base_url, page)
        };
        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;
        Ok(response.json().await?)
    }

    fn map_story(story: LobstersStory) -> Result<Item> {
        let created_at = DateTime::parse_from_rfc3339(&story.created_at)
            .map_err(|e| {
                SiftError::Other(format!(
                    "bad lobsters timestamp for {}: {}",
                    story.short_id, e
                ))
            })?
            .timestamp();

        let mut item = Item::new(Source::Lobsters, &story.short_id);
        item.title = story.title;
        // Text posts have no external link; point at the discussion page.
        item.url = if story.url.is_empty() {
            story.short_id_url.clone()
        } else {
            story.url
        };
        item.description = story.description_plain;
        item.tags = story.tags;
        item.source_url = story.short_id_url;
        item.created_at = created_at;
        Ok(item)
    }
}

#[async_trait]
impl SourceFetcher for LobstersFetcher {
    fn source(&self) -> Source {
        Source::Lobsters
    }

    async fn available_ids(&self) -> Result<Vec<String>> {
        // The hottest endpoint is paginated; by default only the first
        // page counts as "available". Known scope limitation, kept
        // configurable rather than silently widened.
        let pages = if self.first_page_only { 1 } else { MAX_PAGES };

        let mut ids = Vec::new();
        for page in 1..=pages {
            let stories = self.hottest_page(page).await?;
            if stories.is_empty() {
                break;
            }
            ids.extend(stories.into_iter().map(|s| s.short_id));
        }
        Ok(ids)
    }

    async fn fetch_item(&self, native_id: &str) -> Result<Item> {
        let url = format!("{}/s/{}.json", self.base_url, native_id);
        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;

        let story: LobstersStory = response.json().await?;
        Self::map_story(story)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_story() -> LobstersStory {
        serde_json::from_str(
            r#"{
                "short_id": "abc123",
                "short_id_url": "https://lobste.rs/s/abc123",
                "title": "A fine article",
                "url": "https://example.com/fine",
                "description_plain": "Summary",
                "tags": ["rust", "api"],
                "created_at": "2024-01-15T10:30:00-06:00"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_map_story_fields() {
        let item = LobstersFetcher::map_story(sample_story()).unwrap();
        assert_eq!(item.id, "lobsters-abc123");
        assert_eq!(item.title, "A fine article");
        assert_eq!(item.url, "https://example.com/fine");
        assert_eq!(item.source_url, "https://lobste.rs/s/abc123");
        assert_eq!(item.tags, vec!["rust", "api"]);
        // 2024-01-15T10:30:00-06:00 == 16:30:00 UTC
        assert_eq!(item.created_at, 1705336200);
    }

    #[test]
    fn test_map_story_text_post_falls_back_to_discussion() {
        let mut story = sample_story();
        story.url = String::new();
        let item = LobstersFetcher::map_story(story).unwrap();
        assert_eq!(item.url, "https://lobste.rs/s/abc123");
    }

    #[test]
    fn test_map_story_rejects_bad_timestamp() {
        let mut story = sample_story();
        story.created_at = "yesterday".into();
        assert!(LobstersFetcher::map_story(story).is_err());
    }
}
