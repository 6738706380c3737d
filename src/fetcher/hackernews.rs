use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::app::Result;
use crate::domain::{Item, Source};
use crate::fetcher::{http_client, SourceFetcher};

const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";
const DISCUSSION_URL: &str = "https://news.ycombinator.com/item?id=";

pub struct HackerNewsFetcher {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HnItem {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    time: Option<i64>,
}

impl HackerNewsFetcher {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: http_client(),
            base_url,
        }
    }

    fn map_item(payload: HnItem) -> Item {
        let native_id = payload.id.to_string();
        let mut item = Item::new(Source::HackerNews, &native_id);
        item.source_url = format!("{}{}", DISCUSSION_URL, payload.id);
        item.title = payload.title.unwrap_or_default();
        // Ask/Show posts carry no external link; fall back to the
        // discussion page so the entry stays clickable.
        item.url = payload
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| item.source_url.clone());
        item.description = payload.text.unwrap_or_default();
        item.created_at = payload.time.unwrap_or(0);
        item
    }
}

impl Default for HackerNewsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for HackerNewsFetcher {
    fn source(&self) -> Source {
        Source::HackerNews
    }

    async fn available_ids(&self) -> Result<Vec<String>> {
        let url = format!("{}/topstories.json", self.base_url);
        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;

        let ids: Vec<u64> = response.json().await?;
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    async fn fetch_item(&self, native_id: &str) -> Result<Item> {
        let url = format!("{}/item/{}.json", self.base_url, native_id);
        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;

        let payload: HnItem = response.json().await?;
        Ok(Self::map_item(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_item_with_external_url() {
        let payload: HnItem = serde_json::from_str(
            r#"{"id": 42, "title": "A story", "url": "https://example.com/post",
                "time": 1700000000, "type": "story"}"#,
        )
        .unwrap();
        let item = HackerNewsFetcher::map_item(payload);

        assert_eq!(item.id, "hn-42");
        assert_eq!(item.title, "A story");
        assert_eq!(item.url, "https://example.com/post");
        assert_eq!(item.source_url, "https://news.ycombinator.com/item?id=42");
        assert_eq!(item.created_at, 1700000000);
        assert!(item.tags.is_empty());
        assert!(item.category.is_none());
        assert!(item.sorted_at.is_none());
    }

    #[test]
    fn test_map_item_ask_hn_falls_back_to_discussion() {
        let payload: HnItem = serde_json::from_str(
            r#"{"id": 7, "title": "Ask HN: anyone?", "text": "Body text",
                "time": 1700000001}"#,
        )
        .unwrap();
        let item = HackerNewsFetcher::map_item(payload);

        assert_eq!(item.url, "https://news.ycombinator.com/item?id=7");
        assert_eq!(item.description, "Body text");
    }
}
