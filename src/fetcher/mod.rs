pub mod hackernews;
pub mod lobsters;
pub mod wave;

use std::time::Duration;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{Item, Source};

pub use hackernews::HackerNewsFetcher;
pub use lobsters::LobstersFetcher;
pub use wave::{WaveOutcome, WavePool};

/// A remote feed: a listing of currently available native ids plus a
/// per-id item-detail fetch.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn source(&self) -> Source;

    /// Native ids currently available from the source, one call.
    async fn available_ids(&self) -> Result<Vec<String>>;

    /// Full item body for one native id.
    async fn fetch_item(&self, native_id: &str) -> Result<Item>;
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .user_agent(concat!("sift/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to build HTTP client")
}
