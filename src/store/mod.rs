pub mod sqlite;

use serde::Serialize;

use crate::app::Result;
use crate::domain::{Category, Item, Tab};

pub use sqlite::SqliteStore;

/// One row of a tab view.
#[derive(Debug, Clone, Serialize)]
pub struct TabEntry {
    pub id: String,
    pub category: Option<Category>,
    pub title: String,
    pub source_url: String,
}

/// A previously classified item, as shown to the oracle.
#[derive(Debug, Clone, Serialize)]
pub struct Exemplar {
    pub title: String,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
}

pub trait Store {
    /// Candidate ids absent from the store, via one batched existence query.
    fn filter_new(&self, candidate_ids: &[String]) -> Result<Vec<String>>;

    /// Insert newly classified rows. A duplicate id aborts the batch with
    /// an integrity error and leaves existing rows untouched.
    fn insert_batch(&self, items: &[Item]) -> Result<usize>;

    /// Delete classified rows of `category` beyond the newest
    /// `HISTORY_LIMIT`, oldest `sorted_at` first. Returns rows deleted.
    fn evict_overflow(&self, category: Category) -> Result<usize>;

    /// Retained classified exemplars for `category`, newest first.
    fn exemplars(&self, category: Category, limit: usize) -> Result<Vec<Exemplar>>;

    fn get_item(&self, id: &str) -> Result<Option<Item>>;

    /// Tab views: `all` is history order, `liked`/`disliked` are
    /// source-priority order.
    fn get_tab(&self, tab: Tab, limit: usize) -> Result<Vec<TabEntry>>;

    /// Set `category`, setting `sorted_at` only if previously unset, then
    /// evict overflow for that category.
    fn reclassify(&self, id: &str, category: Category) -> Result<()>;

    fn pending_count(&self) -> Result<i64>;
    fn history_count(&self, category: Category) -> Result<i64>;
}
