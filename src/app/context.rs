use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, SiftError};
use crate::classifier::{Classifier, CompletionBackend, HttpBackend};
use crate::config::Config;
use crate::fetcher::{HackerNewsFetcher, LobstersFetcher, SourceFetcher, WavePool};
use crate::store::SqliteStore;

/// Shared wiring for the CLI commands and the daemon loop.
pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub fetchers: Vec<Arc<dyn SourceFetcher>>,
    pub wave_pool: WavePool,
    pub classifier: Classifier,
}

impl AppContext {
    pub fn new(config: &Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::with_priority(
            &db_path,
            config.sources.priority(),
        )?);
        let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![
            Arc::new(HackerNewsFetcher::new()),
            Arc::new(LobstersFetcher::new(config.sources.lobsters_first_page_only)),
        ];
        let backend = Arc::new(HttpBackend::from_config(&config.oracle));

        Ok(Self::assemble(store, fetchers, backend))
    }

    /// Context over explicit parts; the seam the orchestrator tests use.
    pub fn with_parts(
        store: Arc<SqliteStore>,
        fetchers: Vec<Arc<dyn SourceFetcher>>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self::assemble(store, fetchers, backend)
    }

    fn assemble(
        store: Arc<SqliteStore>,
        fetchers: Vec<Arc<dyn SourceFetcher>>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            store,
            fetchers,
            wave_pool: WavePool::new(),
            classifier: Classifier::new(backend),
        }
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| SiftError::Config("Could not find data directory".into()))?;
        let sift_dir = data_dir.join("sift");
        std::fs::create_dir_all(&sift_dir)?;
        Ok(sift_dir.join("sift.db"))
    }
}
