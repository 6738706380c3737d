use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::{MAX_WAVES, WORKERS};
use crate::domain::Item;
use crate::fetcher::SourceFetcher;

/// Result of a wave run: fetched items plus the ids that kept failing
/// and were dropped after the retry ceiling.
#[derive(Debug)]
pub struct WaveOutcome {
    pub items: Vec<Item>,
    pub dropped: Vec<String>,
}

/// Bounded-concurrency item fetcher.
///
/// Each wave fetches every outstanding id with at most `workers` requests
/// in flight; a failed id is requeued into the next wave. After
/// `max_waves` waves a still-failing id is dropped with a warning, so a
/// permanently broken id can never hang the run.
pub struct WavePool {
    semaphore: Arc<Semaphore>,
    max_waves: usize,
}

impl WavePool {
    pub fn new() -> Self {
        Self::with_limits(WORKERS, MAX_WAVES)
    }

    pub fn with_limits(workers: usize, max_waves: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            max_waves,
        }
    }

    pub async fn fetch_all(
        &self,
        fetcher: Arc<dyn SourceFetcher>,
        native_ids: Vec<String>,
    ) -> WaveOutcome {
        let source = fetcher.source();
        let mut outstanding = native_ids;
        let mut items = Vec::new();

        for wave in 1..=self.max_waves {
            if outstanding.is_empty() {
                break;
            }

            let mut handles = Vec::with_capacity(outstanding.len());
            for native_id in outstanding.drain(..) {
                // The id is moved into its task at submission time.
                let fetcher = fetcher.clone();
                let semaphore = self.semaphore.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.expect("Semaphore closed");
                    let result = fetcher.fetch_item(&native_id).await;
                    (native_id, result)
                }));
            }

            // Completion order across workers is unordered.
            for handle in handles {
                match handle.await {
                    Ok((_, Ok(item))) => items.push(item),
                    Ok((native_id, Err(e))) => {
                        tracing::debug!(
                            source = %source,
                            native_id = %native_id,
                            wave,
                            error = %e,
                            "item fetch failed, requeueing"
                        );
                        outstanding.push(native_id);
                    }
                    Err(e) => {
                        tracing::error!("Task join error: {}", e);
                    }
                }
            }
        }

        for native_id in &outstanding {
            tracing::warn!(
                source = %source,
                native_id = %native_id,
                "dropping item after {} failed fetch waves",
                self.max_waves
            );
        }

        WaveOutcome {
            items,
            dropped: outstanding,
        }
    }
}

impl Default for WavePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::app::{Result, SiftError};
    use crate::domain::Source;

    struct ScriptedFetcher {
        /// native_id -> number of failures before success (usize::MAX = always fails)
        failures: HashMap<String, usize>,
        attempts: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(failures: HashMap<String, usize>) -> Self {
            Self {
                failures,
                attempts: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn attempts_for(&self, id: &str) -> usize {
            *self.attempts.lock().unwrap().get(id).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl SourceFetcher for ScriptedFetcher {
        fn source(&self) -> Source {
            Source::HackerNews
        }

        async fn available_ids(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn fetch_item(&self, native_id: &str) -> Result<Item> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let n = attempts.entry(native_id.to_string()).or_insert(0);
                *n += 1;
                *n
            };

            let failures = self.failures.get(native_id).copied().unwrap_or(0);
            if attempt <= failures {
                return Err(SiftError::Other(format!("transient failure {}", native_id)));
            }

            let mut item = Item::new(Source::HackerNews, native_id);
            item.title = format!("item {}", native_id);
            Ok(item)
        }
    }

    #[tokio::test]
    async fn test_all_succeed_first_wave() {
        let fetcher = Arc::new(ScriptedFetcher::new(HashMap::new()));
        let pool = WavePool::with_limits(4, 3);
        let ids: Vec<String> = (0..8).map(|i| i.to_string()).collect();

        let outcome = pool.fetch_all(fetcher.clone(), ids).await;
        assert_eq!(outcome.items.len(), 8);
        assert!(outcome.dropped.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_requeued_then_succeeds() {
        let mut failures = HashMap::new();
        failures.insert("flaky".to_string(), 1);
        let fetcher = Arc::new(ScriptedFetcher::new(failures));
        let pool = WavePool::with_limits(4, 3);

        let outcome = pool
            .fetch_all(fetcher.clone(), vec!["flaky".into(), "ok".into()])
            .await;
        assert_eq!(outcome.items.len(), 2);
        assert!(outcome.dropped.is_empty());
        assert_eq!(fetcher.attempts_for("flaky"), 2);
        assert_eq!(fetcher.attempts_for("ok"), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_terminates_and_drops() {
        let mut failures = HashMap::new();
        failures.insert("broken".to_string(), usize::MAX);
        let fetcher = Arc::new(ScriptedFetcher::new(failures));
        let pool = WavePool::with_limits(4, 3);
        let ids: Vec<String> = vec![
            "1".into(),
            "2".into(),
            "broken".into(),
            "3".into(),
            "4".into(),
        ];

        let outcome = pool.fetch_all(fetcher.clone(), ids).await;
        assert_eq!(outcome.items.len(), 4);
        assert_eq!(outcome.dropped, vec!["broken".to_string()]);
        // Retried once per wave, then given up.
        assert_eq!(fetcher.attempts_for("broken"), 3);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let fetcher = Arc::new(ScriptedFetcher::new(HashMap::new()));
        let pool = WavePool::with_limits(3, 1);
        let ids: Vec<String> = (0..20).map(|i| i.to_string()).collect();

        let outcome = pool.fetch_all(fetcher.clone(), ids).await;
        assert_eq!(outcome.items.len(), 20);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_empty_input() {
        let fetcher = Arc::new(ScriptedFetcher::new(HashMap::new()));
        let pool = WavePool::new();
        let outcome = tokio_test::block_on(pool.fetch_all(fetcher, Vec::new()));
        assert!(outcome.items.is_empty());
        assert!(outcome.dropped.is_empty());
    }
}
