use std::collections::HashSet;

use crate::app::{AppContext, Result};
use crate::domain::{Item, Source};
use crate::store::Store;

/// What one ingestion cycle did, per source and overall.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub sources: Vec<SourceReport>,
    pub liked: usize,
    pub disliked: usize,
}

#[derive(Debug)]
pub struct SourceReport {
    pub source: Source,
    /// Ids the feed listed as currently available.
    pub listed: usize,
    /// Ids surviving the dedup filter.
    pub new: usize,
    /// Items whose bodies were fetched this cycle.
    pub fetched: usize,
    /// Native ids abandoned after the retry ceiling.
    pub dropped: Vec<String>,
}

impl CycleSummary {
    pub fn total_new(&self) -> usize {
        self.sources.iter().map(|s| s.fetched).sum()
    }
}

/// One ingestion cycle: list, dedup, fetch, classify.
///
/// A source whose id listing fails is skipped and the cycle continues
/// with the others. Item-level failures are handled inside the wave
/// pool. Only a classifier failure aborts the cycle, and then every
/// uncommitted item is simply refetched next cycle since nothing
/// pending was inserted.
pub async fn run_cycle(ctx: &AppContext) -> Result<CycleSummary> {
    let mut summary = CycleSummary::default();
    let mut pending: Vec<Item> = Vec::new();

    for fetcher in &ctx.fetchers {
        let source = fetcher.source();
        let native_ids = match fetcher.available_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(source = %source, error = %e, "id listing failed, skipping source");
                continue;
            }
        };
        let listed = native_ids.len();

        let candidate_ids: Vec<String> = native_ids
            .iter()
            .map(|native| Item::make_id(source, native))
            .collect();
        let fresh: HashSet<String> = ctx.store.filter_new(&candidate_ids)?.into_iter().collect();
        let new_native: Vec<String> = native_ids
            .into_iter()
            .zip(candidate_ids)
            .filter(|(_, canonical)| fresh.contains(canonical))
            .map(|(native, _)| native)
            .collect();
        let new = new_native.len();

        let outcome = ctx.wave_pool.fetch_all(fetcher.clone(), new_native).await;
        let fetched = outcome.items.len();
        pending.extend(outcome.items);

        tracing::info!(
            source = %source,
            listed,
            new,
            fetched,
            dropped = outcome.dropped.len(),
            "source ingested"
        );
        summary.sources.push(SourceReport {
            source,
            listed,
            new,
            fetched,
            dropped: outcome.dropped,
        });
    }

    if !pending.is_empty() {
        let outcome = ctx
            .classifier
            .classify_batch(ctx.store.as_ref(), pending)
            .await?;
        summary.liked = outcome.liked;
        summary.disliked = outcome.disliked;
    }

    Ok(summary)
}
