//! Best-effort retrieval of derived content (article bodies, transcripts)
//! after initial ingestion, with per-item failure isolation.

pub mod article;
pub mod transcript;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::store::ItemStore;
use crate::types::RawItem;

/// What an enrichment fetch established about the source.
///
/// `Absent` is a terminal fact ("the source confirms there is no content"),
/// persisted as the unavailable sentinel so the item is never re-selected.
/// Transient trouble is an `Err` from the fetcher instead, which leaves the
/// item pending so the next run retries it. The two cannot be conflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Content(String),
    Absent,
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, item: &RawItem) -> Result<FetchOutcome>;
    fn stage_name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub total: usize,
    pub processed: usize,
    pub unavailable: usize,
    pub failed: usize,
}

/// Apply `fetcher` to each item with at most `concurrency` fetches in
/// flight. Each item's outcome commits on its own: a mix of processed,
/// unavailable, and failed items in one call each durably records its own
/// result, and one item's error never aborts the rest.
pub async fn run_stage(
    store: &ItemStore,
    fetcher: Arc<dyn ContentFetcher>,
    items: Vec<RawItem>,
    concurrency: usize,
) -> EnrichReport {
    let concurrency = concurrency.max(1);
    let mut report = EnrichReport {
        total: items.len(),
        ..Default::default()
    };
    if items.is_empty() {
        return report;
    }

    info!(
        stage = fetcher.stage_name(),
        total = report.total,
        "starting enrichment"
    );

    let mut in_flight = JoinSet::new();
    let mut queue = items.into_iter();

    loop {
        while in_flight.len() < concurrency {
            let Some(item) = queue.next() else { break };
            let fetcher = Arc::clone(&fetcher);
            in_flight.spawn(async move {
                let outcome = fetcher.fetch(&item).await;
                (item, outcome)
            });
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };

        let (item, outcome) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!(stage = fetcher.stage_name(), error = ?e, "enrichment task aborted");
                report.failed += 1;
                continue;
            }
        };

        let key = item.key();
        match outcome {
            Ok(FetchOutcome::Content(content)) => {
                match store.set_derived_content(&key, &content).await {
                    Ok(_) => report.processed += 1,
                    Err(e) => {
                        warn!(item = %key, error = ?e, "persisting content failed");
                        report.failed += 1;
                    }
                }
            }
            Ok(FetchOutcome::Absent) => match store.mark_unavailable(&key).await {
                Ok(_) => report.unavailable += 1,
                Err(e) => {
                    warn!(item = %key, error = ?e, "persisting unavailable marker failed");
                    report.failed += 1;
                }
            },
            Err(e) => {
                warn!(item = %key, error = ?e, "enrichment failed, will retry next run");
                report.failed += 1;
            }
        }
    }

    info!(
        stage = fetcher.stage_name(),
        processed = report.processed,
        unavailable = report.unavailable,
        failed = report.failed,
        "enrichment finished"
    );
    report
}
