//! Digest generation: one summarization call per eligible item, idempotent
//! creation under the deterministic digest id.

use serde::Serialize;
use tracing::{info, warn};

use crate::llm::Summarizer;
use crate::store::{ItemStore, StoreError};
use crate::types::Digest;

/// Hard safety cap on summarization input, applied uniformly to every item.
const CONTENT_CAP_CHARS: usize = 8000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Generate digests for every item that is enriched but not yet digested.
///
/// A failed summarization only bumps the counter; the item stays eligible
/// and is retried on the next run. A crash mid-batch leaves already-created
/// digests intact and the remainder naturally eligible next time.
pub async fn run(store: &ItemStore, summarizer: &dyn Summarizer) -> Result<DigestReport, StoreError> {
    let items = store.items_awaiting_digest().await?;
    let mut report = DigestReport {
        total: items.len(),
        ..Default::default()
    };

    info!(total = report.total, "starting digest generation");

    for item in items {
        let key = item.key();
        let Some(content) = item.content_for_summary() else {
            warn!(item = %key, "selected item has nothing to summarize");
            report.failed += 1;
            continue;
        };
        let content = cap_chars(content, CONTENT_CAP_CHARS);

        match summarizer.summarize(&item.title, content, item.kind).await {
            Some(draft) => {
                let digest = Digest::for_item(&item, draft);
                match store.insert_digest(&digest).await {
                    Ok(_) => report.processed += 1,
                    Err(e) => {
                        warn!(item = %key, error = ?e, "persisting digest failed");
                        report.failed += 1;
                    }
                }
            }
            None => {
                warn!(item = %key, "summarization returned nothing, will retry next run");
                report.failed += 1;
            }
        }
    }

    info!(
        processed = report.processed,
        failed = report.failed,
        "digest generation finished"
    );
    Ok(report)
}

fn cap_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DigestDraft, RawItem, SourceKind};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct ScriptedSummarizer;

    #[async_trait]
    impl Summarizer for ScriptedSummarizer {
        async fn summarize(
            &self,
            title: &str,
            _content: &str,
            _kind: SourceKind,
        ) -> Option<DigestDraft> {
            if title.contains("boom") {
                return None;
            }
            Some(DigestDraft {
                title: format!("digest: {title}"),
                summary: "A tight summary.".to_string(),
            })
        }
    }

    fn item(id: &str, title: &str) -> RawItem {
        RawItem {
            kind: SourceKind::Article,
            natural_id: id.to_string(),
            title: title.to_string(),
            url: format!("https://example.com/{id}"),
            description: "desc".to_string(),
            category: None,
            published_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            derived_content: None,
        }
    }

    async fn seeded_store(items: &[RawItem]) -> ItemStore {
        let store = ItemStore::connect("sqlite::memory:").await.unwrap();
        store.insert_new(items).await.unwrap();
        for it in items {
            store
                .set_derived_content(&it.key(), "full body text")
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn one_bad_item_does_not_abort_the_batch() {
        let items = vec![item("a", "first"), item("b", "boom"), item("c", "third")];
        let store = seeded_store(&items).await;

        let report = run(&store, &ScriptedSummarizer).await.unwrap();
        assert_eq!(
            report,
            DigestReport {
                total: 3,
                processed: 2,
                failed: 1,
            }
        );
        assert_eq!(store.count_digests().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_run_only_retries_failures() {
        let items = vec![item("a", "first"), item("b", "boom")];
        let store = seeded_store(&items).await;

        run(&store, &ScriptedSummarizer).await.unwrap();
        let second = run(&store, &ScriptedSummarizer).await.unwrap();

        // The digested item is no longer selected; only the failed one comes
        // back, and it fails again.
        assert_eq!(second.total, 1);
        assert_eq!(second.failed, 1);
        assert_eq!(store.count_digests().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn running_twice_creates_exactly_one_digest_per_item() {
        let items = vec![item("a", "first")];
        let store = seeded_store(&items).await;

        run(&store, &ScriptedSummarizer).await.unwrap();
        run(&store, &ScriptedSummarizer).await.unwrap();
        assert_eq!(store.count_digests().await.unwrap(), 1);
    }

    #[test]
    fn cap_is_char_aware() {
        let s = "héllo wörld";
        assert_eq!(cap_chars(s, 4), "héll");
        assert_eq!(cap_chars(s, 100), s);
    }
}
