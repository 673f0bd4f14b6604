//! Curation: rank the recent digest window against the interest profile.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::Profile;
use crate::llm::Ranker;
use crate::store::ItemStore;
use crate::types::{Digest, RankedArticle};

#[derive(Debug, Default)]
pub struct Curation {
    /// Digests that were in the window, in store order.
    pub digests: Vec<Digest>,
    /// Validated ranking, in collaborator order. May be shorter than
    /// `digests`; the remainder counts as unranked.
    pub ranked: Vec<RankedArticle>,
}

/// Rank every digest created since `since`. An empty window is a normal
/// condition and yields an empty ranking; a collaborator failure is an error
/// the orchestrator treats as a stage failure.
pub async fn rank_recent(
    store: &ItemStore,
    ranker: &dyn Ranker,
    profile: &Profile,
    since: DateTime<Utc>,
) -> Result<Curation> {
    let digests = store.recent_digests(since).await?;
    if digests.is_empty() {
        info!("no digests in window, nothing to rank");
        return Ok(Curation::default());
    }

    info!(total = digests.len(), "ranking digests");
    let raw = ranker
        .rank(profile, &digests)
        .await
        .ok_or_else(|| anyhow!("ranking collaborator returned no result"))?;

    let ranked = validate_rankings(raw, &digests);
    if ranked.len() < digests.len() {
        info!(
            ranked = ranked.len(),
            total = digests.len(),
            "collaborator left some digests unranked"
        );
    }

    Ok(Curation { digests, ranked })
}

/// Enforce the ranking contract: known digest ids only, each id at most
/// once, ranks dense `1..=K`. Collaborator order is preserved, never
/// re-sorted; out-of-contract rank values are reassigned in that order.
fn validate_rankings(raw: Vec<RankedArticle>, digests: &[Digest]) -> Vec<RankedArticle> {
    let known: HashSet<&str> = digests.iter().map(|d| d.id.as_str()).collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<RankedArticle> = Vec::with_capacity(raw.len());
    for entry in raw {
        if !known.contains(entry.digest_id.as_str()) {
            warn!(digest_id = %entry.digest_id, "dropping ranking for unknown digest");
            continue;
        }
        if !seen.insert(entry.digest_id.clone()) {
            warn!(digest_id = %entry.digest_id, "dropping duplicate ranking entry");
            continue;
        }
        kept.push(entry);
    }

    let dense = kept
        .iter()
        .enumerate()
        .all(|(i, entry)| entry.rank as usize == i + 1);
    if !dense {
        warn!("ranking was not dense 1..K, reassigning ranks in returned order");
        for (i, entry) in kept.iter_mut().enumerate() {
            entry.rank = (i + 1) as u32;
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DigestDraft, RawItem, SourceKind};
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FixedRanker {
        result: Option<Vec<RankedArticle>>,
    }

    #[async_trait]
    impl Ranker for FixedRanker {
        async fn rank(
            &self,
            _profile: &Profile,
            _digests: &[Digest],
        ) -> Option<Vec<RankedArticle>> {
            self.result.clone()
        }
    }

    fn profile() -> Profile {
        Profile {
            name: "Alex".into(),
            background: "ML engineer".into(),
            interests: vec!["agents".into()],
        }
    }

    fn entry(id: &str, rank: u32, score: f64) -> RankedArticle {
        RankedArticle {
            digest_id: id.to_string(),
            rank,
            relevance_score: score,
            reasoning: "because".to_string(),
        }
    }

    async fn store_with_digests(ids: &[&str]) -> ItemStore {
        let store = ItemStore::connect("sqlite::memory:").await.unwrap();
        for id in ids {
            let item = RawItem {
                kind: SourceKind::Article,
                natural_id: id.to_string(),
                title: id.to_string(),
                url: format!("https://example.com/{id}"),
                description: "desc".into(),
                category: None,
                published_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
                derived_content: None,
            };
            store.insert_new(&[item.clone()]).await.unwrap();
            store
                .insert_digest(&Digest::for_item(
                    &item,
                    DigestDraft {
                        title: format!("digest {id}"),
                        summary: "s".into(),
                    },
                ))
                .await
                .unwrap();
        }
        store
    }

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 31, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_window_is_not_an_error() {
        let store = ItemStore::connect("sqlite::memory:").await.unwrap();
        let ranker = FixedRanker { result: None };
        let curation = rank_recent(&store, &ranker, &profile(), since())
            .await
            .unwrap();
        assert!(curation.digests.is_empty());
        assert!(curation.ranked.is_empty());
    }

    #[tokio::test]
    async fn collaborator_failure_is_a_stage_error() {
        let store = store_with_digests(&["a"]).await;
        let ranker = FixedRanker { result: None };
        assert!(rank_recent(&store, &ranker, &profile(), since())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn valid_dense_ranking_passes_through_in_order() {
        let store = store_with_digests(&["a", "b", "c"]).await;
        let ranker = FixedRanker {
            result: Some(vec![
                entry("article:b", 1, 9.0),
                entry("article:c", 2, 7.0),
                entry("article:a", 3, 4.0),
            ]),
        };
        let curation = rank_recent(&store, &ranker, &profile(), since())
            .await
            .unwrap();
        let ids: Vec<&str> = curation.ranked.iter().map(|r| r.digest_id.as_str()).collect();
        assert_eq!(ids, vec!["article:b", "article:c", "article:a"]);
        let ranks: Vec<u32> = curation.ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn gapped_or_duplicate_ranks_are_reassigned_densely() {
        let store = store_with_digests(&["a", "b", "c"]).await;
        let ranker = FixedRanker {
            result: Some(vec![
                entry("article:b", 1, 9.0),
                entry("article:c", 1, 7.0),
                entry("article:a", 5, 4.0),
            ]),
        };
        let curation = rank_recent(&store, &ranker, &profile(), since())
            .await
            .unwrap();
        let ranks: Vec<u32> = curation.ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unknown_ids_are_dropped_and_remainder_stays_unranked() {
        let store = store_with_digests(&["a", "b"]).await;
        let ranker = FixedRanker {
            result: Some(vec![
                entry("article:ghost", 1, 9.0),
                entry("article:a", 2, 6.0),
            ]),
        };
        let curation = rank_recent(&store, &ranker, &profile(), since())
            .await
            .unwrap();
        assert_eq!(curation.ranked.len(), 1);
        assert_eq!(curation.ranked[0].digest_id, "article:a");
        assert_eq!(curation.ranked[0].rank, 1);
    }
}
