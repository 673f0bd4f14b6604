//! Domain model shared across pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persisted marker meaning "enrichment ran and the source definitively has no
/// content". Distinct from `None`, which means "not yet attempted".
pub const UNAVAILABLE: &str = "__UNAVAILABLE__";

/// Which family of source an item was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Article,
    Video,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Article => "article",
            SourceKind::Video => "video",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(SourceKind::Article),
            "video" => Ok(SourceKind::Video),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// Composite identity of an item: `(kind, natural_id)` is globally unique.
/// The string encoding `"{kind}:{natural_id}"` exists only at the digest-id
/// storage boundary; everywhere else the two fields stay separate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub kind: SourceKind,
    pub natural_id: String,
}

impl ItemKey {
    pub fn new(kind: SourceKind, natural_id: impl Into<String>) -> Self {
        Self {
            kind,
            natural_id: natural_id.into(),
        }
    }

    /// Deterministic string form used as the digest primary key.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.kind, self.natural_id)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.natural_id)
    }
}

/// One ingested unit from a source, normalized across source kinds.
///
/// Created by ingestion, mutated only by enrichment (which fills
/// `derived_content` exactly once), never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub kind: SourceKind,
    pub natural_id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub category: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Article body or video transcript. `None` until enrichment runs;
    /// [`UNAVAILABLE`] once enrichment confirmed there is nothing to fetch.
    pub derived_content: Option<String>,
}

impl RawItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.kind, self.natural_id.clone())
    }

    /// Text the digest generator should summarize: derived content when
    /// present, the feed description as fallback when the source confirmed
    /// no content. `None` while enrichment is still pending or when the
    /// fallback is empty too.
    pub fn content_for_summary(&self) -> Option<&str> {
        match self.derived_content.as_deref() {
            Some(UNAVAILABLE) => {
                if self.description.is_empty() {
                    None
                } else {
                    Some(&self.description)
                }
            }
            Some(content) => Some(content),
            None => None,
        }
    }
}

/// Title and summary produced by the summarization collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestDraft {
    pub title: String,
    pub summary: String,
}

/// A one-item synthesized summary. Immutable after creation; at most one
/// exists per item thanks to the deterministic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub source_url: String,
    pub source_title: String,
    /// The item's `published_at`: digests order by content recency, not by
    /// when the pipeline happened to process them.
    pub created_at: DateTime<Utc>,
}

impl Digest {
    pub fn for_item(item: &RawItem, draft: DigestDraft) -> Self {
        Self {
            id: item.key().encode(),
            title: draft.title,
            summary: draft.summary,
            source_url: item.url.clone(),
            source_title: item.title.clone(),
            created_at: item.published_at,
        }
    }
}

/// Ranking output for one digest. Ephemeral: recomputed every run, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedArticle {
    pub digest_id: String,
    /// 1-based, dense across the returned set.
    pub rank: u32,
    /// 0.0–10.0 relevance against the interest profile.
    pub relevance_score: f64,
    pub reasoning: String,
}
